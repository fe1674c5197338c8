use crate::error::Result;
use crate::github::api::{GitHubApi, RepoListOptions};
use crate::models::Repository;

/// Walks `GET /users/{handle}/repos` page by page. The client itself only
/// ever fetches the single page it is asked for.
pub struct RepoPaginator<'a> {
    api: &'a dyn GitHubApi,
    max_pages: u32,
}

impl<'a> RepoPaginator<'a> {
    pub fn new(api: &'a dyn GitHubApi) -> Self {
        Self { api, max_pages: 50 }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub async fn fetch_all(&self, handle: &str, base: &RepoListOptions) -> Result<Vec<Repository>> {
        let mut all_items = Vec::new();
        let mut options = base.clone();

        loop {
            let items = self.api.list_repos(handle, &options).await?;
            let items_count = items.len();
            all_items.extend(items);

            if items_count < options.per_page as usize || options.page - base.page + 1 >= self.max_pages {
                break;
            }

            options.page += 1;
        }

        tracing::debug!("Fetched {} repositories across {} page(s)", all_items.len(), options.page - base.page + 1);
        Ok(all_items)
    }
}
