//! Printable summaries built from an already-fetched profile and repository
//! list.

use serde::Serialize;

use crate::models::{LanguageBreakdown, Profile, Repository};

pub const DEFAULT_HEADLINE: &str = "Software Engineer";
pub const NO_DESCRIPTION: &str = "No description";
const RESUME_LANGUAGES: usize = 5;
const RESUME_PROJECTS: usize = 5;

/// The four counters shown on a profile card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub public_repos: u32,
    pub followers: u32,
    pub following: u32,
    pub public_gists: u32,
}

impl From<&Profile> for ProfileStats {
    fn from(profile: &Profile) -> Self {
        Self {
            public_repos: profile.public_repos,
            followers: profile.followers,
            following: profile.following,
            public_gists: profile.public_gists,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Website {
    /// Without the scheme.
    pub display: String,
    /// Always absolute.
    pub url: String,
}

impl Website {
    pub fn parse(blog: &str) -> Option<Self> {
        let blog = blog.trim();
        if blog.is_empty() {
            return None;
        }

        let url = if blog.starts_with("http") {
            blog.to_string()
        } else {
            format!("https://{}", blog)
        };
        let display = blog
            .strip_prefix("https://")
            .or_else(|| blog.strip_prefix("http://"))
            .unwrap_or(blog)
            .to_string();

        Some(Self { display, url })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub name: String,
    pub description: String,
    pub stars: u32,
    pub forks: u32,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeSummary {
    pub display_name: String,
    pub headline: String,
    pub location: Option<String>,
    pub website: Option<Website>,
    pub profile_url: String,
    pub avatar_url: Option<String>,
    pub top_languages: Vec<String>,
    pub top_projects: Vec<ProjectSummary>,
    pub stats: ProfileStats,
}

impl ResumeSummary {
    pub fn build(profile: &Profile, repos: &[Repository]) -> Self {
        let headline = profile
            .bio
            .as_deref()
            .map(str::trim)
            .filter(|bio| !bio.is_empty())
            .unwrap_or(DEFAULT_HEADLINE)
            .to_string();

        Self {
            display_name: profile.display_name().to_string(),
            headline,
            location: profile.location.clone().filter(|l| !l.trim().is_empty()),
            website: profile.blog.as_deref().and_then(Website::parse),
            profile_url: format!("https://github.com/{}", profile.login),
            avatar_url: Some(profile.avatar_url.clone()).filter(|url| !url.is_empty()),
            top_languages: languages_by_repository_count(repos, RESUME_LANGUAGES),
            top_projects: projects_by_stars(repos, RESUME_PROJECTS),
            stats: ProfileStats::from(profile),
        }
    }
}

/// Primary languages ranked by how many repositories use them. Equal counts
/// keep first-seen order.
pub fn languages_by_repository_count(repos: &[Repository], top_n: usize) -> Vec<String> {
    let mut counts = LanguageBreakdown::new();
    for language in repos.iter().filter_map(|r| r.language.as_deref()) {
        counts.add(language, 1);
    }

    let mut ranked: Vec<(&str, u64)> = counts.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(top_n)
        .map(|(language, _)| language.to_string())
        .collect()
}

pub fn projects_by_stars(repos: &[Repository], top_n: usize) -> Vec<ProjectSummary> {
    let mut ranked: Vec<&Repository> = repos.iter().collect();
    ranked.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count));
    ranked
        .into_iter()
        .take(top_n)
        .map(|repo| ProjectSummary {
            name: repo.name.clone(),
            description: repo
                .description
                .clone()
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            html_url: repo.html_url.clone(),
        })
        .collect()
}
