use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    User,
    Repos,
    Repo,
    Languages,
    CommitActivity,
    Contributors,
    RateLimit,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::User => "user",
            ResourceKind::Repos => "repos",
            ResourceKind::Repo => "repo",
            ResourceKind::Languages => "languages",
            ResourceKind::CommitActivity => "commits",
            ResourceKind::Contributors => "contributors",
            ResourceKind::RateLimit => "rate_limit",
        })
    }
}

/// Resource kind plus an ordered parameter tuple. Equal keys share one
/// cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: ResourceKind,
    params: Vec<String>,
}

impl CacheKey {
    pub fn new<I, S>(kind: ResourceKind, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    pub fn user(handle: &str) -> Self {
        Self::new(ResourceKind::User, [handle])
    }

    pub fn repos(handle: &str) -> Self {
        Self::new(ResourceKind::Repos, [handle])
    }

    pub fn repo(handle: &str, repo: &str) -> Self {
        Self::new(ResourceKind::Repo, [handle, repo])
    }

    pub fn languages(handle: &str, repo: &str) -> Self {
        Self::new(ResourceKind::Languages, [handle, repo])
    }

    pub fn commit_activity(handle: &str, repo: &str) -> Self {
        Self::new(ResourceKind::CommitActivity, [handle, repo])
    }

    pub fn contributors(handle: &str, repo: &str) -> Self {
        Self::new(ResourceKind::Contributors, [handle, repo])
    }

    pub fn rate_limit() -> Self {
        Self::new(ResourceKind::RateLimit, Vec::<String>::new())
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The profile handle, for keys scoped to one.
    pub fn handle(&self) -> Option<&str> {
        match self.kind {
            ResourceKind::RateLimit => None,
            _ => self.params.first().map(String::as_str),
        }
    }

    /// A key with any blank parameter must not be fetched.
    pub fn is_complete(&self) -> bool {
        self.params.iter().all(|p| !p.trim().is_empty())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.params.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equal_keys_hash_together() {
        let mut keys = HashSet::new();
        keys.insert(CacheKey::languages("octocat", "A"));
        keys.insert(CacheKey::new(ResourceKind::Languages, ["octocat", "A"]));
        keys.insert(CacheKey::commit_activity("octocat", "A"));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_parameter_order_matters() {
        assert_ne!(CacheKey::languages("a", "b"), CacheKey::languages("b", "a"));
    }

    #[test]
    fn test_incomplete_keys() {
        assert!(CacheKey::languages("octocat", "A").is_complete());
        assert!(!CacheKey::languages("octocat", "").is_complete());
        assert!(!CacheKey::user("  ").is_complete());
        assert!(CacheKey::rate_limit().is_complete());
    }

    #[test]
    fn test_display() {
        assert_eq!(CacheKey::languages("octocat", "A").to_string(), "languages[octocat, A]");
        assert_eq!(CacheKey::rate_limit().handle(), None);
        assert_eq!(CacheKey::repos("octocat").handle(), Some("octocat"));
    }
}
