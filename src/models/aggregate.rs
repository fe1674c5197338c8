use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageTotal {
    pub language: String,
    pub bytes: u64,
    /// Share of `total_bytes` across all languages, 0-100.
    pub percentage: f32,
}

/// Profile-wide language byte totals, largest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageDistribution {
    pub languages: Vec<LanguageTotal>,
    /// Sum over every repository breakdown, including languages cut by top-N.
    pub total_bytes: u64,
    pub repository_count: usize,
}

impl LanguageDistribution {
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    pub fn bytes_for(&self, language: &str) -> Option<u64> {
        self.languages
            .iter()
            .find(|l| l.language == language)
            .map(|l| l.bytes)
    }

    pub fn names(&self) -> Vec<&str> {
        self.languages.iter().map(|l| l.language.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoActivity {
    pub name: String,
    pub full_name: String,
    pub stars: u32,
    pub forks: u32,
    pub issues: u32,
    pub watchers: u32,
    pub score: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityRanking {
    pub repositories: Vec<RepoActivity>,
    /// Number of repositories considered before truncation.
    pub considered: usize,
}

impl ActivityRanking {
    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.repositories.iter().map(|r| r.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekTotal {
    pub week: DateTime<Utc>,
    pub commits: u32,
    /// Sunday-first daily commit counts.
    pub days: [u32; 7],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyActivity {
    pub weeks: Vec<WeekTotal>,
    pub total_commits: u64,
    pub repository_count: usize,
}

impl WeeklyActivity {
    pub fn is_empty(&self) -> bool {
        self.weeks.is_empty()
    }

    pub fn busiest_week(&self) -> Option<&WeekTotal> {
        // max_by_key returns the last maximum; keep the earliest week instead.
        self.weeks
            .iter()
            .rev()
            .max_by_key(|w| w.commits)
            .filter(|w| w.commits > 0)
    }
}
