//! Pure reductions from per-repository data to profile-wide views.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::DateTime;

use crate::models::{
    ActivityRanking, CommitActivity, LanguageBreakdown, LanguageDistribution, LanguageTotal,
    RepoActivity, Repository, WeekTotal, WeeklyActivity,
};

/// Sums bytes per language over `breakdowns` (in the order given), sorts by
/// descending total and keeps the first `top_n`. Equal totals keep the order
/// in which the languages were first seen.
pub fn reduce_languages<'a, I>(breakdowns: I, top_n: usize) -> LanguageDistribution
where
    I: IntoIterator<Item = &'a LanguageBreakdown>,
{
    let mut totals = LanguageBreakdown::new();
    let mut repository_count = 0;
    for breakdown in breakdowns {
        repository_count += 1;
        for (language, bytes) in breakdown.iter() {
            totals.add(language, bytes);
        }
    }

    let total_bytes = totals.total_bytes();
    let mut ranked: Vec<(&str, u64)> = totals.iter().collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(top_n);

    let languages = ranked
        .into_iter()
        .map(|(language, bytes)| LanguageTotal {
            language: language.to_string(),
            bytes,
            percentage: if total_bytes == 0 {
                0.0
            } else {
                (bytes as f64 / total_bytes as f64 * 100.0) as f32
            },
        })
        .collect();

    LanguageDistribution {
        languages,
        total_bytes,
        repository_count,
    }
}

/// Ranks repositories by stars + forks + open issues, ties keeping input
/// order, and keeps the first `top_n`.
pub fn rank_activity(repos: &[Repository], top_n: usize) -> ActivityRanking {
    let mut ranked: Vec<&Repository> = repos.iter().collect();
    ranked.sort_by_key(|repo| Reverse(repo.activity_score()));

    let repositories = ranked
        .into_iter()
        .take(top_n)
        .map(|repo| RepoActivity {
            name: repo.name.clone(),
            full_name: repo.full_name.clone(),
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            issues: repo.open_issues_count,
            watchers: repo.watchers_count,
            score: repo.activity_score(),
        })
        .collect();

    ActivityRanking {
        repositories,
        considered: repos.len(),
    }
}

/// Adds up weekly commit counts across repositories, oldest week first.
pub fn sum_weekly_activity<'a, I>(series: I) -> WeeklyActivity
where
    I: IntoIterator<Item = &'a Vec<CommitActivity>>,
{
    let mut by_week: BTreeMap<i64, (u32, [u32; 7])> = BTreeMap::new();
    let mut repository_count = 0;

    for weeks in series {
        if weeks.is_empty() {
            continue;
        }
        repository_count += 1;

        for week in weeks {
            let slot = by_week.entry(week.week).or_insert((0, [0; 7]));
            slot.0 += week.total;
            for (day, count) in slot.1.iter_mut().zip(&week.days) {
                *day += count;
            }
        }
    }

    let weeks: Vec<WeekTotal> = by_week
        .into_iter()
        .filter_map(|(week, (commits, days))| {
            DateTime::from_timestamp(week, 0).map(|week| WeekTotal { week, commits, days })
        })
        .collect();
    let total_commits = weeks.iter().map(|w| u64::from(w.commits)).sum();

    WeeklyActivity {
        weeks,
        total_commits,
        repository_count,
    }
}
