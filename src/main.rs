use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use profile_insights::github::RateLimitSnapshot;
use profile_insights::models::{ActivityRanking, LanguageDistribution, Profile, WeeklyActivity};
use profile_insights::{
    AggregateConfig, AggregateSnapshot, AggregateStatus, Aggregator, CacheConfig, Config,
    GitHubApi, GitHubClient, ProfileStats, ProfileStore, QueryCache, ResumeSummary,
};

#[derive(Parser, Debug)]
#[command(name = "profile-insights")]
#[command(version = "0.1.0")]
#[command(about = "Summarize a GitHub profile: languages, repository activity and a resume")]
struct Args {
    /// GitHub username to summarize
    #[arg(short, long)]
    username: String,

    /// Output format (json, text, markdown)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<String>,

    /// What to render (overview, resume, languages, activity)
    #[arg(long, default_value = "overview")]
    view: String,

    /// Number of languages in the distribution
    #[arg(long)]
    top_languages: Option<usize>,

    /// Number of repositories in the activity ranking
    #[arg(long)]
    top_repos: Option<usize>,

    /// Follow every page of the repository list
    #[arg(long)]
    all_pages: bool,

    /// Leave forked repositories out of the aggregates
    #[arg(long)]
    exclude_forks: bool,

    /// Show a progress bar while fetching per-repository data
    #[arg(long)]
    progress: bool,
}

/// Outcome of one derived view as the CLI presents it.
#[derive(Debug, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
enum Section<T> {
    Ready(T),
    /// Resolved successfully with nothing to show.
    Empty,
    /// Not resolved yet.
    Pending,
    Error(String),
}

impl<T: Clone> Section<T> {
    fn from_snapshot(snapshot: AggregateSnapshot<T>, is_empty: impl Fn(&T) -> bool) -> Self {
        match (snapshot.status, snapshot.data, snapshot.error) {
            (AggregateStatus::Ready, Some(data), _) if is_empty(&*data) => Section::Empty,
            (AggregateStatus::Ready, Some(data), _) => Section::Ready((*data).clone()),
            (AggregateStatus::Ready, None, _) => Section::Empty,
            (AggregateStatus::Error, _, error) => Section::Error(
                error
                    .map(|e| e.message().to_string())
                    .unwrap_or_else(|| "Something went wrong while fetching data".to_string()),
            ),
            (AggregateStatus::Idle | AggregateStatus::Loading, _, _) => Section::Pending,
        }
    }
}

#[derive(Debug, Serialize)]
struct Overview {
    profile: Profile,
    stats: ProfileStats,
    languages: Section<LanguageDistribution>,
    activity: Section<ActivityRanking>,
    weekly: Section<WeeklyActivity>,
    rate_limit: Option<RateLimitSnapshot>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Report {
    Overview(Box<Overview>),
    Resume(ResumeSummary),
    Languages(Section<LanguageDistribution>),
    Activity(Section<ActivityRanking>),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("profile_insights=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = Config::from_env()?;

    let mut aggregate_config = AggregateConfig::from(&config);
    if let Some(n) = args.top_languages {
        aggregate_config.top_languages = n;
    }
    if let Some(n) = args.top_repos {
        aggregate_config.top_repositories = n;
    }
    aggregate_config.include_forks &= !args.exclude_forks;
    aggregate_config.fetch_all_pages = args.all_pages;
    aggregate_config.show_progress = args.progress;

    // Initialize clients
    let client = Arc::new(GitHubClient::from_config(&config)?);
    let store = ProfileStore::with_cache(
        Arc::clone(&client) as Arc<dyn GitHubApi>,
        QueryCache::new(),
        CacheConfig::from(&config),
    )
    .fetch_all_pages(aggregate_config.fetch_all_pages);
    let aggregator = Aggregator::new(store, aggregate_config);

    tracing::info!("Building {} view for GitHub user: {}", args.view, args.username);
    let report = build_report(&aggregator, &args).await?;

    let rate_limit = client.rate_limits().latest();
    let report = match report {
        Report::Overview(mut overview) => {
            overview.rate_limit = rate_limit;
            Report::Overview(overview)
        }
        other => other,
    };

    output_report(&report, &args)?;

    Ok(())
}

async fn build_report(aggregator: &Aggregator, args: &Args) -> anyhow::Result<Report> {
    let handle = args.username.trim();
    if handle.is_empty() {
        anyhow::bail!("A GitHub username is required");
    }
    let store = aggregator.store();

    match args.view.as_str() {
        "languages" => {
            let languages = aggregator.aggregate_languages(handle).await;
            Ok(Report::Languages(Section::from_snapshot(languages, LanguageDistribution::is_empty)))
        }
        "activity" => {
            let ranking = aggregator.activity_ranking(handle).await;
            Ok(Report::Activity(Section::from_snapshot(ranking, ActivityRanking::is_empty)))
        }
        "resume" => {
            let (profile, repos) = tokio::join!(store.profile(handle), store.repos(handle));
            let profile = require(profile.result(), "profile")?;
            let repos = require(repos.result(), "repositories")?;
            Ok(Report::Resume(ResumeSummary::build(&profile, &repos)))
        }
        "overview" => {
            let (profile, languages, activity, weekly) = tokio::join!(
                store.profile(handle),
                aggregator.aggregate_languages(handle),
                aggregator.activity_ranking(handle),
                aggregator.aggregate_commit_activity(handle),
            );
            let profile = require(profile.result(), "profile")?;

            Ok(Report::Overview(Box::new(Overview {
                stats: ProfileStats::from(profile.as_ref()),
                profile: profile.as_ref().clone(),
                languages: Section::from_snapshot(languages, LanguageDistribution::is_empty),
                activity: Section::from_snapshot(activity, ActivityRanking::is_empty),
                weekly: Section::from_snapshot(weekly, WeeklyActivity::is_empty),
                rate_limit: None,
            })))
        }
        other => anyhow::bail!("Unknown view: {} (expected overview, resume, languages or activity)", other),
    }
}

fn require<T>(result: Option<profile_insights::Result<Arc<T>>>, what: &str) -> anyhow::Result<Arc<T>> {
    match result {
        Some(Ok(value)) => Ok(value),
        Some(Err(error)) => anyhow::bail!("Failed to fetch {}: {}", what, error.message()),
        None => anyhow::bail!("No {} data found", what),
    }
}

fn output_report(report: &Report, args: &Args) -> anyhow::Result<()> {
    let output = match args.format.as_str() {
        "json" => serde_json::to_string_pretty(report)?,
        "markdown" => format_markdown(report),
        _ => format_text(report),
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        tracing::info!("Output written to: {}", path);
    } else {
        println!("{}", output);
    }

    Ok(())
}

/// Chart labels longer than 12 characters are cut to 10 plus an ellipsis.
fn short_name(name: &str) -> String {
    if name.chars().count() > 12 {
        format!("{}...", name.chars().take(10).collect::<String>())
    } else {
        name.to_string()
    }
}

fn bar(percentage: f32) -> String {
    "#".repeat((percentage / 5.0).round() as usize)
}

fn format_text(report: &Report) -> String {
    let mut output = String::new();

    match report {
        Report::Overview(overview) => {
            let profile = &overview.profile;
            output.push_str(&format!("\n=== GitHub Profile: {} ===\n\n", profile.login));
            output.push_str(&format!("Name: {}\n", profile.display_name()));
            if let Some(ref bio) = profile.bio {
                output.push_str(&format!("Bio: {}\n", bio));
            }
            if let Some(ref location) = profile.location {
                output.push_str(&format!("Location: {}\n", location));
            }
            output.push_str(&format!("Profile: {}\n\n", profile.html_url));

            let stats = &overview.stats;
            output.push_str(&format!(
                "Repositories: {}  Followers: {}  Following: {}  Gists: {}\n",
                stats.public_repos, stats.followers, stats.following, stats.public_gists
            ));

            text_languages(&mut output, &overview.languages);
            text_activity(&mut output, &overview.activity);
            text_weekly(&mut output, &overview.weekly);

            if let Some(rate) = overview.rate_limit {
                output.push_str(&format!(
                    "\nAPI rate limit: {}/{} remaining (resets {})\n",
                    rate.remaining,
                    rate.limit,
                    rate.reset_display()
                ));
                if rate.is_low() {
                    output.push_str("Warning: GitHub API rate limit is almost exhausted\n");
                }
            }
        }
        Report::Resume(resume) => {
            output.push_str(&format!("\n{}\n{}\n\n", resume.display_name, resume.headline));
            if let Some(ref location) = resume.location {
                output.push_str(&format!("Location: {}\n", location));
            }
            if let Some(ref website) = resume.website {
                output.push_str(&format!("Website: {} <{}>\n", website.display, website.url));
            }
            output.push_str(&format!("GitHub: {}\n", resume.profile_url));

            output.push_str("\nTechnical Skills:\n");
            if resume.top_languages.is_empty() {
                output.push_str("  (none)\n");
            } else {
                output.push_str(&format!("  {}\n", resume.top_languages.join(", ")));
            }

            output.push_str("\nTop Projects:\n");
            for project in &resume.top_projects {
                output.push_str(&format!(
                    "  - {} (stars: {}, forks: {})\n    {}\n",
                    project.name, project.stars, project.forks, project.description
                ));
            }
        }
        Report::Languages(languages) => text_languages(&mut output, languages),
        Report::Activity(activity) => text_activity(&mut output, activity),
    }

    output
}

fn text_languages(output: &mut String, section: &Section<LanguageDistribution>) {
    output.push_str("\nLanguages:\n");
    match section {
        Section::Ready(distribution) => {
            for language in &distribution.languages {
                output.push_str(&format!(
                    "  {:<14} {:>5.1}% {}\n",
                    language.language,
                    language.percentage,
                    bar(language.percentage)
                ));
            }
            output.push_str(&format!(
                "  ({} bytes across {} repositories)\n",
                distribution.total_bytes, distribution.repository_count
            ));
        }
        Section::Empty => output.push_str("  No language data available\n"),
        Section::Pending => output.push_str("  Still loading\n"),
        Section::Error(message) => output.push_str(&format!("  Error: {}\n", message)),
    }
}

fn text_activity(output: &mut String, section: &Section<ActivityRanking>) {
    output.push_str("\nMost Active Repositories:\n");
    match section {
        Section::Ready(ranking) => {
            for repo in &ranking.repositories {
                output.push_str(&format!(
                    "  {:<14} stars: {:<5} forks: {:<5} issues: {:<5} score: {}\n",
                    short_name(&repo.name),
                    repo.stars,
                    repo.forks,
                    repo.issues,
                    repo.score
                ));
            }
        }
        Section::Empty => output.push_str("  No repository activity data available\n"),
        Section::Pending => output.push_str("  Still loading\n"),
        Section::Error(message) => output.push_str(&format!("  Error: {}\n", message)),
    }
}

fn text_weekly(output: &mut String, section: &Section<WeeklyActivity>) {
    output.push_str("\nCommit Activity (last year):\n");
    match section {
        Section::Ready(weekly) => {
            output.push_str(&format!(
                "  {} commits across {} repositories\n",
                weekly.total_commits, weekly.repository_count
            ));
            if let Some(week) = weekly.busiest_week() {
                output.push_str(&format!(
                    "  Busiest week: {} ({} commits)\n",
                    week.week.format("%Y-%m-%d"),
                    week.commits
                ));
            }
        }
        Section::Empty => output.push_str("  No commit activity available\n"),
        Section::Pending => output.push_str("  Still loading\n"),
        Section::Error(message) => output.push_str(&format!("  Error: {}\n", message)),
    }
}

fn format_markdown(report: &Report) -> String {
    let mut output = String::new();

    match report {
        Report::Overview(overview) => {
            let profile = &overview.profile;
            output.push_str(&format!("# GitHub Profile: {}\n\n", profile.login));
            output.push_str(&format!("**Name:** {}\n\n", profile.display_name()));
            if let Some(ref bio) = profile.bio {
                output.push_str(&format!("> {}\n\n", bio));
            }

            let stats = &overview.stats;
            output.push_str("## Stats\n\n");
            output.push_str("| Metric | Value |\n|--------|-------|\n");
            output.push_str(&format!("| Public Repositories | {} |\n", stats.public_repos));
            output.push_str(&format!("| Followers | {} |\n", stats.followers));
            output.push_str(&format!("| Following | {} |\n", stats.following));
            output.push_str(&format!("| Public Gists | {} |\n", stats.public_gists));

            markdown_languages(&mut output, &overview.languages);
            markdown_activity(&mut output, &overview.activity);

            output.push_str("\n## Commit Activity\n\n");
            match &overview.weekly {
                Section::Ready(weekly) => output.push_str(&format!(
                    "{} commits across {} repositories over {} weeks\n",
                    weekly.total_commits,
                    weekly.repository_count,
                    weekly.weeks.len()
                )),
                Section::Empty => output.push_str("*No commit activity available*\n"),
                Section::Pending => output.push_str("*Still loading*\n"),
                Section::Error(message) => output.push_str(&format!("**Error:** {}\n", message)),
            }
        }
        Report::Resume(resume) => {
            output.push_str(&format!("# {}\n\n", resume.display_name));
            output.push_str(&format!("*{}*\n\n", resume.headline));

            let mut contact = Vec::new();
            if let Some(ref location) = resume.location {
                contact.push(location.clone());
            }
            if let Some(ref website) = resume.website {
                contact.push(format!("[{}]({})", website.display, website.url));
            }
            contact.push(format!(
                "[{}]({})",
                resume.profile_url.trim_start_matches("https://"),
                resume.profile_url
            ));
            output.push_str(&format!("{}\n\n", contact.join(" | ")));

            output.push_str("## Technical Skills\n\n");
            for language in &resume.top_languages {
                output.push_str(&format!("`{}` ", language));
            }
            output.push_str("\n\n## Top Projects\n\n");
            for project in &resume.top_projects {
                output.push_str(&format!(
                    "### {}\n\n{}\n\nStars: {} | Forks: {}\n\n",
                    project.name, project.description, project.stars, project.forks
                ));
            }
        }
        Report::Languages(languages) => markdown_languages(&mut output, languages),
        Report::Activity(activity) => markdown_activity(&mut output, activity),
    }

    output
}

fn markdown_languages(output: &mut String, section: &Section<LanguageDistribution>) {
    output.push_str("\n## Languages\n\n");
    match section {
        Section::Ready(distribution) => {
            output.push_str("| Language | Bytes | Share |\n|----------|-------|-------|\n");
            for language in &distribution.languages {
                output.push_str(&format!(
                    "| {} | {} | {:.1}% |\n",
                    language.language, language.bytes, language.percentage
                ));
            }
        }
        Section::Empty => output.push_str("*No language data available*\n"),
        Section::Pending => output.push_str("*Still loading*\n"),
        Section::Error(message) => output.push_str(&format!("**Error:** {}\n", message)),
    }
}

fn markdown_activity(output: &mut String, section: &Section<ActivityRanking>) {
    output.push_str("\n## Most Active Repositories\n\n");
    match section {
        Section::Ready(ranking) => {
            output.push_str("| Repository | Stars | Forks | Issues | Score |\n");
            output.push_str("|------------|-------|-------|--------|-------|\n");
            for repo in &ranking.repositories {
                output.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    repo.name, repo.stars, repo.forks, repo.issues, repo.score
                ));
            }
        }
        Section::Empty => output.push_str("*No repository activity data available*\n"),
        Section::Pending => output.push_str("*Still loading*\n"),
        Section::Error(message) => output.push_str(&format!("**Error:** {}\n", message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profile_insights::Error;

    fn snapshot<T>(status: AggregateStatus, data: Option<T>, error: Option<Error>) -> AggregateSnapshot<T> {
        AggregateSnapshot {
            status,
            data: data.map(Arc::new),
            error,
        }
    }

    #[test]
    fn test_unresolved_views_are_not_reported_empty() {
        let idle = snapshot::<LanguageDistribution>(AggregateStatus::Idle, None, None);
        let loading = snapshot::<LanguageDistribution>(AggregateStatus::Loading, None, None);

        assert!(matches!(Section::from_snapshot(idle, LanguageDistribution::is_empty), Section::Pending));
        assert!(matches!(Section::from_snapshot(loading, LanguageDistribution::is_empty), Section::Pending));
    }

    #[test]
    fn test_empty_success_and_error_sections() {
        let empty = snapshot(AggregateStatus::Ready, Some(LanguageDistribution::default()), None);
        assert!(matches!(Section::from_snapshot(empty, LanguageDistribution::is_empty), Section::Empty));

        let failed = snapshot::<LanguageDistribution>(
            AggregateStatus::Error,
            None,
            Some(Error::Transport {
                message: "connection reset".to_string(),
            }),
        );
        match Section::from_snapshot(failed, LanguageDistribution::is_empty) {
            Section::Error(message) => assert_eq!(message, "connection reset"),
            other => panic!("expected an error section, got {:?}", other),
        }
    }

    #[test]
    fn test_pending_section_text() {
        let mut output = String::new();
        text_languages(&mut output, &Section::Pending);
        assert!(output.contains("Still loading"));
        assert!(!output.contains("No language data"));
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("tiny"), "tiny");
        assert_eq!(short_name("exactly12chr"), "exactly12chr");
        assert_eq!(short_name("a-very-long-repository"), "a-very-lon...");
    }
}
