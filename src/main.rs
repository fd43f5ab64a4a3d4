use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use miniflux_janitor::client::{EntryStatus, MinifluxClient};
use miniflux_janitor::config::Config;
use miniflux_janitor::secrets::Credentials;
use miniflux_janitor::tasks::{
    self, fuzzy::DEFAULT_SENSITIVITY, recent::DEFAULT_WINDOW_HOURS, DedupeReport,
    SubscribeOutcome,
};

#[derive(Parser, Debug)]
#[command(
    name = "miniflux-janitor",
    version,
    about = "Housekeeping for a Miniflux feed reader"
)]
struct Args {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.config/miniflux-janitor/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log what would change without writing anything
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh every feed the server reports as failing
    RefreshFailing,

    /// Mark newer copies of the same title within one feed
    Dedupe {
        #[arg(long = "feed", value_name = "ID")]
        feed_id: i64,

        #[arg(long, value_enum, default_value_t = Action::Read)]
        action: Action,
    },

    /// Mark copies of a story that also appear in the preferred feed
    CrossFeed {
        #[arg(long = "feed", value_name = "ID", required = true, value_delimiter = ',')]
        feeds: Vec<i64>,

        /// Feed whose copy is kept
        #[arg(long, value_name = "ID")]
        keep: i64,
    },

    /// Mark unread entries whose title was read recently
    RecentSeen {
        #[arg(long = "feed", value_name = "ID", required = true, value_delimiter = ',')]
        feeds: Vec<i64>,

        #[arg(long, default_value_t = DEFAULT_WINDOW_HOURS, value_parser = clap::value_parser!(u32).range(1..=8760))]
        window_hours: u32,
    },

    /// Mark near-duplicate titles across feeds
    Fuzzy {
        #[arg(long = "feed", value_name = "ID", required = true, value_delimiter = ',')]
        feeds: Vec<i64>,

        /// Similarity threshold, 0-100
        #[arg(long, default_value_t = DEFAULT_SENSITIVITY as u8, value_parser = clap::value_parser!(u8).range(0..=100))]
        sensitivity: u8,

        #[arg(long, value_enum, default_value_t = Action::Read)]
        action: Action,
    },

    /// Subscribe to a feed
    AddFeed {
        url: String,

        #[arg(long = "category", value_name = "ID")]
        category_id: Option<i64>,
    },

    /// Apply [[filters]] block/keep rules from the config
    SyncFilters,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Action {
    Read,
    Removed,
}

impl From<Action> for EntryStatus {
    fn from(action: Action) -> Self {
        match action {
            Action::Read => EntryStatus::Read,
            Action::Removed => EntryStatus::Removed,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = Config::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    let dry_run = args.dry_run || config.dry_run;
    if dry_run {
        tracing::warn!("Dry run enabled, no changes will be made");
    }

    let credentials = Credentials::resolve(&config)
        .await
        .context("Failed to load Miniflux credentials")?;
    let client = MinifluxClient::new(credentials).context("Failed to create HTTP client")?;

    let user = client
        .me()
        .await
        .with_context(|| format!("Miniflux connection failed ({})", client.base_url()))?;
    tracing::info!(user = %user.username, "Connected to Miniflux");

    match args.command {
        Command::RefreshFailing => {
            let delay = Duration::from_secs(config.retry_delay_secs);
            let summary = tasks::refresh_failing(&client, delay, dry_run)
                .await
                .context("Failed to list feeds")?;

            if dry_run {
                println!(
                    "Dry run: would refresh {} failing feeds",
                    summary.would_refresh.len()
                );
                for (feed_id, title) in &summary.would_refresh {
                    println!("  feed {feed_id} ({title})");
                }
                return Ok(());
            }

            println!(
                "Refreshed {} of {} failing feeds ({} failed)",
                summary.succeeded(),
                summary.outcomes.len(),
                summary.failed()
            );
            for outcome in summary.failures() {
                let code = outcome
                    .http_code
                    .map_or_else(|| "no response".to_string(), |c| c.to_string());
                println!(
                    "  feed {} ({}): {} [{}]",
                    outcome.feed_id, outcome.title, outcome.status, code
                );
            }
        }
        Command::Dedupe { feed_id, action } => {
            let report = tasks::dedupe_feed(&client, feed_id, action.into(), dry_run)
                .await
                .context("Deduplication failed")?;
            print_dedupe("duplicate", &report);
        }
        Command::CrossFeed { feeds, keep } => {
            let report = tasks::dedupe_cross_feed(&client, &feeds, keep, dry_run)
                .await
                .context("Cross-feed deduplication failed")?;
            print_dedupe("cross-feed duplicate", &report);
        }
        Command::RecentSeen {
            feeds,
            window_hours,
        } => {
            let report =
                tasks::mark_recently_seen(&client, &feeds, window_hours, Utc::now(), dry_run)
                    .await
                    .context("Recently-seen cleanup failed")?;
            print_dedupe("already-seen", &report);
        }
        Command::Fuzzy {
            feeds,
            sensitivity,
            action,
        } => {
            let report = tasks::dedupe_fuzzy(
                &client,
                &feeds,
                f64::from(sensitivity),
                action.into(),
                dry_run,
            )
            .await
            .context("Fuzzy deduplication failed")?;
            print_dedupe("near-duplicate", &report);
        }
        Command::AddFeed { url, category_id } => {
            match tasks::add_feed(&client, &url, category_id, dry_run)
                .await
                .with_context(|| format!("Failed to subscribe to {url}"))?
            {
                SubscribeOutcome::Created(id) => println!("Subscribed: feed {id}"),
                SubscribeOutcome::AlreadySubscribed(id) => {
                    println!("Already subscribed: feed {id}")
                }
                SubscribeOutcome::DryRun => println!("Dry run: would subscribe to {url}"),
            }
        }
        Command::SyncFilters => {
            let report = tasks::sync_filters(&client, &config.filters, dry_run)
                .await
                .context("Filter sync failed")?;
            let changed = if dry_run {
                format!("{} would be updated", report.would_update.len())
            } else {
                format!("{} updated", report.updated.len())
            };
            println!(
                "Filter rules: {}, {} unchanged, {} missing, {} failed",
                changed,
                report.unchanged.len(),
                report.missing.len(),
                report.failed.len()
            );
            for (feed_id, error) in &report.failed {
                println!("  feed {feed_id}: {error}");
            }
        }
    }

    Ok(())
}

fn print_dedupe(kind: &str, report: &DedupeReport) {
    if report.marked.is_empty() {
        println!("No {} entries found ({} scanned)", kind, report.scanned);
        return;
    }
    let verb = if report.applied { "Marked" } else { "Would mark" };
    println!(
        "{} {} {} entries as {} ({} scanned)",
        verb,
        report.marked.len(),
        kind,
        report.action,
        report.scanned
    );
}
