// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use podsync::config::{self, Config};
use podsync::{
    Catalog, EpisodeRecord, HttpFeedSource, NoopReporter, PodcastId, ProgressEvent,
    ProgressReporter, ReqwestClient, SharedProgressReporter, SqliteCatalog, SweepReport,
    SyncEngine, SyncOutcome,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Ingest podcast feeds into a catalog and keep it synchronized
#[derive(Parser, Debug)]
#[command(name = "podsync")]
#[command(about = "Ingest podcast feeds into a catalog and keep it synchronized")]
#[command(version)]
struct Args {
    /// Path to YAML config file (defaults to ./podsync.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database URL, overrides DATABASE_URL and the config file
    #[arg(long, global = true)]
    database: Option<String>,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a podcast from an RSS feed URL or local file
    Import { feed: String },

    /// Sync a single podcast
    Sync { podcast_id: PodcastId },

    /// Sync every podcast that has a feed URL
    SyncAll,

    /// Sweep the catalog now and then on every interval until Ctrl-C
    Watch {
        /// Seconds between sweeps, overrides the config file
        #[arg(long)]
        interval: Option<u64>,
    },

    /// List podcasts in the catalog
    List,

    /// List stored episodes of a podcast, newest first
    Episodes { podcast_id: PodcastId },
}

/// Progress reporter using an indicatif spinner for terminal output
struct IndicatifReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };
        let bar = guard.get_or_insert_with(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {wide_msg}") {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        f(bar);
    }

    /// Clear the spinner once a command's work is done
    fn finish(&self) {
        if let Ok(mut guard) = self.bar.lock()
            && let Some(bar) = guard.take()
        {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::SweepStarted { total_podcasts } => {
                self.with_bar(|bar| {
                    bar.set_message(format!(
                        "{HEADPHONES}Sweeping {} podcasts",
                        total_podcasts.to_string().cyan()
                    ))
                });
            }

            ProgressEvent::FetchingFeed { url, .. } => {
                self.with_bar(|bar| bar.set_message(format!("{SEARCH}Fetching feed: {}", url.cyan())));
            }

            ProgressEvent::FeedReconciled {
                podcast_title,
                total_episodes,
                new_episodes,
                ..
            } => {
                self.with_bar(|bar| {
                    bar.set_message(format!(
                        "{HEADPHONES}{} • {} episodes in feed, {} new",
                        podcast_title.bold().green(),
                        total_episodes.to_string().cyan(),
                        new_episodes.to_string().yellow()
                    ))
                });
            }

            ProgressEvent::PodcastSynced {
                podcast_title,
                episodes_added,
                ..
            } => {
                self.with_bar(|bar| {
                    bar.println(format!(
                        "  {SUCCESS}{} +{}",
                        truncate_title(&podcast_title, 50).green(),
                        episodes_added
                    ))
                });
            }

            ProgressEvent::PodcastFailed { podcast_id, error } => {
                self.with_bar(|bar| {
                    bar.println(format!(
                        "  {FAILURE}{} - {}",
                        format!("podcast {podcast_id}").red(),
                        error.red()
                    ))
                });
            }

            ProgressEvent::SweepCompleted { .. } => self.finish(),
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let truncated: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

fn database_url(args: &Args, cfg: &Config) -> String {
    args.database
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| cfg.database_url.clone())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_outcome(outcome: &SyncOutcome) {
    if outcome.succeeded {
        println!(
            "{SUCCESS}Podcast {} synced: {} new episodes, {} already ingested",
            outcome.podcast_id.to_string().cyan(),
            outcome.episodes_added.to_string().green().bold(),
            outcome.duplicates_skipped.to_string().yellow()
        );
    } else {
        println!(
            "{FAILURE}Podcast {} not synced: {}",
            outcome.podcast_id.to_string().cyan(),
            outcome.error.as_deref().unwrap_or("unknown error").red()
        );
    }
}

fn print_report(report: &SweepReport) {
    println!(
        "\n{PARTY}{} {} synced, {} failed, {} new episodes",
        "Sweep complete:".bold().green(),
        report.succeeded().to_string().green().bold(),
        if report.failed() > 0 {
            report.failed().to_string().red().bold()
        } else {
            report.failed().to_string().green()
        },
        report.episodes_added().to_string().cyan()
    );

    let failures: Vec<_> = report.outcomes.iter().filter(|o| !o.succeeded).collect();
    if !failures.is_empty() {
        println!("\n{}", "Failed podcasts:".red().bold());
        for outcome in failures {
            println!(
                "  {}{} - {}",
                CROSS,
                outcome.podcast_id.to_string().yellow(),
                outcome.error.as_deref().unwrap_or("").dimmed()
            );
        }
    }
}

fn format_duration(seconds: u32) -> String {
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

fn print_episode(episode: &EpisodeRecord) {
    let date = episode
        .published_at
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());
    let numbering = match (episode.season_number, episode.episode_number) {
        (Some(s), Some(e)) => format!("S{s:02}E{e:02} "),
        (None, Some(e)) => format!("#{e} "),
        _ => String::new(),
    };
    let duration = episode
        .duration_seconds
        .map(|d| format!(" ({})", format_duration(d)))
        .unwrap_or_default();
    println!(
        "  {} {}{}{}",
        date.dimmed(),
        numbering.cyan(),
        episode.title,
        duration.dimmed()
    );
}

/// Run `sweep` now and on every tick until `shutdown` resolves.
///
/// `shutdown` is created once, so a signal arriving mid-sweep is remembered:
/// the running sweep completes and the loop exits before the next one.
async fn run_watch<S, Fut>(
    period: Duration,
    shutdown: impl Future<Output = ()>,
    mut sweep: S,
) -> Result<()>
where
    S: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("received Ctrl-C, stopping");
                return Ok(());
            }
            _ = ticker.tick() => sweep().await?,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(args.config.as_deref()).context("Failed to load configuration")?;

    if !args.quiet && !args.json {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podsync".bold().magenta(),
            "- Podcast Catalog Sync".dimmed()
        );
    }

    let catalog = SqliteCatalog::connect(&database_url(&args, &cfg))
        .await
        .context("Failed to open catalog database")?;
    let client = ReqwestClient::with_timeout(cfg.fetch.timeout(), &cfg.fetch.user_agent)
        .context("Failed to build HTTP client")?;

    let spinner = (!args.quiet && !args.json).then(|| Arc::new(IndicatifReporter::new()));
    let reporter: SharedProgressReporter = match &spinner {
        Some(spinner) => spinner.clone(),
        None => NoopReporter::shared(),
    };
    let finish_progress = || {
        if let Some(spinner) = &spinner {
            spinner.finish();
        }
    };
    let engine = SyncEngine::new(HttpFeedSource::new(client), catalog).with_reporter(reporter);

    match &args.command {
        Command::Import { feed } => {
            let podcast_id = engine
                .import_from_feed(feed)
                .await
                .with_context(|| format!("Failed to import {feed}"));
            finish_progress();
            let podcast_id = podcast_id?;
            if args.json {
                print_json(&serde_json::json!({ "podcast_id": podcast_id }))?;
            } else {
                let count = engine.catalog().list_episodes(podcast_id).await?.len();
                println!(
                    "{PARTY}Imported podcast {} with {} episodes",
                    podcast_id.to_string().cyan().bold(),
                    count.to_string().green()
                );
            }
        }

        Command::Sync { podcast_id } => {
            let outcome = engine.sync_podcast(*podcast_id).await;
            finish_progress();
            if args.json {
                print_json(&outcome)?;
            } else if !args.quiet {
                print_outcome(&outcome);
            }
            if !outcome.succeeded {
                std::process::exit(1);
            }
        }

        Command::SyncAll => {
            let report = engine.sync_all_podcasts().await.context("Catalog sweep failed")?;
            if args.json {
                print_json(&report)?;
            } else if !args.quiet {
                print_report(&report);
            }
        }

        Command::Watch { interval } => {
            let period = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| cfg.schedule.interval());
            anyhow::ensure!(!period.is_zero(), "watch interval must be > 0");
            info!(interval_secs = period.as_secs(), "watching catalog");

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            let (engine, json, quiet) = (&engine, args.json, args.quiet);
            run_watch(period, shutdown, move || async move {
                match engine.sync_all_podcasts().await {
                    Ok(report) if json => print_json(&report)?,
                    Ok(report) if !quiet => print_report(&report),
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "sweep failed, retrying on next tick"),
                }
                Ok(())
            })
            .await?;
        }

        Command::List => {
            let podcasts = engine.catalog().list_podcasts().await?;
            if args.json {
                print_json(&podcasts)?;
            } else {
                for podcast in podcasts {
                    let synced = podcast
                        .last_synced_at
                        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "never".to_string());
                    println!(
                        "{:>5}  {}  {}  {}",
                        podcast.id.to_string().cyan(),
                        podcast.title.bold(),
                        podcast.feed_url.as_deref().unwrap_or("-").dimmed(),
                        format!("synced {synced}").dimmed()
                    );
                }
            }
        }

        Command::Episodes { podcast_id } => {
            let podcast = engine
                .catalog()
                .get_podcast(*podcast_id)
                .await?
                .with_context(|| format!("Podcast {podcast_id} not found"))?;
            let episodes = engine.catalog().list_episodes(*podcast_id).await?;
            if args.json {
                print_json(&episodes)?;
            } else {
                println!(
                    "{HEADPHONES}{} • {} episodes",
                    podcast.title.bold().green(),
                    episodes.len().to_string().cyan()
                );
                for episode in &episodes {
                    print_episode(episode);
                }
            }
        }
    }

    Ok(())
}
