mod config;
mod db;
mod export;
mod extract;
mod ledger;
mod model;
mod notify;
mod pipeline;
mod report;
mod review;
mod targets;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::config::{Durability, Settings};
use crate::extract::browserless::BrowserlessExtractor;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::pipeline::{Deferred, Pipeline};

#[derive(Parser)]
#[command(name = "bad_review_watch", about = "Watch business review pages for new bad reviews")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every target once, store new bad reviews and notify
    Run {
        /// Read targets from this CSV instead of the configured source
        #[arg(short, long)]
        targets: Option<PathBuf>,
        /// Database file (overrides REVIEWS_DB_PATH)
        #[arg(long = "db")]
        db_path: Option<PathBuf>,
        /// Persist and export, but do not send the notification
        #[arg(long)]
        no_notify: bool,
    },
    /// Print the resolved target list
    Targets {
        #[arg(short, long)]
        targets: Option<PathBuf>,
    },
    /// Show ledger and store statistics
    Stats {
        #[arg(long = "db")]
        db_path: Option<PathBuf>,
    },
    /// Export every stored bad review as CSV
    Export {
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long = "db")]
        db_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;

    let result = match cli.command {
        Commands::Run { targets, db_path, no_notify } => {
            if let Some(path) = targets {
                settings.targets_file = Some(path);
            }
            if let Some(path) = db_path {
                settings.db_path = path;
            }
            run(&settings, no_notify).await
        }
        Commands::Targets { targets } => {
            if let Some(path) = targets {
                settings.targets_file = Some(path);
            }
            let list = targets::fetch_targets(&settings.target_source()?).await?;
            for (i, t) in list.iter().enumerate() {
                println!("{:>3} | {:<30} | {}", i + 1, truncate(&t.business_name, 30), t.url);
            }
            Ok(())
        }
        Commands::Stats { db_path } => {
            let conn = db::connect(&db_path.unwrap_or(settings.db_path))?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Seen ids:    {}", s.seen);
            println!("Bad reviews: {}", s.stored);
            if !s.by_business.is_empty() {
                println!("\n--- By business ---");
                for (name, n) in &s.by_business {
                    println!("  {:<30} {:>5}", truncate(name, 30), n);
                }
            }
            Ok(())
        }
        Commands::Export { out, db_path } => {
            let conn = db::connect(&db_path.unwrap_or(settings.db_path))?;
            db::init_schema(&conn)?;
            let reviews = db::fetch_reviews(&conn)?;
            if reviews.is_empty() {
                println!("No stored reviews.");
                return Ok(());
            }
            export::write_csv(&out, &reviews)?;
            println!("Exported {} reviews to {}", reviews.len(), out.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run(settings: &Settings, no_notify: bool) -> anyhow::Result<()> {
    // Nothing is touched on disk until the target list is in hand.
    let source = settings.target_source()?;
    let targets = targets::fetch_targets(&source)
        .await
        .with_context(|| format!("Failed to load targets from {}", source.describe()))?;

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    let mut ledger = db::load_ledger(&conn)?;
    if ledger.is_empty() {
        info!(db = %settings.db_path.display(), "No earlier reviews on record, starting fresh");
    }
    println!(
        "Checking {} targets ({} reviews already seen)...",
        targets.len(),
        ledger.len()
    );

    let extractor = BrowserlessExtractor::new(
        &settings.browserless_url,
        settings.browserless_token.as_deref(),
        settings.page_timeout(),
    )?;

    let pb = ProgressBar::new(targets.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let pipeline = Pipeline::new(&extractor, settings.bad_threshold).with_progress(pb.clone());
    let outcome = match settings.durability {
        Durability::Append => {
            let mut sink = db::AppendLog::new(&conn);
            pipeline.run(&targets, &mut ledger, &mut sink).await
        }
        Durability::Snapshot => pipeline.run(&targets, &mut ledger, &mut Deferred).await,
    };
    pb.finish_and_clear();

    println!(
        "Checked {} targets ({} failed): {} new bad reviews, {} malformed skipped.",
        outcome.targets_attempted,
        outcome.failed.len(),
        outcome.delta.len(),
        outcome.malformed
    );
    println!(
        "Rejected: {} already seen, {} above threshold, {} without id.",
        outcome.rejected.duplicate, outcome.rejected.above_threshold, outcome.rejected.missing_id
    );
    for f in &outcome.failed {
        println!("  failed: {} ({})", f.target.business_name, f.error);
    }
    if outcome.sink_error.is_some() {
        println!("Run stopped early: a review could not be saved.");
    }

    let notifier: Box<dyn Notifier> = match settings.webhook_url {
        Some(ref url) => Box::new(WebhookNotifier::new(url.clone(), settings.recipient.clone())),
        None => Box::new(LogNotifier),
    };
    let notifier = if no_notify { None } else { Some(notifier.as_ref()) };

    let reported = report::report(
        &conn,
        &ledger,
        &outcome.delta,
        &settings.export_path,
        notifier,
    )
    .await?;

    println!(
        "Final commit added {} review ids and {} review records.",
        reported.new_ids, reported.new_records
    );
    if let Some(path) = reported.exported {
        println!("Exported {} reviews to {}", outcome.delta.len(), path.display());
    } else {
        println!("No new bad reviews found.");
    }

    if reported.notified {
        println!("Notification sent.");
    }

    // Reviews found before a storage failure are reported above; the failure
    // itself still ends the run with an error.
    if let Some(e) = outcome.sink_error {
        if let Some(notify_error) = reported.notify_error {
            tracing::error!(error = %notify_error, "Notification also failed");
        }
        return Err(e.context("Run stopped early; reviews saved before the failure were reported"));
    }

    match reported.notify_error {
        Some(e) => Err(e.context("Reviews were saved but the notification was not sent")),
        None => Ok(()),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
