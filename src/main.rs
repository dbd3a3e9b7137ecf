use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use revisit::config::Config;
use revisit::model::{self, Revision, RevisionId};
use revisit::store::RevisionStore;
use revisit::tracker::{ScanOutcome, Tracker};

#[derive(Parser)]
#[command(name = "revisit")]
#[command(about = "Track changes to plain-text notes and schedule spaced reviews", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "revisit.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter configuration and create the store layout
    Init {
        /// Directory containing the notes to track
        #[arg(long)]
        notes: PathBuf,
        /// Directory for revision storage (defaults to <notes>/.revisit)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// List files that are neither watched nor ignored yet
    New {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Start watching all new files (first revisions appear on the next scan)
    Add,

    /// Ignore all new files
    Ignore,

    /// Check watched documents and record a revision for each changed one
    Scan {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// List revisions due for review
    Due {
        /// Review this many days in advance
        #[arg(long, default_value_t = 0)]
        days: i64,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark reviews as completed and reschedule them
    Done {
        #[arg(required = true)]
        ids: Vec<u64>,
    },

    /// Hide a revision from review listings
    Hide { id: u64 },

    /// Show a hidden revision again
    Unhide { id: u64 },

    /// Show one revision, including its content and changed lines
    Show {
        id: u64,
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },

    /// List all revision metadata
    List {
        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Init {
        notes,
        store,
        force,
    } = &cli.command
    {
        return init(&cli.config, notes.clone(), store.clone(), *force);
    }

    let config = Config::load(&cli.config).with_context(|| {
        format!(
            "load config {} (run `revisit init` first)",
            cli.config.display()
        )
    })?;
    let mut tracker = Tracker::open(config)?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::New { json } => {
            let new = tracker.new_documents()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&new)?);
            } else {
                for name in &new {
                    println!("{name}");
                }
                if new.is_empty() {
                    println!("(No new files)");
                }
            }
        }
        Commands::Add => {
            let added = tracker.watch_new()?;
            for name in &added {
                println!("Now tracking {name}");
            }
            if added.is_empty() {
                println!("(No new files to add)");
            }
        }
        Commands::Ignore => {
            let ignored = tracker.ignore_new()?;
            for name in &ignored {
                println!("Now ignoring changes to {name}");
            }
            if ignored.is_empty() {
                println!("(No new files to ignore)");
            }
        }
        Commands::Scan { json } => {
            let outcome = tracker.scan()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_scan(&outcome);
            }
        }
        Commands::Due { days, json } => {
            let as_of = model::today() + time::Duration::days(days);
            let due = tracker.due_for_review(as_of)?;
            if json {
                let values = due
                    .iter()
                    .map(revision_json)
                    .collect::<Result<Vec<_>>>()?;
                println!("{}", serde_json::to_string_pretty(&values)?);
            } else {
                for revision in &due {
                    let changed = revision
                        .payload
                        .as_ref()
                        .map(|payload| payload.changelist.len())
                        .unwrap_or(0);
                    println!(
                        "#{} {} scheduled {} ({} changed line(s), {} review(s) done)",
                        revision.id,
                        revision.document_key,
                        model::format_date(revision.scheduled_date)?,
                        changed,
                        revision.completions_done,
                    );
                }
                if due.is_empty() {
                    println!("No revisions due for review");
                }
            }
        }
        Commands::Done { ids } => {
            let mut failed = 0;
            for id in ids {
                match tracker.complete_review(RevisionId(id)) {
                    Ok(revision) => println!(
                        "Revision {} for {} rescheduled for {}",
                        revision.id,
                        revision.document_key,
                        model::format_date(revision.scheduled_date)?,
                    ),
                    Err(err) => {
                        eprintln!("warning: {err}");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} review(s) could not be completed");
            }
        }
        Commands::Hide { id } => {
            tracker.set_hidden(RevisionId(id), true)?;
            println!("Revision {id} hidden");
        }
        Commands::Unhide { id } => {
            tracker.set_hidden(RevisionId(id), false)?;
            println!("Revision {id} visible again");
        }
        Commands::Show { id, json } => {
            let revision = tracker.revision(RevisionId(id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&revision_json(&revision)?)?);
            } else {
                print_revision(&revision)?;
            }
        }
        Commands::List { json } => {
            let revisions = tracker.all_revisions()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&revisions)?);
            } else {
                for revision in &revisions {
                    println!(
                        "#{} {} captured {} scheduled {} reviews {} hidden {}",
                        revision.id,
                        revision.document_key,
                        model::format_timestamp(revision.captured_at)?,
                        model::format_date(revision.scheduled_date)?,
                        revision.completions_done,
                        revision.hidden,
                    );
                }
                if revisions.is_empty() {
                    println!("(No revisions recorded)");
                }
            }
        }
    }

    Ok(())
}

fn init(config_path: &Path, notes: PathBuf, store: Option<PathBuf>, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    let base_dir = store.unwrap_or_else(|| notes.join(".revisit"));
    let config = Config::new(base_dir, notes);
    config.save(config_path)?;
    RevisionStore::open(&config.base_dir)?;
    println!("Initialized store at {}", config.base_dir.display());
    println!("Configuration written to {}", config_path.display());
    Ok(())
}

fn print_scan(outcome: &ScanOutcome) {
    println!(
        "{} new revision(s), {} document(s) unchanged",
        outcome.created, outcome.unchanged
    );
    for skipped in &outcome.skipped {
        println!("skipped {}: {}", skipped.document_key, skipped.reason);
    }
    if outcome.created == 0 {
        println!("(No reviewable changes found. Deleted lines don't count as reviewable.)");
    }
}

fn print_revision(revision: &Revision) -> Result<()> {
    println!("revision {}", revision.id);
    println!("document:    {}", revision.document_key);
    println!("captured:    {}", model::format_timestamp(revision.captured_at)?);
    println!("scheduled:   {}", model::format_date(revision.scheduled_date)?);
    println!("completions: {}", revision.completions_done);
    println!("hidden:      {}", revision.hidden);
    if let Some(payload) = &revision.payload {
        let changed = payload
            .changelist
            .iter()
            .map(|index| index.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!("changed lines: [{changed}]");
        println!("---");
        println!("{}", payload.content);
    }
    Ok(())
}

// Payloads are serde-skipped on the metadata row, so JSON output that should
// carry them is assembled here.
fn revision_json(revision: &Revision) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(revision)?;
    if let (Some(payload), Some(object)) = (&revision.payload, value.as_object_mut()) {
        object.insert(
            "content".to_string(),
            serde_json::Value::String(payload.content.clone()),
        );
        object.insert("changelist".to_string(), serde_json::json!(payload.changelist));
    }
    Ok(value)
}
