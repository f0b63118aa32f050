use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use tracing::info;
use zenflow_core::{config::ensure_parent_dir, Quality, ZenflowConfig};
use zenflow_store::{SqliteKv, TaskStore};

mod cli;
mod daemon;
mod output;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "zenflow_cli=info,zenflow_reminder=info,zenflow_store=info".into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // load config: --config / ZENFLOW_CONFIG > ~/.zenflow/zenflow.toml
    let mut config = ZenflowConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        ZenflowConfig::default()
    });
    if let Some(db) = cli.db {
        config.store.path = db;
    }

    let db_path = config.store.path.clone();
    let store = Arc::new(open_store(&db_path)?);

    match cli.command {
        Command::Add {
            text,
            due,
            in_minutes,
            alarm,
        } => {
            let due_date = parse_due(due.as_deref(), in_minutes, Utc::now())?;
            let task = store.add(text, due_date, alarm);
            println!("Added {}", output::task_line(&task));
        }

        Command::List => output::print_tasks(&store.all()),

        Command::Upcoming { limit } => output::print_tasks(&store.upcoming(limit)),

        Command::Done { id } => {
            let task = store.find(&id)?;
            let task = store.toggle(&task.id)?;
            println!("{}", output::task_line(&task));
        }

        Command::Rate { id, quality } => {
            let quality: Quality = quality.parse()?;
            let task = store.find(&id)?;
            let task = store.set_quality(&task.id, quality)?;
            println!("{}", output::task_line(&task));
        }

        Command::Rm { id } => {
            let task = store.find(&id)?;
            store.remove(&task.id)?;
            println!("Removed '{}'", task.text);
        }

        Command::Stats => output::print_stats(&store.stats()),

        Command::Run => daemon::run(config, Arc::clone(&store)).await?,
    }

    if store.is_dirty() {
        anyhow::bail!("changes could not be saved to {db_path}");
    }
    Ok(())
}

/// Open the SQLite-backed task store, creating the directory on first use.
fn open_store(path: &str) -> Result<TaskStore> {
    ensure_parent_dir(path).with_context(|| format!("cannot create directory for {path}"))?;
    info!(%path, "opening task database");
    let kv = SqliteKv::open(path).with_context(|| format!("cannot open {path}"))?;
    Ok(TaskStore::load(Box::new(kv)))
}

/// Resolve `--due` / `--in-minutes` into an absolute instant.
fn parse_due(
    due: Option<&str>,
    in_minutes: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    match (due, in_minutes) {
        (Some(raw), _) => {
            let at = DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("invalid --due datetime '{raw}'"))?;
            Ok(Some(at.with_timezone(&Utc)))
        }
        (None, Some(minutes)) if minutes < 0 => {
            Err(anyhow!("--in-minutes must not be negative"))
        }
        (None, Some(minutes)) => Duration::try_minutes(minutes)
            .and_then(|offset| now.checked_add_signed(offset))
            .map(Some)
            .ok_or_else(|| anyhow!("--in-minutes {minutes} is out of range")),
        (None, None) => Ok(None),
    }
}
