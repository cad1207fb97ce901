//! Command-line front end over [`TaskEngine`].

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::TaskEngine;
use crate::error::Result;
use crate::sync;
use crate::tasks::{Partition, SortCriterion, TaskRecord};

#[derive(Parser, Debug)]
#[command(name = "taskboard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild the task cache from every markdown file in the vault
    Scan { vault: PathBuf },

    /// Print cached tasks
    List {
        vault: PathBuf,

        /// Show the completed column instead of the pending one
        #[arg(long)]
        completed: bool,

        /// Sort key, most significant first (e.g. `priority`, `due:desc`)
        #[arg(long = "sort", value_name = "FIELD[:asc|desc]")]
        sort: Vec<SortCriterion>,
    },

    /// Rescan, then keep the cache current until interrupted
    Watch {
        vault: PathBuf,

        /// How often queued changes are drained
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },

    /// Advance a task to its next status and write it back
    Toggle { vault: PathBuf, id: u64 },
}

fn print_tasks(records: &[TaskRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    for r in records {
        let due = r
            .fields
            .due_date
            .as_deref()
            .map(|d| format!("  due {d}"))
            .unwrap_or_default();
        println!(
            "{:>5}  [{}] {}{}  ({}:{})",
            r.id,
            r.fields.status.symbol(),
            r.fields.title,
            due,
            r.file_path,
            r.location.start_line
        );
    }
    Ok(())
}

async fn open(vault: &Path) -> Result<TaskEngine> {
    let engine = TaskEngine::init(vault)?;
    if engine.rescan_recommended() {
        engine.rescan_vault().await?;
    } else {
        engine.process_all_queued().await?;
    }
    Ok(engine)
}

pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Scan { vault } => {
            let engine = TaskEngine::init(&vault)?;
            let report = engine.rescan_vault().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} documents, {} tasks, {} unreadable",
                    report.documents,
                    report.tasks,
                    report.failed.len()
                );
            }
            engine.shutdown()
        }
        Commands::List {
            vault,
            completed,
            sort,
        } => {
            let engine = open(&vault).await?;
            let partition = if completed {
                Partition::Completed
            } else {
                Partition::Pending
            };
            let records = engine.resort_column(engine.query(partition), &sort);
            print_tasks(&records, cli.json)?;
            engine.shutdown()
        }
        Commands::Watch { vault, interval_ms } => {
            let engine = Arc::new(TaskEngine::init(&vault)?);
            engine.rescan_vault().await?;
            let _watcher = sync::watch_vault(engine.clone())?;

            let mut tick = tokio::time::interval(Duration::from_millis(interval_ms.max(50)));
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);
            loop {
                tokio::select! {
                    _ = &mut ctrl_c => break,
                    _ = tick.tick() => {
                        if engine.queued_paths().is_empty() {
                            continue;
                        }
                        match engine.process_all_queued().await {
                            Ok(report) => {
                                for path in report.changed_paths() {
                                    println!("updated {path}");
                                }
                            }
                            Err(error) => tracing::warn!(error = %error, "drain failed"),
                        }
                    }
                }
            }
            engine.shutdown()
        }
        Commands::Toggle { vault, id } => {
            let engine = open(&vault).await?;
            let record = engine.toggle_task(id).await?;
            print_tasks(std::slice::from_ref(&record), cli.json)?;
            engine.shutdown()
        }
    }
}
