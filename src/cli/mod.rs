//! Command-line interface for marketpulse.
//!
//! `serve` runs the scheduler until interrupted; `run`, `status`, and
//! `snapshot` are one-shot operations against the same engine home.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use chrono::Utc;

use crate::config::EngineConfig;
use crate::core::{status_report, PhaseExecutor, ReadGateway, Scheduler, SnapshotRead};
use crate::domain::PhaseName;
use crate::gateway::HttpGateway;
use crate::store::ArtifactStore;

/// marketpulse - background market snapshot engine
#[derive(Parser, Debug)]
#[command(name = "marketpulse")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a YAML config file (defaults to ./marketpulse.yaml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler in the foreground until interrupted
    Serve,

    /// Run one phase (or "all", in dependency order) once and exit
    Run {
        /// Phase name (e.g. "news.analyze") or "all"
        phase: String,
    },

    /// Show per-phase last outcome and artifact freshness
    Status,

    /// Print the latest snapshot, or "pending" if never produced
    Snapshot,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = Arc::new(EngineConfig::load(self.config.as_deref())?);
        let home = config.resolved_home()?;

        let store = Arc::new(ArtifactStore::open(&home).await?);
        let gateway = Arc::new(
            HttpGateway::new(config.gateway.clone())
                .map_err(|e| anyhow::anyhow!("gateway init: {}", e))?,
        );
        let executor = Arc::new(PhaseExecutor::new(store.clone(), gateway, config.clone()));

        match self.command {
            Commands::Serve => {
                let scheduler = Scheduler::new(executor);
                scheduler.start();

                tokio::signal::ctrl_c()
                    .await
                    .context("failed to listen for shutdown signal")?;
                scheduler.shutdown();
                Ok(())
            }

            Commands::Run { phase } => {
                let phases: Vec<PhaseName> = if phase == "all" {
                    PhaseName::ALL.to_vec()
                } else {
                    vec![phase.parse().map_err(|e: String| anyhow::anyhow!(e))?]
                };

                for phase in phases {
                    match executor.run(phase).await {
                        crate::core::TriggerResult::Finished(run) => {
                            println!("{}: {}", phase, run.outcome);
                            if let Some(detail) = run.error_detail {
                                println!("  {}", detail);
                            }
                        }
                        crate::core::TriggerResult::AlreadyRunning => {
                            println!("{}: already running", phase);
                        }
                    }
                }
                Ok(())
            }

            Commands::Status => {
                let report = status_report(&store, Utc::now()).await?;
                for status in report {
                    let outcome = status
                        .last_outcome
                        .map(|o| o.to_string())
                        .unwrap_or_else(|| "never run".to_string());
                    let finished = status
                        .last_finished_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<20} {:<10} artifact={:<8} last={}",
                        status.phase.as_str(),
                        outcome,
                        status.artifact_freshness,
                        finished
                    );
                }
                Ok(())
            }

            Commands::Snapshot => {
                // One-shot read: the process exits right after, so a
                // dispatched bootstrap chain could never finish. Serve
                // whatever the store holds; a cold store reports pending.
                let scheduler = Scheduler::new(executor);
                let gateway = ReadGateway::passive(store, scheduler);

                match gateway.latest().await? {
                    SnapshotRead::Pending => println!("pending"),
                    ready @ SnapshotRead::Ready { .. } => {
                        println!("{}", serde_json::to_string_pretty(&ready)?);
                    }
                }
                Ok(())
            }
        }
    }
}
