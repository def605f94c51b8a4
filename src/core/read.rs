//! Read boundary: serve the latest snapshot without ever blocking a reader
//! on pipeline execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{keys, Freshness, PhaseName, SnapshotPayload};
use crate::store::ArtifactStore;

use super::scheduler::Scheduler;

/// What a reader gets back: the best available snapshot, or a pending marker
/// when nothing has ever been produced.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SnapshotRead {
    Ready {
        #[serde(flatten)]
        snapshot: SnapshotPayload,
        produced_at: DateTime<Utc>,
        /// True when the snapshot is past its advisory TTL
        stale: bool,
    },

    /// Never yet produced; the bootstrap chain has been dispatched
    Pending,
}

/// Thin read gateway over the composite snapshot artifact
pub struct ReadGateway {
    store: Arc<ArtifactStore>,
    scheduler: Arc<Scheduler>,
    bootstrapped: AtomicBool,
    /// When false, reads never dispatch pipeline work
    dispatch: bool,
}

impl ReadGateway {
    pub fn new(store: Arc<ArtifactStore>, scheduler: Arc<Scheduler>) -> Self {
        Self {
            store,
            scheduler,
            bootstrapped: AtomicBool::new(false),
            dispatch: true,
        }
    }

    /// A gateway that serves whatever the store holds and never dispatches
    /// bootstrap or re-assembly work. For one-shot callers whose process
    /// exits before a dispatched chain could finish.
    pub fn passive(store: Arc<ArtifactStore>, scheduler: Arc<Scheduler>) -> Self {
        Self {
            dispatch: false,
            ..Self::new(store, scheduler)
        }
    }

    /// Latest snapshot, stale or not.
    ///
    /// A cold store dispatches the bootstrap chain exactly once per process
    /// and returns `Pending` immediately. A stale snapshot is returned as-is
    /// with its marker while a re-assembly is requested fire-and-forget.
    /// A [`ReadGateway::passive`] gateway skips both dispatches.
    /// Pipeline failures never surface here as errors.
    pub async fn latest(&self) -> Result<SnapshotRead> {
        let now = Utc::now();

        let artifact = match self.store.get(keys::SNAPSHOT_COMPOSITE).await? {
            Some(artifact) => artifact,
            None => {
                if self.dispatch && !self.bootstrapped.swap(true, Ordering::SeqCst) {
                    info!("no snapshot yet, dispatching bootstrap chain");
                    self.scheduler.bootstrap();
                }
                return Ok(SnapshotRead::Pending);
            }
        };

        let stale = artifact.freshness(now) == Freshness::Stale;
        if stale && self.dispatch {
            debug!("serving stale snapshot, requesting re-assembly");
            self.scheduler.trigger(PhaseName::SnapshotAssemble);
        }

        let snapshot: SnapshotPayload = serde_json::from_value(artifact.payload)
            .context("corrupt snapshot.composite payload")?;

        Ok(SnapshotRead::Ready {
            snapshot,
            produced_at: artifact.produced_at,
            stale,
        })
    }
}
