//! marketpulse - background orchestration engine for market snapshots
//!
//! Periodically computes a derived market snapshot from slow, unreliable
//! upstream data/AI sources and serves it to latency-sensitive readers
//! without ever blocking a read on live computation.
//!
//! # Architecture
//!
//! - Independent phases (fetch, analyze, assemble) run on their own cadences
//! - Each phase writes a TTL-stamped artifact into a shared store
//! - Staleness is advisory: readers always get the best available data,
//!   flagged honestly, rather than an error
//! - At most one run per phase is ever in flight
//!
//! # Modules
//!
//! - `store`: keyed artifact storage with TTL metadata and run history
//! - `gateway`: fallible upstream fetch/inference calls behind one trait
//! - `core`: executor, scheduler, snapshot assembly, read boundary
//! - `domain`: artifact, phase, market, and snapshot data structures
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the engine
//! marketpulse serve
//!
//! # Trigger one phase manually
//! marketpulse run news.analyze
//!
//! # Inspect pipeline health
//! marketpulse status
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod gateway;
pub mod store;

// Re-export main types at crate root for convenience
pub use config::EngineConfig;
pub use core::{PhaseExecutor, ReadGateway, Scheduler, SnapshotRead, TriggerResult, TriggerStatus};
pub use domain::{Freshness, PhaseName, PhaseOutcome, PhaseRun, SnapshotPayload, StoredArtifact};
pub use gateway::{GatewayError, HttpGateway, InferenceRequest, ResponseSchema, UpstreamGateway};
pub use store::ArtifactStore;
