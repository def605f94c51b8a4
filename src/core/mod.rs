//! Orchestration logic.
//!
//! - PhaseExecutor: runs one phase under the per-phase guard
//! - Scheduler: one timer + one pending-trigger slot per phase
//! - SnapshotAssembler: composes the served snapshot with degradation rules
//! - ReadGateway: non-blocking reads of the latest snapshot

pub mod assembler;
pub mod executor;
pub(crate) mod phases;
pub mod read;
pub mod scheduler;
pub mod status;

// Re-export commonly used types
pub use executor::{PhaseExecutor, TriggerResult};
pub use read::{ReadGateway, SnapshotRead};
pub use scheduler::{Scheduler, TriggerStatus};
pub use status::{status_report, PhaseStatus};
