//! The posting side of the relay.
//!
//! This crate provides:
//! - `gather_fresh` and `pick`, which filter the trending feed against the ledger
//! - `PublishPipeline`, one select/fetch/transmit/commit cycle per run
//! - `IntervalScheduler`, which runs the pipeline on a fixed interval

pub mod pipeline;
pub mod scheduler;
pub mod selection;

pub use pipeline::{CycleOutcome, PublishPipeline, SkipReason};
pub use scheduler::{IntervalScheduler, ScheduledJob, SchedulerHandle, SchedulerStats, TickDecision};
pub use selection::{gather_fresh, pick, select_candidate, Selection};
