//! Threadmill — a user-level cooperative scheduler
//!
//! This crate simulates a priority-based, round-robin-preemptive scheduling
//! policy on top of real OS threads:
//! - One execution carrier (OS thread) per logical thread
//! - A single run token: at most one logical thread executes user code at a time
//! - Priority dispatch with earliest-enqueued tie-breaking
//! - Quantum-based preemption driven by explicit `tick` calls
//! - I/O wait classes for blocking (`wait`) and mass wake-up (`signal`)
//!
//! The scheduler never runs logical threads in parallel: the whole point is
//! deterministic, token-serialized execution over concurrent carriers.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod queue;
pub mod record;
pub mod scheduler;

pub use config::{SchedulerConfig, MAX_IO_EVENTS, MAX_PRIORITY};
pub use error::{SchedulerError, SchedulerResult};
pub use queue::RunQueue;
pub use record::{ThreadId, ThreadRecord, ThreadState};
pub use scheduler::Scheduler;
