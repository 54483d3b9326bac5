// src/sched/mod.rs

//! Scheduling and dispatch.
//!
//! - [`task`] holds the registration spec and registry entry types.
//! - [`group`] implements the one-capacity completion slot that enforces
//!   serial execution within a group.
//! - [`scheduler`] contains the polling loop: due-task detection, dispatch
//!   through group slots, and the persistence cadence.
//! - [`jitter`] provides startup desynchronization helpers.

pub mod group;
pub mod jitter;
pub mod scheduler;
pub mod task;

pub use group::{CompletionToken, GroupSlot};
pub use jitter::spawn_once_with_jitter;
pub use scheduler::Scheduler;
pub use task::{TaskEntry, TaskFn, TaskSpec};
pub use crate::types::StampPolicy;
