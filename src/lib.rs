//! # taskledger
//!
//! Task lifecycle and attendance reconciliation service.
//!
//! This library provides:
//! - A task state machine from assignment through verification to a final grade
//! - An idempotent past-due sweep safe to run from a timer and on demand
//! - Day-by-day attendance derived from reports, leave, holidays and task activity
//! - Notification fan-out with per-task approval deduplication
//!
//! ## Task Flow
//! 1. An assigner creates a task for an employee
//! 2. The assignee reports progress; reaching 100% submits it for verification
//! 3. Overdue open tasks are submitted automatically by the sweeper
//! 4. An approver grades or rejects the task, which finalizes it
//!
//! ## Modules
//! - `task`: Task record, transition rules, authorization policy and service
//! - `sweeper`: Past-due sweep and its scheduler
//! - `attendance`: Reports, leave, holidays and the monthly classifier
//! - `notify`: Notifications and the dispatcher
//! - `hierarchy`: Subordinate resolution over team-lead links
//! - `store`: Persistence backends (memory, SQLite)
//! - `api`: HTTP surface

pub mod api;
pub mod attendance;
pub mod clock;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod notify;
pub mod roster;
pub mod store;
pub mod sweeper;
pub mod task;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
