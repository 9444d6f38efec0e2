//! Task module - the task record, its state machine and the service that
//! commits transitions.
//!
//! - `task`: pure state transitions with documented pre/postconditions
//! - `policy`: one authorization decision per action
//! - `service`: load, authorize, transition, conditional commit, notify

pub mod policy;
mod service;
pub mod task;

pub use policy::Decision;
pub use service::TaskService;
pub use task::{
    Comment, CompletionCategory, NewTask, Priority, ProgressOutcome, Task, TaskPatch, TaskStatus,
};
