//! HTTP API for taskledger.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `POST /api/tasks` - Assign a task
//! - `GET /api/tasks` - Tasks assigned to the caller
//! - `GET /api/tasks/team` - Tasks of the caller's subordinates
//! - `GET /api/tasks/{id}` - Get a task
//! - `PATCH /api/tasks/{id}` - Report progress or edit details
//! - `POST /api/tasks/{id}/approve` - Grade a task awaiting verification
//! - `POST /api/tasks/{id}/reject` - Reject a task awaiting verification
//! - `POST /api/tasks/{id}/comments` - Comment on a task
//! - `POST /api/tasks/sweep` - Run the past-due sweep now
//! - `PUT /api/reports/{date}` - Save today's report
//! - `GET /api/reports/{employee_id}/{date}` - Get a report
//! - `GET /api/attendance/{employee_id}/{year}/{month}` - Monthly attendance
//! - `POST /api/leaves` - Record leave
//! - `POST /api/holidays` - Add a holiday
//! - `GET /api/notifications` - The caller's notifications
//! - `POST /api/notifications/{id}/read` - Mark a notification read

mod attendance;
mod auth;
mod notifications;
mod routes;
mod tasks;
pub mod types;

pub use auth::Actor;
pub use routes::{router, serve, AppState};
pub use types::*;
