//! API request/response types.

use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attendance::{LeaveStatus, ReportEntry};
use crate::error::{Error, ErrorKind};

/// Map a domain error onto the response the handlers return.
impl From<Error> for (StatusCode, String) {
    fn from(err: Error) -> Self {
        let status = match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Precondition => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Storage => {
                tracing::error!("Storage failure: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, err.to_string())
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Whether the server trusts the `X-Employee-Id` header
    pub dev_mode: bool,

    /// Whether data survives a restart
    pub persistent: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApproveRequest {
    pub final_percentage: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
    #[serde(default)]
    pub final_percentage: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResponse {
    pub processed_count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveReportRequest {
    #[serde(default)]
    pub entries: Vec<ReportEntry>,
    /// Lock the report after saving
    #[serde(default)]
    pub submit: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaveRequest {
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub status: LeaveStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HolidayRequest {
    pub date: NaiveDate,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
}
