//! Report, attendance, leave and holiday endpoints.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use uuid::Uuid;

use super::auth::Actor;
use super::routes::AppState;
use super::types::{HolidayRequest, LeaveRequest, SaveReportRequest};
use crate::attendance::{DayAttendance, Holiday, Leave, Report};

pub async fn save_report(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(date): Path<NaiveDate>,
    Json(req): Json<SaveReportRequest>,
) -> Result<Json<Report>, (StatusCode, String)> {
    let report = state
        .attendance
        .save_report(&actor, date, req.entries, req.submit)
        .await?;
    Ok(Json(report))
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Path((employee_id, date)): Path<(Uuid, NaiveDate)>,
) -> Result<Json<Report>, (StatusCode, String)> {
    Ok(Json(
        state.attendance.get_report(&actor, employee_id, date).await?,
    ))
}

pub async fn month_attendance(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Path((employee_id, year, month)): Path<(Uuid, i32, u32)>,
) -> Result<Json<Vec<DayAttendance>>, (StatusCode, String)> {
    let days = state
        .attendance
        .attendance_for_month(&actor, employee_id, year, month)
        .await?;
    Ok(Json(days))
}

pub async fn record_leave(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Json(req): Json<LeaveRequest>,
) -> Result<Json<Leave>, (StatusCode, String)> {
    let leave = state
        .attendance
        .record_leave(&actor, req.employee_id, req.date, req.status)
        .await?;
    Ok(Json(leave))
}

pub async fn add_holiday(
    State(state): State<Arc<AppState>>,
    Extension(Actor(actor)): Extension<Actor>,
    Json(req): Json<HolidayRequest>,
) -> Result<Json<Holiday>, (StatusCode, String)> {
    Ok(Json(
        state.attendance.add_holiday(&actor, req.date, &req.name).await?,
    ))
}
