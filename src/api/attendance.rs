use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{AppState, PageQuery};
use crate::auth::AuthUser;
use crate::error::HrResult;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceSummary};
use crate::store::AttendanceFilter;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    /// Defaults to the current time.
    #[schema(value_type = Option<String>, format = "date-time", example = "2024-01-15T09:00:00.000Z")]
    pub check_in: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutRequest {
    /// Defaults to the current time.
    #[schema(value_type = Option<String>, format = "date-time", example = "2024-01-15T18:00:00.000Z")]
    pub check_out: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Applied only together with `year`.
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AllAttendanceQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    /// Case-insensitive substring.
    pub department: Option<String>,
    #[param(value_type = Option<String>)]
    pub status: Option<AttendanceStatus>,
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Checked in successfully", body = AttendanceRecord),
        (status = 404, description = "User not found"),
        (status = 409, description = "Already checked in for today"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: Option<web::Json<CheckInRequest>>,
) -> HrResult<HttpResponse> {
    let at = body.and_then(|b| b.into_inner().check_in);
    let record = state.attendance.check_in(auth.user_id, at).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = CheckOutRequest,
    responses(
        (status = 200, description = "Checked out successfully", body = AttendanceRecord),
        (status = 400, description = "Check-out time must be after check-in time"),
        (status = 409, description = "No check-in for today, or already checked out"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: Option<web::Json<CheckOutRequest>>,
) -> HrResult<HttpResponse> {
    let at = body.and_then(|b| b.into_inner().check_out);
    let record = state.attendance.check_out(auth.user_id, at).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// Today's record of the caller, or `null`
#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's attendance, or null before check-in", body = AttendanceRecord),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(auth: AuthUser, state: web::Data<AppState>) -> HrResult<HttpResponse> {
    let record = state.attendance.get_today_attendance(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[utoipa::path(
    get,
    path = "/api/attendance/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "The caller's attendance, newest first", body = Object, example = json!({
            "data": [],
            "pagination": { "total": 0, "page": 1, "limit": 10, "totalPages": 0 }
        })),
        (status = 400, description = "Invalid pagination or month"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<HistoryQuery>,
) -> HrResult<HttpResponse> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .to_request()?;
    let records = state
        .attendance
        .get_attendance_history(auth.user_id, page, query.month, query.year)
        .await?;
    Ok(HttpResponse::Ok().json(records))
}

#[utoipa::path(
    get,
    path = "/api/attendance/summary/{month}/{year}",
    params(
        ("month" = u32, Path, description = "Month, 1-12"),
        ("year" = i32, Path, description = "Year")
    ),
    responses(
        (status = 200, description = "Monthly summary of the caller", body = AttendanceSummary),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn my_summary(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<(u32, i32)>,
) -> HrResult<HttpResponse> {
    let (month, year) = path.into_inner();
    let summary = state
        .attendance
        .get_attendance_summary(auth.user_id, month, year)
        .await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    get,
    path = "/api/attendance/employee/{user_id}/summary/{month}/{year}",
    params(
        ("user_id" = u64, Path, description = "Employee to summarise"),
        ("month" = u32, Path, description = "Month, 1-12"),
        ("year" = i32, Path, description = "Year")
    ),
    responses(
        (status = 200, description = "Monthly summary of the employee", body = AttendanceSummary),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn employee_summary(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<(u64, u32, i32)>,
) -> HrResult<HttpResponse> {
    auth.require_admin()?;

    let (user_id, month, year) = path.into_inner();
    let summary = state
        .attendance
        .get_attendance_summary(user_id, month, year)
        .await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    get,
    path = "/api/attendance/all",
    params(AllAttendanceQuery),
    responses(
        (status = 200, description = "All attendance, newest first", body = Object, example = json!({
            "data": [],
            "pagination": { "total": 0, "page": 1, "limit": 10, "totalPages": 0 }
        })),
        (status = 400, description = "Invalid pagination"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn all(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<AllAttendanceQuery>,
) -> HrResult<HttpResponse> {
    auth.require_admin()?;

    let query = query.into_inner();
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .to_request()?;
    let filter = AttendanceFilter {
        date: query.date,
        department: query.department,
        status: query.status,
        ..Default::default()
    };
    let records = state.attendance.get_all_attendance(page, filter).await?;
    Ok(HttpResponse::Ok().json(records))
}
