use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{AppState, PageQuery};
use crate::auth::AuthUser;
use crate::error::HrResult;
use crate::model::leave_request::{LeaveBalance, LeaveRequest, LeaveStatus};
use crate::store::LeaveFilter;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeaveRequest {
    #[schema(example = "2024-01-15", format = "date", value_type = String)]
    pub from_date: NaiveDate,
    #[schema(example = "2024-01-17", format = "date", value_type = String)]
    pub to_date: NaiveDate,
    #[schema(example = "Family wedding out of town", min_length = 10)]
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApproveLeaveRequest {
    /// `APPROVED` or `REJECTED`.
    #[schema(example = "APPROVED")]
    pub status: LeaveStatus,
    /// Required when rejecting.
    #[schema(example = "Quarter-end freeze")]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct LeaveListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[param(value_type = Option<String>)]
    pub status: Option<LeaveStatus>,
    /// Admin only; case-insensitive substring.
    pub department: Option<String>,
    /// Admin only.
    pub user_id: Option<u64>,
}

/* =========================
Apply for leave
========================= */
#[utoipa::path(
    post,
    path = "/api/leaves",
    request_body = CreateLeaveRequest,
    responses(
        (status = 201, description = "Leave requested", body = LeaveRequest),
        (status = 400, description = "Invalid date range or reason too short"),
        (status = 409, description = "Overlaps an existing request"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<CreateLeaveRequest>,
) -> HrResult<HttpResponse> {
    let body = body.into_inner();
    let leave = state
        .leaves
        .create(auth.user_id, body.from_date, body.to_date, &body.reason)
        .await?;
    Ok(HttpResponse::Created().json(leave))
}

/* =========================
List leave requests
========================= */
/// Employees only ever see their own requests; admins may filter by
/// department and user.
#[utoipa::path(
    get,
    path = "/api/leaves",
    params(LeaveListQuery),
    responses(
        (status = 200, description = "Leave requests, newest first", body = Object, example = json!({
            "data": [],
            "pagination": { "total": 0, "page": 1, "limit": 10, "totalPages": 0 }
        })),
        (status = 400, description = "Invalid pagination"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<LeaveListQuery>,
) -> HrResult<HttpResponse> {
    let query = query.into_inner();
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .to_request()?;

    let filter = match auth.scope() {
        Some(own_id) => LeaveFilter {
            user_id: Some(own_id),
            status: query.status,
            department: None,
        },
        None => LeaveFilter {
            user_id: query.user_id,
            status: query.status,
            department: query.department,
        },
    };
    let leaves = state.leaves.find_all(page, filter).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

#[utoipa::path(
    get,
    path = "/api/leaves/balance",
    responses(
        (status = 200, description = "The caller's balance and request statistics", body = LeaveBalance),
        (status = 404, description = "User not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_balance(auth: AuthUser, state: web::Data<AppState>) -> HrResult<HttpResponse> {
    let balance = state.leaves.get_leave_balance(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

#[utoipa::path(
    get,
    path = "/api/leaves/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request", body = LeaveRequest),
        (status = 403, description = "Not the caller's request"),
        (status = 404, description = "Leave request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> HrResult<HttpResponse> {
    let leave = state.leaves.find_one(path.into_inner(), auth.scope()).await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Approve / reject leave (Admin)
========================= */
#[utoipa::path(
    patch,
    path = "/api/leaves/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to decide")
    ),
    request_body = ApproveLeaveRequest,
    responses(
        (status = 200, description = "Leave processed", body = LeaveRequest),
        (status = 400, description = "Decision is neither APPROVED nor REJECTED"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Already processed, or rejection without a reason")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<ApproveLeaveRequest>,
) -> HrResult<HttpResponse> {
    auth.require_admin()?;

    let body = body.into_inner();
    let leave = state
        .leaves
        .approve(path.into_inner(), auth.user_id, body.status, body.rejection_reason)
        .await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Cancel a pending request
========================= */
#[utoipa::path(
    delete,
    path = "/api/leaves/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to cancel")
    ),
    responses(
        (status = 200, description = "Leave cancelled", body = Object, example = json!({
            "message": "Leave request cancelled successfully"
        })),
        (status = 403, description = "Not the caller's request"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Only pending requests can be cancelled")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> HrResult<HttpResponse> {
    state.leaves.cancel(path.into_inner(), auth.scope()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave request cancelled successfully"
    })))
}
