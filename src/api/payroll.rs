use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{AppState, PageQuery};
use crate::auth::AuthUser;
use crate::error::HrResult;
use crate::model::payroll::{BulkPayrollReport, SalaryRecord, SalarySummary};
use crate::store::SalaryFilter;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CalculateSalaryRequest {
    /// `YYYY-MM`.
    #[schema(example = "2024-01")]
    pub month: String,
    #[schema(example = 2024)]
    pub year: i32,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SalaryListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// `YYYY-MM`.
    pub month: Option<String>,
    pub year: Option<i32>,
    /// Admin only; case-insensitive substring.
    pub department: Option<String>,
    /// Admin only.
    pub user_id: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SalarySummaryQuery {
    pub month: Option<String>,
    pub year: Option<i32>,
}

#[utoipa::path(
    post,
    path = "/api/salary/calculate/{user_id}",
    params(
        ("user_id" = u64, Path, description = "Employee to process")
    ),
    request_body = CalculateSalaryRequest,
    responses(
        (status = 200, description = "Salary record, existing or freshly calculated", body = SalaryRecord),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Salary"
)]
pub async fn calculate_salary(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    body: web::Json<CalculateSalaryRequest>,
) -> HrResult<HttpResponse> {
    auth.require_admin()?;

    let salary = state
        .payroll
        .calculate_salary(path.into_inner(), &body.month, body.year)
        .await?;
    Ok(HttpResponse::Ok().json(salary))
}

#[utoipa::path(
    post,
    path = "/api/salary/calculate-bulk",
    request_body = CalculateSalaryRequest,
    responses(
        (status = 200, description = "Per-user outcome of the run", body = BulkPayrollReport),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Salary"
)]
pub async fn calculate_bulk_salary(
    auth: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<CalculateSalaryRequest>,
) -> HrResult<HttpResponse> {
    auth.require_admin()?;

    let report = state
        .bulk_payroll
        .calculate_bulk_salary(&body.month, body.year)
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Employees only ever see their own records.
#[utoipa::path(
    get,
    path = "/api/salary",
    params(SalaryListQuery),
    responses(
        (status = 200, description = "Salary records, newest period first", body = Object, example = json!({
            "data": [],
            "pagination": { "total": 0, "page": 1, "limit": 10, "totalPages": 0 }
        })),
        (status = 400, description = "Invalid pagination"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Salary"
)]
pub async fn list_salaries(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<SalaryListQuery>,
) -> HrResult<HttpResponse> {
    let query = query.into_inner();
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .to_request()?;

    let filter = match auth.scope() {
        Some(own_id) => SalaryFilter {
            user_id: Some(own_id),
            month: query.month,
            year: query.year,
            department: None,
        },
        None => SalaryFilter {
            user_id: query.user_id,
            month: query.month,
            year: query.year,
            department: query.department,
        },
    };
    let records = state.payroll.get_salary_records(page, filter).await?;
    Ok(HttpResponse::Ok().json(records))
}

#[utoipa::path(
    get,
    path = "/api/salary/summary",
    params(SalarySummaryQuery),
    responses(
        (status = 200, description = "Payroll totals with a department breakdown", body = SalarySummary),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Salary"
)]
pub async fn salary_summary(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<SalarySummaryQuery>,
) -> HrResult<HttpResponse> {
    auth.require_admin()?;

    let query = query.into_inner();
    let summary = state.payroll.get_salary_summary(query.month, query.year).await?;
    Ok(HttpResponse::Ok().json(summary))
}

#[utoipa::path(
    get,
    path = "/api/salary/my-history",
    params(PageQuery),
    responses(
        (status = 200, description = "The caller's salary records", body = Object, example = json!({
            "data": [],
            "pagination": { "total": 0, "page": 1, "limit": 10, "totalPages": 0 }
        })),
        (status = 400, description = "Invalid pagination"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Salary"
)]
pub async fn my_history(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> HrResult<HttpResponse> {
    let page = query.to_request()?;
    let records = state.payroll.get_user_salary_history(auth.user_id, page).await?;
    Ok(HttpResponse::Ok().json(records))
}

#[utoipa::path(
    get,
    path = "/api/salary/{salary_id}",
    params(
        ("salary_id" = u64, Path, description = "ID of the salary record")
    ),
    responses(
        (status = 200, description = "Salary record", body = SalaryRecord),
        (status = 403, description = "Not the caller's record"),
        (status = 404, description = "Salary record not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Salary"
)]
pub async fn get_salary(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> HrResult<HttpResponse> {
    let salary = state
        .payroll
        .get_salary_by_id(path.into_inner(), auth.scope())
        .await?;
    Ok(HttpResponse::Ok().json(salary))
}
