use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

use crate::api::attendance::{CheckInRequest, CheckOutRequest};
use crate::api::leave_request::{ApproveLeaveRequest, CreateLeaveRequest};
use crate::api::payroll::CalculateSalaryRequest;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, AttendanceSummary};
use crate::model::leave_request::{LeaveBalance, LeaveRequest, LeaveStatistics, LeaveStatus};
use crate::model::pagination::Pagination;
use crate::model::payroll::{
    BulkPayrollFailure, BulkPayrollReport, BulkPayrollSuccess, DepartmentSalaryStats, SalaryBreakdown, SalaryRecord,
    SalarySummary,
};

/// Registers the `bearer_auth` scheme the paths refer to.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Ledger API",
        version = "1.0.0",
        description = r#"
## Attendance, Leave and Payroll

The consistency core of an HR system: daily attendance, leave requests
against a paid-leave balance, and monthly payroll derived from attendance.

### Guarantees
- One attendance record per user and day
- Leave approval and balance debit commit together or not at all
- One salary record per user and month; recalculation returns the stored one
- Bulk payroll reports each user's failure without stopping the run

### Security
Every endpoint requires a **JWT Bearer** token. Admin-only operations say so.

### Errors
Failures answer with `{"code": "...", "message": "..."}`.
"#,
    ),
    paths(
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::history,
        crate::api::attendance::my_summary,
        crate::api::attendance::employee_summary,
        crate::api::attendance::all,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::leave_balance,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::cancel_leave,

        crate::api::payroll::calculate_salary,
        crate::api::payroll::calculate_bulk_salary,
        crate::api::payroll::list_salaries,
        crate::api::payroll::salary_summary,
        crate::api::payroll::my_history,
        crate::api::payroll::get_salary
    ),
    components(
        schemas(
            CheckInRequest,
            CheckOutRequest,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceSummary,
            SalaryBreakdown,
            CreateLeaveRequest,
            ApproveLeaveRequest,
            LeaveStatus,
            LeaveRequest,
            LeaveStatistics,
            LeaveBalance,
            CalculateSalaryRequest,
            SalaryRecord,
            BulkPayrollSuccess,
            BulkPayrollFailure,
            BulkPayrollReport,
            DepartmentSalaryStats,
            SalarySummary,
            Pagination
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Daily check-in, check-out and monthly summaries"),
        (name = "Leave", description = "Leave requests and balances"),
        (name = "Salary", description = "Payroll calculation and salary records"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route_and_the_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/leaves/{leave_id}/approve"));
        assert!(doc.paths.paths.contains_key("/api/salary/calculate-bulk"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
