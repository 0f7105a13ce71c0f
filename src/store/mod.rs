//! The record store port.
//!
//! Services only talk to storage through [`HrStore`]. Each method is one
//! atomic unit: the adapters guarantee the uniqueness and transaction rules
//! documented per method, while the domain rules themselves live in
//! [`crate::model`] and are shared by every adapter.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::HrResult;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, CheckOut};
use crate::model::leave_request::{LeaveDecision, LeaveDraft, LeaveRequest, LeaveStatistics, LeaveStatus};
use crate::model::pagination::PageRequest;
use crate::model::payroll::{NewSalaryRecord, SalaryLine, SalaryRecord};
use crate::model::user::User;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

pub const ATTENDANCE_USER_DATE_KEY: &str = "attendance(user_id, date)";
pub const SALARY_USER_MONTH_KEY: &str = "salary_records(user_id, month)";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceFilter {
    pub user_id: Option<u64>,
    pub date: Option<NaiveDate>,
    /// Inclusive date window.
    pub between: Option<(NaiveDate, NaiveDate)>,
    /// Case-insensitive substring of the owner's department.
    pub department: Option<String>,
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaveFilter {
    pub user_id: Option<u64>,
    pub status: Option<LeaveStatus>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalaryFilter {
    pub user_id: Option<u64>,
    pub month: Option<String>,
    pub year: Option<i32>,
    pub department: Option<String>,
}

/// Case-insensitive "contains", the department filter used by every listing.
pub fn department_matches(department: &str, needle: &str) -> bool {
    department.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
pub trait HrStore: Send + Sync {
    async fn find_user(&self, user_id: u64) -> HrResult<Option<User>>;

    async fn active_users(&self) -> HrResult<Vec<User>>;

    /// Inserts an open record. Fails with `HrError::Duplicate` when
    /// `(user_id, date)` already exists, including under concurrent inserts.
    async fn insert_attendance(
        &self,
        user_id: u64,
        date: NaiveDate,
        check_in: DateTime<Utc>,
    ) -> HrResult<AttendanceRecord>;

    async fn find_attendance(&self, user_id: u64, date: NaiveDate) -> HrResult<Option<AttendanceRecord>>;

    /// Completes an open record. Returns `None` when the record was already
    /// checked out, so only one of two racing check-outs wins.
    async fn complete_attendance(&self, record_id: u64, checkout: &CheckOut) -> HrResult<Option<AttendanceRecord>>;

    /// Records of one user in `[from, to]`, oldest first.
    async fn attendance_between(&self, user_id: u64, from: NaiveDate, to: NaiveDate) -> HrResult<Vec<AttendanceRecord>>;

    /// Newest date first, with the total count before paging.
    async fn list_attendance(&self, filter: &AttendanceFilter, page: PageRequest) -> HrResult<(Vec<AttendanceRecord>, u64)>;

    /// Stores a pending request. Serialized per user: locks the user's row,
    /// reads the balance, rejects overlaps with `HrError::OverlappingLeave`,
    /// then inserts. Fails with `HrError::UserNotFound` for unknown users.
    async fn create_leave(&self, draft: LeaveDraft) -> HrResult<LeaveRequest>;

    async fn find_leave(&self, leave_id: u64) -> HrResult<Option<LeaveRequest>>;

    async fn list_leaves(&self, filter: &LeaveFilter, page: PageRequest) -> HrResult<(Vec<LeaveRequest>, u64)>;

    /// Applies a decision in one transaction: locks the leave and its owner's
    /// balance, runs [`LeaveRequest::settle`], writes the leave and debits the
    /// balance. Either both writes commit or neither does.
    async fn settle_leave(&self, leave_id: u64, decision: &LeaveDecision) -> HrResult<LeaveRequest>;

    /// Deletes the request only while it is pending. Returns whether a row
    /// was deleted.
    async fn delete_pending_leave(&self, leave_id: u64) -> HrResult<bool>;

    async fn leave_statistics(&self, user_id: u64, year: i32) -> HrResult<LeaveStatistics>;

    async fn find_salary(&self, user_id: u64, month: &str) -> HrResult<Option<SalaryRecord>>;

    async fn find_salary_by_id(&self, salary_id: u64) -> HrResult<Option<SalaryRecord>>;

    /// Fails with `HrError::Duplicate` when `(user_id, month)` exists.
    async fn insert_salary(&self, record: NewSalaryRecord) -> HrResult<SalaryRecord>;

    /// Newest period first.
    async fn list_salaries(&self, filter: &SalaryFilter, page: PageRequest) -> HrResult<(Vec<SalaryRecord>, u64)>;

    async fn salary_lines(&self, month: Option<&str>, year: Option<i32>) -> HrResult<Vec<SalaryLine>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_department_match_is_case_insensitive_substring() {
        assert!(department_matches("Engineering", "engin"));
        assert!(department_matches("Human Resources", "RESOURCES"));
        assert!(!department_matches("Finance", "eng"));
    }
}
