//! In-process [`HrStore`].
//!
//! All tables sit behind one mutex, so every trait method is trivially
//! atomic: unique keys, leave settlement and conditional updates all happen
//! inside a single critical section. Used for embedded runs and tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};

use super::{
    ATTENDANCE_USER_DATE_KEY, AttendanceFilter, HrStore, LeaveFilter, SALARY_USER_MONTH_KEY, SalaryFilter,
    department_matches,
};
use crate::error::{HrError, HrResult};
use crate::model::attendance::{AttendanceRecord, CheckOut};
use crate::model::leave_request::{LeaveDecision, LeaveDraft, LeaveRequest, LeaveStatistics, LeaveStatus};
use crate::model::pagination::PageRequest;
use crate::model::payroll::{NewSalaryRecord, SalaryLine, SalaryRecord};
use crate::model::user::User;

#[derive(Default)]
struct Tables {
    users: BTreeMap<u64, User>,
    attendance: BTreeMap<u64, AttendanceRecord>,
    leaves: BTreeMap<u64, LeaveRequest>,
    salaries: BTreeMap<u64, SalaryRecord>,
    next_id: u64,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn department_of(&self, user_id: u64) -> Option<&str> {
        self.users.get(&user_id).map(|u| u.department.as_str())
    }

    fn in_department(&self, user_id: u64, needle: Option<&str>) -> bool {
        match needle {
            None => true,
            Some(needle) => self
                .department_of(user_id)
                .is_some_and(|department| department_matches(department, needle)),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

fn page_of<T: Clone>(rows: Vec<&T>, page: PageRequest) -> (Vec<T>, u64) {
    let total = rows.len() as u64;
    let data = rows
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .cloned()
        .collect();
    (data, total)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user. Users are owned outside the engine; this is
    /// how they get here.
    pub fn upsert_user(&self, user: User) -> HrResult<()> {
        self.lock()?.users.insert(user.id, user);
        Ok(())
    }

    fn lock(&self) -> HrResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| HrError::storage("memory store lock poisoned"))
    }
}

#[async_trait]
impl HrStore for MemoryStore {
    async fn find_user(&self, user_id: u64) -> HrResult<Option<User>> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    async fn active_users(&self) -> HrResult<Vec<User>> {
        Ok(self.lock()?.users.values().filter(|u| u.is_active).cloned().collect())
    }

    async fn insert_attendance(
        &self,
        user_id: u64,
        date: NaiveDate,
        check_in: DateTime<Utc>,
    ) -> HrResult<AttendanceRecord> {
        let mut tables = self.lock()?;
        if tables
            .attendance
            .values()
            .any(|r| r.user_id == user_id && r.date == date)
        {
            return Err(HrError::Duplicate {
                constraint: ATTENDANCE_USER_DATE_KEY,
            });
        }

        let record = AttendanceRecord {
            id: tables.next_id(),
            user_id,
            date,
            check_in,
            check_out: None,
            work_hours: Default::default(),
            status: None,
        };
        tables.attendance.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_attendance(&self, user_id: u64, date: NaiveDate) -> HrResult<Option<AttendanceRecord>> {
        Ok(self
            .lock()?
            .attendance
            .values()
            .find(|r| r.user_id == user_id && r.date == date)
            .cloned())
    }

    async fn complete_attendance(&self, record_id: u64, checkout: &CheckOut) -> HrResult<Option<AttendanceRecord>> {
        let mut tables = self.lock()?;
        let Some(record) = tables.attendance.get_mut(&record_id) else {
            return Ok(None);
        };
        if record.check_out.is_some() {
            return Ok(None);
        }

        record.check_out = Some(checkout.check_out);
        record.work_hours = checkout.work_hours;
        record.status = Some(checkout.status);
        Ok(Some(record.clone()))
    }

    async fn attendance_between(&self, user_id: u64, from: NaiveDate, to: NaiveDate) -> HrResult<Vec<AttendanceRecord>> {
        let tables = self.lock()?;
        let mut records: Vec<_> = tables
            .attendance
            .values()
            .filter(|r| r.user_id == user_id && r.date >= from && r.date <= to)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.date);
        Ok(records)
    }

    async fn list_attendance(&self, filter: &AttendanceFilter, page: PageRequest) -> HrResult<(Vec<AttendanceRecord>, u64)> {
        let tables = self.lock()?;
        let mut rows: Vec<&AttendanceRecord> = tables
            .attendance
            .values()
            .filter(|r| filter.user_id.is_none_or(|id| r.user_id == id))
            .filter(|r| filter.date.is_none_or(|d| r.date == d))
            .filter(|r| filter.between.is_none_or(|(from, to)| r.date >= from && r.date <= to))
            .filter(|r| filter.status.is_none_or(|s| r.status == Some(s)))
            .filter(|r| tables.in_department(r.user_id, filter.department.as_deref()))
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(page_of(rows, page))
    }

    async fn create_leave(&self, draft: LeaveDraft) -> HrResult<LeaveRequest> {
        let mut tables = self.lock()?;
        let balance = tables
            .users
            .get(&draft.user_id)
            .map(|u| u.leave_balance)
            .ok_or(HrError::UserNotFound { user_id: draft.user_id })?;

        if let Some(existing) = tables
            .leaves
            .values()
            .find(|l| l.user_id == draft.user_id && l.overlaps(draft.from_date, draft.to_date))
        {
            return Err(HrError::OverlappingLeave { leave_id: existing.id });
        }

        let id = tables.next_id();
        let leave = draft.into_pending(id, balance);
        tables.leaves.insert(id, leave.clone());
        Ok(leave)
    }

    async fn find_leave(&self, leave_id: u64) -> HrResult<Option<LeaveRequest>> {
        Ok(self.lock()?.leaves.get(&leave_id).cloned())
    }

    async fn list_leaves(&self, filter: &LeaveFilter, page: PageRequest) -> HrResult<(Vec<LeaveRequest>, u64)> {
        let tables = self.lock()?;
        let mut rows: Vec<&LeaveRequest> = tables
            .leaves
            .values()
            .filter(|l| filter.user_id.is_none_or(|id| l.user_id == id))
            .filter(|l| filter.status.is_none_or(|s| l.status == s))
            .filter(|l| tables.in_department(l.user_id, filter.department.as_deref()))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page_of(rows, page))
    }

    async fn settle_leave(&self, leave_id: u64, decision: &LeaveDecision) -> HrResult<LeaveRequest> {
        let mut tables = self.lock()?;
        let leave = tables
            .leaves
            .get(&leave_id)
            .cloned()
            .ok_or(HrError::LeaveNotFound { leave_id })?;
        let balance = tables
            .users
            .get(&leave.user_id)
            .map(|u| u.leave_balance)
            .ok_or(HrError::UserNotFound { user_id: leave.user_id })?;

        // Nothing is written until every check has passed.
        let settlement = leave.settle(decision, balance)?;

        if let Some(user) = tables.users.get_mut(&leave.user_id) {
            user.leave_balance -= settlement.balance_debit;
        }
        let stored = tables
            .leaves
            .get_mut(&leave_id)
            .ok_or(HrError::LeaveNotFound { leave_id })?;
        stored.apply(&settlement);
        Ok(stored.clone())
    }

    async fn delete_pending_leave(&self, leave_id: u64) -> HrResult<bool> {
        let mut tables = self.lock()?;
        match tables.leaves.get(&leave_id) {
            Some(leave) if leave.status == LeaveStatus::Pending => {
                tables.leaves.remove(&leave_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn leave_statistics(&self, user_id: u64, year: i32) -> HrResult<LeaveStatistics> {
        let tables = self.lock()?;
        let mut stats = LeaveStatistics::default();
        for leave in tables.leaves.values().filter(|l| l.user_id == user_id) {
            stats.total_leaves += 1;
            match leave.status {
                LeaveStatus::Approved => {
                    stats.approved_leaves += 1;
                    if leave.from_date.year() == year {
                        stats.total_approved_days_this_year += leave.total_days as i64;
                    }
                }
                LeaveStatus::Pending => stats.pending_leaves += 1,
                LeaveStatus::Rejected => stats.rejected_leaves += 1,
                LeaveStatus::Cancelled => {}
            }
        }
        Ok(stats)
    }

    async fn find_salary(&self, user_id: u64, month: &str) -> HrResult<Option<SalaryRecord>> {
        Ok(self
            .lock()?
            .salaries
            .values()
            .find(|s| s.user_id == user_id && s.month == month)
            .cloned())
    }

    async fn find_salary_by_id(&self, salary_id: u64) -> HrResult<Option<SalaryRecord>> {
        Ok(self.lock()?.salaries.get(&salary_id).cloned())
    }

    async fn insert_salary(&self, record: NewSalaryRecord) -> HrResult<SalaryRecord> {
        let mut tables = self.lock()?;
        if tables
            .salaries
            .values()
            .any(|s| s.user_id == record.user_id && s.month == record.month)
        {
            return Err(HrError::Duplicate {
                constraint: SALARY_USER_MONTH_KEY,
            });
        }

        let record = record.with_id(tables.next_id());
        tables.salaries.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_salaries(&self, filter: &SalaryFilter, page: PageRequest) -> HrResult<(Vec<SalaryRecord>, u64)> {
        let tables = self.lock()?;
        let mut rows: Vec<&SalaryRecord> = tables
            .salaries
            .values()
            .filter(|s| filter.user_id.is_none_or(|id| s.user_id == id))
            .filter(|s| filter.month.as_deref().is_none_or(|m| s.month == m))
            .filter(|s| filter.year.is_none_or(|y| s.year == y))
            .filter(|s| tables.in_department(s.user_id, filter.department.as_deref()))
            .collect();
        rows.sort_by(|a, b| {
            b.year
                .cmp(&a.year)
                .then_with(|| b.month.cmp(&a.month))
                .then(b.id.cmp(&a.id))
        });
        Ok(page_of(rows, page))
    }

    async fn salary_lines(&self, month: Option<&str>, year: Option<i32>) -> HrResult<Vec<SalaryLine>> {
        let tables = self.lock()?;
        Ok(tables
            .salaries
            .values()
            .filter(|s| month.is_none_or(|m| s.month == m))
            .filter(|s| year.is_none_or(|y| s.year == y))
            .filter_map(|s| {
                tables.department_of(s.user_id).map(|department| SalaryLine {
                    user_id: s.user_id,
                    department: department.to_string(),
                    base_salary: s.base_salary,
                    final_salary: s.final_salary,
                    salary_deduction: s.salary_deduction,
                    attendance_percentage: s.attendance_percentage,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use crate::model::role::Role;

    fn user(id: u64, balance: i32) -> User {
        User {
            id,
            name: format!("User {id}"),
            email: format!("user{id}@hrms.test"),
            role: Role::Employee,
            department: "Engineering".to_string(),
            base_salary: dec!(60000),
            leave_balance: balance,
            is_active: true,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn draft(user_id: u64, from: u32, to: u32) -> LeaveDraft {
        LeaveDraft::new(
            user_id,
            date(from),
            date(to),
            "Annual family vacation",
            Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
        )
        .unwrap()
    }

    #[actix_web::test]
    async fn test_attendance_key_is_unique() {
        let store = MemoryStore::new();
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        store.insert_attendance(1, date(15), at).await.unwrap();

        let second = store.insert_attendance(1, date(15), at).await;
        assert!(matches!(second, Err(HrError::Duplicate { .. })));
        assert!(store.insert_attendance(2, date(15), at).await.is_ok());
    }

    #[actix_web::test]
    async fn test_create_leave_requires_known_user() {
        let store = MemoryStore::new();
        let result = store.create_leave(draft(42, 15, 17)).await;
        assert!(matches!(result, Err(HrError::UserNotFound { user_id: 42 })));
    }

    #[actix_web::test]
    async fn test_delete_only_pending() {
        let store = MemoryStore::new();
        store.upsert_user(user(1, 5)).unwrap();
        let leave = store.create_leave(draft(1, 15, 17)).await.unwrap();

        let decision = LeaveDecision {
            status: LeaveStatus::Approved,
            approver_id: 9,
            decided_at: Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap(),
            rejection_reason: None,
        };
        store.settle_leave(leave.id, &decision).await.unwrap();

        assert!(!store.delete_pending_leave(leave.id).await.unwrap());
        assert!(store.find_leave(leave.id).await.unwrap().is_some());
    }

    #[actix_web::test]
    async fn test_failed_settlement_writes_nothing() {
        let store = MemoryStore::new();
        store.upsert_user(user(1, 5)).unwrap();
        let leave = store.create_leave(draft(1, 15, 17)).await.unwrap();

        let decision = LeaveDecision {
            status: LeaveStatus::Rejected,
            approver_id: 9,
            decided_at: Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap(),
            rejection_reason: None,
        };
        assert!(store.settle_leave(leave.id, &decision).await.is_err());

        let stored = store.find_leave(leave.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LeaveStatus::Pending);
        assert_eq!(store.find_user(1).await.unwrap().unwrap().leave_balance, 5);
    }
}
