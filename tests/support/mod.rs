//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use mockable::Clock;
use rust_decimal::Decimal;

use hrm_ledger::error::{HrError, HrResult};
use hrm_ledger::model::attendance::{AttendanceRecord, CheckOut};
use hrm_ledger::model::leave_request::{LeaveDecision, LeaveDraft, LeaveRequest, LeaveStatistics};
use hrm_ledger::model::pagination::PageRequest;
use hrm_ledger::model::payroll::{NewSalaryRecord, SalaryLine, SalaryRecord};
use hrm_ledger::model::role::Role;
use hrm_ledger::model::user::User;
use hrm_ledger::service::{AttendanceTracker, BulkPayrollRunner, LeaveLedger, PayrollCalculator};
use hrm_ledger::store::{AttendanceFilter, HrStore, LeaveFilter, MemoryStore, SalaryFilter};

/// A clock the test moves by hand.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn user(id: u64, role: Role, department: &str, base_salary: Decimal, leave_balance: i32) -> User {
    User {
        id,
        name: format!("User {id}"),
        email: format!("user{id}@hrms.test"),
        role,
        department: department.to_string(),
        base_salary,
        leave_balance,
        is_active: true,
    }
}

/// Services wired over one [`MemoryStore`] and one [`MutableClock`].
pub struct Engine {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<MutableClock>,
    pub attendance: AttendanceTracker,
    pub leaves: LeaveLedger,
    pub payroll: PayrollCalculator,
}

impl Engine {
    pub fn new(users: Vec<User>) -> Self {
        let store = Arc::new(MemoryStore::new());
        for user in users {
            store.upsert_user(user).unwrap();
        }
        Self::over(store.clone(), store)
    }

    /// Services run against `backend`; `store` stays reachable for seeding
    /// and inspection.
    pub fn over(store: Arc<MemoryStore>, backend: Arc<dyn HrStore>) -> Self {
        let clock = Arc::new(MutableClock::new(at(2024, 1, 15, 8, 0)));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        Self {
            attendance: AttendanceTracker::new(backend.clone(), dyn_clock.clone()),
            leaves: LeaveLedger::new(backend.clone(), dyn_clock.clone()),
            payroll: PayrollCalculator::new(backend, dyn_clock),
            store,
            clock,
        }
    }

    pub fn bulk(&self, concurrency: usize) -> BulkPayrollRunner {
        BulkPayrollRunner::new(self.payroll.clone(), concurrency)
    }

    /// Records one worked day of `minutes` starting 09:00 UTC.
    pub async fn work(&self, user_id: u64, day: NaiveDate, minutes: i64) -> AttendanceRecord {
        let start = Utc.from_utc_datetime(&day.and_hms_opt(9, 0, 0).unwrap());
        self.clock.set(start);
        self.attendance.check_in(user_id, None).await.unwrap();
        self.attendance
            .check_out(user_id, Some(start + chrono::Duration::minutes(minutes)))
            .await
            .unwrap()
    }
}

/// Delegates to a [`MemoryStore`] but fails attendance reads for one user,
/// so a payroll run sees a genuine per-user storage failure.
///
/// The first `stale_reads` lookups of an attendance or salary row report
/// nothing, as if another writer committed just after the read. The
/// following insert then hits the unique key.
pub struct FailingStore {
    pub inner: Arc<MemoryStore>,
    pub failing_user: u64,
    stale_reads: AtomicUsize,
}

impl FailingStore {
    pub fn new(inner: Arc<MemoryStore>, failing_user: u64) -> Self {
        Self {
            inner,
            failing_user,
            stale_reads: AtomicUsize::new(0),
        }
    }

    pub fn with_stale_reads(self, count: usize) -> Self {
        self.stale_reads.store(count, Ordering::SeqCst);
        self
    }

    fn read_is_stale(&self) -> bool {
        self.stale_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl HrStore for FailingStore {
    async fn find_user(&self, user_id: u64) -> HrResult<Option<User>> {
        self.inner.find_user(user_id).await
    }

    async fn active_users(&self) -> HrResult<Vec<User>> {
        self.inner.active_users().await
    }

    async fn insert_attendance(
        &self,
        user_id: u64,
        date: NaiveDate,
        check_in: DateTime<Utc>,
    ) -> HrResult<AttendanceRecord> {
        self.inner.insert_attendance(user_id, date, check_in).await
    }

    async fn find_attendance(&self, user_id: u64, date: NaiveDate) -> HrResult<Option<AttendanceRecord>> {
        if self.read_is_stale() {
            return Ok(None);
        }
        self.inner.find_attendance(user_id, date).await
    }

    async fn complete_attendance(&self, record_id: u64, checkout: &CheckOut) -> HrResult<Option<AttendanceRecord>> {
        self.inner.complete_attendance(record_id, checkout).await
    }

    async fn attendance_between(&self, user_id: u64, from: NaiveDate, to: NaiveDate) -> HrResult<Vec<AttendanceRecord>> {
        if user_id == self.failing_user {
            return Err(HrError::storage("attendance table unavailable"));
        }
        self.inner.attendance_between(user_id, from, to).await
    }

    async fn list_attendance(&self, filter: &AttendanceFilter, page: PageRequest) -> HrResult<(Vec<AttendanceRecord>, u64)> {
        self.inner.list_attendance(filter, page).await
    }

    async fn create_leave(&self, draft: LeaveDraft) -> HrResult<LeaveRequest> {
        self.inner.create_leave(draft).await
    }

    async fn find_leave(&self, leave_id: u64) -> HrResult<Option<LeaveRequest>> {
        self.inner.find_leave(leave_id).await
    }

    async fn list_leaves(&self, filter: &LeaveFilter, page: PageRequest) -> HrResult<(Vec<LeaveRequest>, u64)> {
        self.inner.list_leaves(filter, page).await
    }

    async fn settle_leave(&self, leave_id: u64, decision: &LeaveDecision) -> HrResult<LeaveRequest> {
        self.inner.settle_leave(leave_id, decision).await
    }

    async fn delete_pending_leave(&self, leave_id: u64) -> HrResult<bool> {
        self.inner.delete_pending_leave(leave_id).await
    }

    async fn leave_statistics(&self, user_id: u64, year: i32) -> HrResult<LeaveStatistics> {
        self.inner.leave_statistics(user_id, year).await
    }

    async fn find_salary(&self, user_id: u64, month: &str) -> HrResult<Option<SalaryRecord>> {
        if self.read_is_stale() {
            return Ok(None);
        }
        self.inner.find_salary(user_id, month).await
    }

    async fn find_salary_by_id(&self, salary_id: u64) -> HrResult<Option<SalaryRecord>> {
        self.inner.find_salary_by_id(salary_id).await
    }

    async fn insert_salary(&self, record: NewSalaryRecord) -> HrResult<SalaryRecord> {
        self.inner.insert_salary(record).await
    }

    async fn list_salaries(&self, filter: &SalaryFilter, page: PageRequest) -> HrResult<(Vec<SalaryRecord>, u64)> {
        self.inner.list_salaries(filter, page).await
    }

    async fn salary_lines(&self, month: Option<&str>, year: Option<i32>) -> HrResult<Vec<SalaryLine>> {
        self.inner.salary_lines(month, year).await
    }
}
