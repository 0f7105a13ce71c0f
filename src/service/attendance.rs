use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use mockable::Clock;

use crate::error::{HrError, HrResult};
use crate::model::attendance::{AttendanceRecord, AttendanceSummary};
use crate::model::pagination::{PageRequest, Paginated};
use crate::model::payroll::PayrollMonth;
use crate::model::user::User;
use crate::store::{AttendanceFilter, HrStore};

/// Daily check-in / check-out and the monthly attendance aggregate.
#[derive(Clone)]
pub struct AttendanceTracker {
    store: Arc<dyn HrStore>,
    clock: Arc<dyn Clock>,
}

impl AttendanceTracker {
    pub fn new(store: Arc<dyn HrStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// The calendar day records are keyed on, in UTC.
    pub fn today(&self) -> NaiveDate {
        self.clock.utc().date_naive()
    }

    async fn require_user(&self, user_id: u64) -> HrResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(HrError::UserNotFound { user_id })
    }

    pub async fn check_in(&self, user_id: u64, at: Option<DateTime<Utc>>) -> HrResult<AttendanceRecord> {
        self.require_user(user_id).await?;
        let today = self.today();

        if self.store.find_attendance(user_id, today).await?.is_some() {
            return Err(HrError::AlreadyCheckedIn);
        }

        let check_in = at.unwrap_or_else(|| self.clock.utc());
        let record = match self.store.insert_attendance(user_id, today, check_in).await {
            Ok(record) => record,
            // Lost a race with a concurrent check-in for the same day.
            Err(HrError::Duplicate { .. }) => return Err(HrError::AlreadyCheckedIn),
            Err(e) => return Err(e),
        };

        tracing::info!(user_id, date = %today, record_id = record.id, "Checked in");
        Ok(record)
    }

    pub async fn check_out(&self, user_id: u64, at: Option<DateTime<Utc>>) -> HrResult<AttendanceRecord> {
        let today = self.today();
        let record = self
            .store
            .find_attendance(user_id, today)
            .await?
            .ok_or(HrError::NoCheckInFound)?;

        let checkout = record.check_out_at(at.unwrap_or_else(|| self.clock.utc()))?;
        let completed = self
            .store
            .complete_attendance(record.id, &checkout)
            .await?
            .ok_or(HrError::AlreadyCheckedOut)?;

        tracing::info!(
            user_id,
            record_id = completed.id,
            work_hours = %completed.work_hours,
            status = %checkout.status,
            "Checked out"
        );
        Ok(completed)
    }

    pub async fn get_today_attendance(&self, user_id: u64) -> HrResult<Option<AttendanceRecord>> {
        self.store.find_attendance(user_id, self.today()).await
    }

    /// The user's records, newest first. The month filter applies only when
    /// both `month` and `year` are given.
    pub async fn get_attendance_history(
        &self,
        user_id: u64,
        page: PageRequest,
        month: Option<u32>,
        year: Option<i32>,
    ) -> HrResult<Paginated<AttendanceRecord>> {
        let between = match (month, year) {
            (Some(month), Some(year)) => {
                let period = period_of(month, year)?;
                Some((period.first_day(), period.last_day()))
            }
            _ => None,
        };

        let filter = AttendanceFilter {
            user_id: Some(user_id),
            between,
            ..Default::default()
        };
        let (data, total) = self.store.list_attendance(&filter, page).await?;
        Ok(Paginated::new(data, total, page))
    }

    pub async fn get_attendance_summary(&self, user_id: u64, month: u32, year: i32) -> HrResult<AttendanceSummary> {
        let period = period_of(month, year)?;
        let user = self.require_user(user_id).await?;
        let records = self
            .store
            .attendance_between(user_id, period.first_day(), period.last_day())
            .await?;

        Ok(AttendanceSummary::from_records(
            user.id,
            month,
            year,
            period.days(),
            user.base_salary,
            records,
        ))
    }

    pub async fn get_all_attendance(
        &self,
        page: PageRequest,
        filter: AttendanceFilter,
    ) -> HrResult<Paginated<AttendanceRecord>> {
        let (data, total) = self.store.list_attendance(&filter, page).await?;
        Ok(Paginated::new(data, total, page))
    }
}

fn period_of(month: u32, year: i32) -> HrResult<PayrollMonth> {
    PayrollMonth::from_parts(month, year).ok_or_else(|| HrError::InvalidMonth {
        month: month.to_string(),
        year,
    })
}
