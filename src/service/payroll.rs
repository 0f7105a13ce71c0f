use std::sync::Arc;

use futures::stream::{self, StreamExt};
use mockable::Clock;
use uuid::Uuid;

use super::attendance::AttendanceTracker;
use super::ensure_owner;
use crate::error::{HrError, HrResult};
use crate::model::pagination::{PageRequest, Paginated};
use crate::model::payroll::{
    BulkPayrollFailure, BulkPayrollReport, BulkPayrollSuccess, NewSalaryRecord, PayrollMonth, SalaryRecord,
    SalarySummary,
};
use crate::store::{HrStore, SalaryFilter};

pub const DEFAULT_PAYROLL_CONCURRENCY: usize = 4;

/// Turns a month of attendance into a salary record. At most one record
/// exists per user and month; recalculating returns the stored one.
#[derive(Clone)]
pub struct PayrollCalculator {
    store: Arc<dyn HrStore>,
    clock: Arc<dyn Clock>,
    tracker: AttendanceTracker,
}

impl PayrollCalculator {
    pub fn new(store: Arc<dyn HrStore>, clock: Arc<dyn Clock>) -> Self {
        let tracker = AttendanceTracker::new(store.clone(), clock.clone());
        Self { store, clock, tracker }
    }

    pub async fn calculate_salary(&self, user_id: u64, month: &str, year: i32) -> HrResult<SalaryRecord> {
        let month = PayrollMonth::parse(month, year)?;
        self.calculate_for(user_id, &month).await
    }

    async fn calculate_for(&self, user_id: u64, month: &PayrollMonth) -> HrResult<SalaryRecord> {
        let label = month.label();
        if let Some(existing) = self.store.find_salary(user_id, &label).await? {
            tracing::debug!(user_id, month = %label, salary_id = existing.id, "Salary already processed");
            return Ok(existing);
        }

        let summary = self
            .tracker
            .get_attendance_summary(user_id, month.month(), month.year())
            .await?;
        let record = NewSalaryRecord::from_summary(month, &summary, self.clock.utc());

        match self.store.insert_salary(record).await {
            Ok(saved) => {
                tracing::info!(
                    user_id,
                    month = %label,
                    salary_id = saved.id,
                    final_salary = %saved.final_salary,
                    "Salary calculated"
                );
                Ok(saved)
            }
            // A concurrent calculation stored first; its record is the answer.
            Err(HrError::Duplicate { .. }) => self.store.find_salary(user_id, &label).await?.ok_or_else(|| {
                HrError::storage(format!("salary for user {user_id} in {label} vanished after conflict"))
            }),
            Err(e) => Err(e),
        }
    }

    pub async fn get_salary_records(&self, page: PageRequest, filter: SalaryFilter) -> HrResult<Paginated<SalaryRecord>> {
        let (data, total) = self.store.list_salaries(&filter, page).await?;
        Ok(Paginated::new(data, total, page))
    }

    pub async fn get_salary_by_id(&self, salary_id: u64, requesting_user: Option<u64>) -> HrResult<SalaryRecord> {
        let salary = self
            .store
            .find_salary_by_id(salary_id)
            .await?
            .ok_or(HrError::SalaryNotFound { salary_id })?;
        ensure_owner(salary.user_id, requesting_user, "salary records")?;
        Ok(salary)
    }

    pub async fn get_user_salary_history(&self, user_id: u64, page: PageRequest) -> HrResult<Paginated<SalaryRecord>> {
        let filter = SalaryFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        self.get_salary_records(page, filter).await
    }

    pub async fn get_salary_summary(&self, month: Option<String>, year: Option<i32>) -> HrResult<SalarySummary> {
        let lines = self.store.salary_lines(month.as_deref(), year).await?;
        Ok(SalarySummary::from_lines(month, year, &lines))
    }
}

/// Runs [`PayrollCalculator`] for every active user with bounded fan-out.
#[derive(Clone)]
pub struct BulkPayrollRunner {
    calculator: PayrollCalculator,
    concurrency: usize,
}

impl BulkPayrollRunner {
    pub fn new(calculator: PayrollCalculator, concurrency: usize) -> Self {
        Self {
            calculator,
            concurrency: concurrency.max(1),
        }
    }

    /// An invalid month fails the whole call before any user is attempted.
    /// After that, each user's failure is recorded in the report and the
    /// rest carry on.
    pub async fn calculate_bulk_salary(&self, month: &str, year: i32) -> HrResult<BulkPayrollReport> {
        let period = PayrollMonth::parse(month, year)?;
        let users = self.calculator.store.active_users().await?;
        let run_id = Uuid::new_v4();
        tracing::info!(%run_id, month = %period, users = users.len(), "Bulk payroll started");

        let mut outcomes: Vec<_> = stream::iter(users)
            .map(|user| {
                let calculator = self.calculator.clone();
                async move {
                    let result = calculator.calculate_for(user.id, &period).await;
                    (user, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        outcomes.sort_by_key(|(user, _)| user.id);

        let total_users = outcomes.len();
        let mut results = Vec::new();
        let mut errors = Vec::new();
        for (user, outcome) in outcomes {
            match outcome {
                Ok(salary) => results.push(BulkPayrollSuccess {
                    user_id: user.id,
                    user_name: user.name,
                    salary,
                }),
                Err(e) => {
                    tracing::warn!(%run_id, user_id = user.id, error = %e, "Salary calculation failed");
                    errors.push(BulkPayrollFailure {
                        user_id: user.id,
                        user_name: user.name,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            %run_id,
            month = %period,
            successful = results.len(),
            failed = errors.len(),
            "Bulk payroll finished"
        );
        Ok(BulkPayrollReport {
            month: period.label(),
            year: period.year(),
            total_users,
            successful: results.len(),
            failed: errors.len(),
            results,
            errors,
        })
    }
}
