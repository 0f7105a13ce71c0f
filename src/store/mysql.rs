//! MySQL-backed [`HrStore`].
//!
//! Uniqueness is enforced by the `UNIQUE` keys in the migrations, and the two
//! read-modify-write paths (leave creation and settlement) run inside a
//! transaction holding `SELECT ... FOR UPDATE` locks on the affected rows.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySqlPool};

use super::{
    ATTENDANCE_USER_DATE_KEY, AttendanceFilter, HrStore, LeaveFilter, SALARY_USER_MONTH_KEY, SalaryFilter,
};
use crate::error::{HrError, HrResult};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus, CheckOut};
use crate::model::leave_request::{
    LeaveDecision, LeaveDraft, LeaveRequest, LeaveStatistics, LeaveStatus, split_against_balance,
};
use crate::model::pagination::PageRequest;
use crate::model::payroll::{NewSalaryRecord, SalaryLine, SalaryRecord};
use crate::model::role::Role;
use crate::model::user::User;
use crate::utils::db_utils::{SqlValue, WhereClause, is_duplicate_key};

const USER_COLUMNS: &str = "id, name, email, role, department, base_salary, leave_balance, is_active";
const ATTENDANCE_COLUMNS: &str = "a.id, a.user_id, a.date, a.check_in, a.check_out, a.work_hours, a.status";
const LEAVE_COLUMNS: &str = "l.id, l.user_id, l.from_date, l.to_date, l.total_days, l.reason, l.paid_days, \
     l.unpaid_days, l.status, l.approved_by, l.approved_at, l.rejection_reason, l.created_at";
const SALARY_COLUMNS: &str = "s.id, s.user_id, s.month, s.year, s.base_salary, s.working_days, s.present_days, \
     s.half_days, s.absent_days, s.attendance_percentage, s.salary_deduction, s.final_salary, \
     s.is_processed, s.processed_at";

#[derive(FromRow)]
struct UserRow {
    id: u64,
    name: String,
    email: String,
    role: u8,
    department: String,
    base_salary: Decimal,
    leave_balance: i32,
    is_active: bool,
}

impl TryFrom<UserRow> for User {
    type Error = HrError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::from_id(row.role)
            .ok_or_else(|| HrError::storage(format!("user {} has unknown role id {}", row.id, row.role)))?;
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            role,
            department: row.department,
            base_salary: row.base_salary,
            leave_balance: row.leave_balance,
            is_active: row.is_active,
        })
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    user_id: u64,
    date: NaiveDate,
    check_in: DateTime<Utc>,
    check_out: Option<DateTime<Utc>>,
    work_hours: Decimal,
    status: Option<String>,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = HrError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .as_deref()
            .map(str::parse::<AttendanceStatus>)
            .transpose()
            .map_err(|_| HrError::storage(format!("attendance {} has an unknown status", row.id)))?;
        Ok(AttendanceRecord {
            id: row.id,
            user_id: row.user_id,
            date: row.date,
            check_in: row.check_in,
            check_out: row.check_out,
            work_hours: row.work_hours,
            status,
        })
    }
}

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    user_id: u64,
    from_date: NaiveDate,
    to_date: NaiveDate,
    total_days: i32,
    reason: String,
    paid_days: i32,
    unpaid_days: i32,
    status: String,
    approved_by: Option<u64>,
    approved_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LeaveRow> for LeaveRequest {
    type Error = HrError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<LeaveStatus>()
            .map_err(|_| HrError::storage(format!("leave {} has unknown status {}", row.id, row.status)))?;
        Ok(LeaveRequest {
            id: row.id,
            user_id: row.user_id,
            from_date: row.from_date,
            to_date: row.to_date,
            total_days: row.total_days,
            reason: row.reason,
            paid_days: row.paid_days,
            unpaid_days: row.unpaid_days,
            status,
            approved_by: row.approved_by,
            approved_at: row.approved_at,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct SalaryRow {
    id: u64,
    user_id: u64,
    month: String,
    year: i32,
    base_salary: Decimal,
    working_days: u32,
    present_days: u32,
    half_days: u32,
    absent_days: u32,
    attendance_percentage: Decimal,
    salary_deduction: Decimal,
    final_salary: Decimal,
    is_processed: bool,
    processed_at: DateTime<Utc>,
}

impl From<SalaryRow> for SalaryRecord {
    fn from(row: SalaryRow) -> Self {
        SalaryRecord {
            id: row.id,
            user_id: row.user_id,
            month: row.month,
            year: row.year,
            base_salary: row.base_salary,
            working_days: row.working_days,
            present_days: row.present_days,
            half_days: row.half_days,
            absent_days: row.absent_days,
            attendance_percentage: row.attendance_percentage,
            salary_deduction: row.salary_deduction,
            final_salary: row.final_salary,
            is_processed: row.is_processed,
            processed_at: row.processed_at,
        }
    }
}

#[derive(FromRow)]
struct LeaveCountsRow {
    total_leaves: i64,
    approved_leaves: i64,
    pending_leaves: i64,
    rejected_leaves: i64,
    approved_days: i64,
}

#[derive(FromRow)]
struct SalaryLineRow {
    user_id: u64,
    department: String,
    base_salary: Decimal,
    final_salary: Decimal,
    salary_deduction: Decimal,
    attendance_percentage: Decimal,
}

/// Logs a failed query and turns it into a storage error.
fn db_failure(operation: &'static str) -> impl FnOnce(sqlx::Error) -> HrError {
    move |e| {
        tracing::error!(error = %e, operation, "Database operation failed");
        HrError::from(e)
    }
}

fn into_all<R, T>(rows: Vec<R>) -> HrResult<Vec<T>>
where
    T: TryFrom<R, Error = HrError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn attendance_by_id(&self, record_id: u64) -> HrResult<Option<AttendanceRecord>> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE a.id = ?");
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(record_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_failure("fetch attendance by id"))?
            .map(AttendanceRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl HrStore for MySqlStore {
    async fn find_user(&self, user_id: u64) -> HrResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_failure("fetch user"))?
            .map(User::try_from)
            .transpose()
    }

    async fn active_users(&self) -> HrResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE is_active = TRUE ORDER BY id");
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_failure("fetch active users"))?;
        into_all(rows)
    }

    async fn insert_attendance(
        &self,
        user_id: u64,
        date: NaiveDate,
        check_in: DateTime<Utc>,
    ) -> HrResult<AttendanceRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance (user_id, date, check_in, work_hours)
            VALUES (?, ?, ?, 0)
            "#,
        )
        .bind(user_id)
        .bind(date)
        .bind(check_in)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(AttendanceRecord {
                id: done.last_insert_id(),
                user_id,
                date,
                check_in,
                check_out: None,
                work_hours: Decimal::ZERO,
                status: None,
            }),
            Err(e) if is_duplicate_key(&e) => Err(HrError::Duplicate {
                constraint: ATTENDANCE_USER_DATE_KEY,
            }),
            Err(e) => Err(db_failure("insert attendance")(e)),
        }
    }

    async fn find_attendance(&self, user_id: u64, date: NaiveDate) -> HrResult<Option<AttendanceRecord>> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance a WHERE a.user_id = ? AND a.date = ?");
        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_failure("fetch attendance"))?
            .map(AttendanceRecord::try_from)
            .transpose()
    }

    async fn complete_attendance(&self, record_id: u64, checkout: &CheckOut) -> HrResult<Option<AttendanceRecord>> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET check_out = ?, work_hours = ?, status = ?
            WHERE id = ?
            AND check_out IS NULL
            "#,
        )
        .bind(checkout.check_out)
        .bind(checkout.work_hours)
        .bind(checkout.status.as_ref())
        .bind(record_id)
        .execute(&self.pool)
        .await
        .map_err(db_failure("complete attendance"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.attendance_by_id(record_id).await
    }

    async fn attendance_between(&self, user_id: u64, from: NaiveDate, to: NaiveDate) -> HrResult<Vec<AttendanceRecord>> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance a \
             WHERE a.user_id = ? AND a.date BETWEEN ? AND ? ORDER BY a.date"
        );
        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .map_err(db_failure("fetch attendance range"))?;
        into_all(rows)
    }

    async fn list_attendance(&self, filter: &AttendanceFilter, page: PageRequest) -> HrResult<(Vec<AttendanceRecord>, u64)> {
        let mut clause = WhereClause::new();
        clause
            .and_opt("a.user_id = ?", filter.user_id.map(SqlValue::U64))
            .and_opt("a.date = ?", filter.date.map(SqlValue::Date))
            .and_opt("a.status = ?", filter.status.map(|s| SqlValue::Str(s.to_string())))
            .and_contains("u.department", filter.department.as_deref());
        if let Some((from, to)) = filter.between {
            clause
                .and("a.date >= ?", SqlValue::Date(from))
                .and("a.date <= ?", SqlValue::Date(to));
        }

        let from_sql = format!("FROM attendance a JOIN users u ON u.id = a.user_id{}", clause.sql());

        let count_sql = format!("SELECT COUNT(*) {from_sql}");
        let total = clause
            .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
            .fetch_one(&self.pool)
            .await
            .map_err(db_failure("count attendance"))?;

        let data_sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} {from_sql} ORDER BY a.date DESC, a.id DESC LIMIT ? OFFSET ?"
        );
        let rows = clause
            .bind_as(sqlx::query_as::<_, AttendanceRow>(&data_sql))
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(db_failure("list attendance"))?;

        Ok((into_all(rows)?, total as u64))
    }

    async fn create_leave(&self, draft: LeaveDraft) -> HrResult<LeaveRequest> {
        let mut tx = self.pool.begin().await.map_err(db_failure("begin leave creation"))?;

        // Serializes submissions per user until commit.
        let balance = sqlx::query_scalar::<_, i32>("SELECT leave_balance FROM users WHERE id = ? FOR UPDATE")
            .bind(draft.user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_failure("lock user for leave"))?
            .ok_or(HrError::UserNotFound { user_id: draft.user_id })?;

        let overlapping = sqlx::query_scalar::<_, u64>(
            r#"
            SELECT id FROM leave_requests
            WHERE user_id = ?
            AND status <> ?
            AND from_date <= ?
            AND to_date >= ?
            LIMIT 1
            "#,
        )
        .bind(draft.user_id)
        .bind(LeaveStatus::Rejected.as_ref())
        .bind(draft.to_date)
        .bind(draft.from_date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_failure("check leave overlap"))?;

        if let Some(leave_id) = overlapping {
            return Err(HrError::OverlappingLeave { leave_id });
        }

        let (paid_days, unpaid_days) = split_against_balance(draft.total_days, balance);
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (user_id, from_date, to_date, total_days, reason, paid_days, unpaid_days, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(draft.user_id)
        .bind(draft.from_date)
        .bind(draft.to_date)
        .bind(draft.total_days)
        .bind(&draft.reason)
        .bind(paid_days)
        .bind(unpaid_days)
        .bind(LeaveStatus::Pending.as_ref())
        .bind(draft.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_failure("insert leave"))?;

        tx.commit().await.map_err(db_failure("commit leave creation"))?;
        Ok(draft.into_pending(result.last_insert_id(), balance))
    }

    async fn find_leave(&self, leave_id: u64) -> HrResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests l WHERE l.id = ?");
        sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(leave_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_failure("fetch leave"))?
            .map(LeaveRequest::try_from)
            .transpose()
    }

    async fn list_leaves(&self, filter: &LeaveFilter, page: PageRequest) -> HrResult<(Vec<LeaveRequest>, u64)> {
        let mut clause = WhereClause::new();
        clause
            .and_opt("l.user_id = ?", filter.user_id.map(SqlValue::U64))
            .and_opt("l.status = ?", filter.status.map(|s| SqlValue::Str(s.to_string())))
            .and_contains("u.department", filter.department.as_deref());

        let from_sql = format!("FROM leave_requests l JOIN users u ON u.id = l.user_id{}", clause.sql());

        let count_sql = format!("SELECT COUNT(*) {from_sql}");
        let total = clause
            .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
            .fetch_one(&self.pool)
            .await
            .map_err(db_failure("count leaves"))?;

        let data_sql = format!(
            "SELECT {LEAVE_COLUMNS} {from_sql} ORDER BY l.created_at DESC, l.id DESC LIMIT ? OFFSET ?"
        );
        let rows = clause
            .bind_as(sqlx::query_as::<_, LeaveRow>(&data_sql))
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(db_failure("list leaves"))?;

        Ok((into_all(rows)?, total as u64))
    }

    async fn settle_leave(&self, leave_id: u64, decision: &LeaveDecision) -> HrResult<LeaveRequest> {
        // Dropping `tx` on any early return rolls both writes back.
        let mut tx = self.pool.begin().await.map_err(db_failure("begin leave settlement"))?;

        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests l WHERE l.id = ? FOR UPDATE");
        let mut leave: LeaveRequest = sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(leave_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_failure("lock leave"))?
            .ok_or(HrError::LeaveNotFound { leave_id })?
            .try_into()?;

        let balance = sqlx::query_scalar::<_, i32>("SELECT leave_balance FROM users WHERE id = ? FOR UPDATE")
            .bind(leave.user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_failure("lock leave owner"))?
            .ok_or(HrError::UserNotFound { user_id: leave.user_id })?;

        let settlement = leave.settle(decision, balance)?;

        sqlx::query(
            r#"
            UPDATE leave_requests
            SET status = ?, approved_by = ?, approved_at = ?, rejection_reason = ?,
                paid_days = ?, unpaid_days = ?
            WHERE id = ?
            "#,
        )
        .bind(settlement.status.as_ref())
        .bind(settlement.approved_by)
        .bind(settlement.approved_at)
        .bind(settlement.rejection_reason.as_deref())
        .bind(settlement.paid_days)
        .bind(settlement.unpaid_days)
        .bind(leave_id)
        .execute(&mut *tx)
        .await
        .map_err(db_failure("update leave status"))?;

        if settlement.balance_debit > 0 {
            sqlx::query("UPDATE users SET leave_balance = leave_balance - ? WHERE id = ?")
                .bind(settlement.balance_debit)
                .bind(leave.user_id)
                .execute(&mut *tx)
                .await
                .map_err(db_failure("debit leave balance"))?;
        }

        tx.commit().await.map_err(db_failure("commit leave settlement"))?;
        leave.apply(&settlement);
        Ok(leave)
    }

    async fn delete_pending_leave(&self, leave_id: u64) -> HrResult<bool> {
        let result = sqlx::query("DELETE FROM leave_requests WHERE id = ? AND status = ?")
            .bind(leave_id)
            .bind(LeaveStatus::Pending.as_ref())
            .execute(&self.pool)
            .await
            .map_err(db_failure("delete leave"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn leave_statistics(&self, user_id: u64, year: i32) -> HrResult<LeaveStatistics> {
        let counts = sqlx::query_as::<_, LeaveCountsRow>(
            r#"
            SELECT
                COUNT(*) AS total_leaves,
                CAST(COALESCE(SUM(status = 'APPROVED'), 0) AS SIGNED) AS approved_leaves,
                CAST(COALESCE(SUM(status = 'PENDING'), 0) AS SIGNED) AS pending_leaves,
                CAST(COALESCE(SUM(status = 'REJECTED'), 0) AS SIGNED) AS rejected_leaves,
                CAST(COALESCE(SUM(CASE WHEN status = 'APPROVED' AND YEAR(from_date) = ?
                    THEN total_days ELSE 0 END), 0) AS SIGNED) AS approved_days
            FROM leave_requests
            WHERE user_id = ?
            "#,
        )
        .bind(year)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_failure("leave statistics"))?;

        Ok(LeaveStatistics {
            total_leaves: counts.total_leaves as u64,
            approved_leaves: counts.approved_leaves as u64,
            pending_leaves: counts.pending_leaves as u64,
            rejected_leaves: counts.rejected_leaves as u64,
            total_approved_days_this_year: counts.approved_days,
        })
    }

    async fn find_salary(&self, user_id: u64, month: &str) -> HrResult<Option<SalaryRecord>> {
        let sql = format!("SELECT {SALARY_COLUMNS} FROM salary_records s WHERE s.user_id = ? AND s.month = ?");
        let row = sqlx::query_as::<_, SalaryRow>(&sql)
            .bind(user_id)
            .bind(month)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_failure("fetch salary"))?;
        Ok(row.map(SalaryRecord::from))
    }

    async fn find_salary_by_id(&self, salary_id: u64) -> HrResult<Option<SalaryRecord>> {
        let sql = format!("SELECT {SALARY_COLUMNS} FROM salary_records s WHERE s.id = ?");
        let row = sqlx::query_as::<_, SalaryRow>(&sql)
            .bind(salary_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_failure("fetch salary by id"))?;
        Ok(row.map(SalaryRecord::from))
    }

    async fn insert_salary(&self, record: NewSalaryRecord) -> HrResult<SalaryRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO salary_records
                (user_id, month, year, base_salary, working_days, present_days, half_days, absent_days,
                 attendance_percentage, salary_deduction, final_salary, is_processed, processed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, TRUE, ?)
            "#,
        )
        .bind(record.user_id)
        .bind(&record.month)
        .bind(record.year)
        .bind(record.base_salary)
        .bind(record.working_days)
        .bind(record.present_days)
        .bind(record.half_days)
        .bind(record.absent_days)
        .bind(record.attendance_percentage)
        .bind(record.salary_deduction)
        .bind(record.final_salary)
        .bind(record.processed_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(record.with_id(done.last_insert_id())),
            Err(e) if is_duplicate_key(&e) => Err(HrError::Duplicate {
                constraint: SALARY_USER_MONTH_KEY,
            }),
            Err(e) => Err(db_failure("insert salary")(e)),
        }
    }

    async fn list_salaries(&self, filter: &SalaryFilter, page: PageRequest) -> HrResult<(Vec<SalaryRecord>, u64)> {
        let mut clause = WhereClause::new();
        clause
            .and_opt("s.user_id = ?", filter.user_id.map(SqlValue::U64))
            .and_opt("s.month = ?", filter.month.clone().map(SqlValue::Str))
            .and_opt("s.year = ?", filter.year.map(SqlValue::I32))
            .and_contains("u.department", filter.department.as_deref());

        let from_sql = format!("FROM salary_records s JOIN users u ON u.id = s.user_id{}", clause.sql());

        let count_sql = format!("SELECT COUNT(*) {from_sql}");
        let total = clause
            .bind_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
            .fetch_one(&self.pool)
            .await
            .map_err(db_failure("count salaries"))?;

        let data_sql = format!(
            "SELECT {SALARY_COLUMNS} {from_sql} ORDER BY s.year DESC, s.month DESC, s.id DESC LIMIT ? OFFSET ?"
        );
        let rows = clause
            .bind_as(sqlx::query_as::<_, SalaryRow>(&data_sql))
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(db_failure("list salaries"))?;

        Ok((rows.into_iter().map(SalaryRecord::from).collect(), total as u64))
    }

    async fn salary_lines(&self, month: Option<&str>, year: Option<i32>) -> HrResult<Vec<SalaryLine>> {
        let mut clause = WhereClause::new();
        clause
            .and_opt("s.month = ?", month.map(|m| SqlValue::Str(m.to_string())))
            .and_opt("s.year = ?", year.map(SqlValue::I32));

        let sql = format!(
            "SELECT s.user_id, u.department, s.base_salary, s.final_salary, s.salary_deduction, \
             s.attendance_percentage \
             FROM salary_records s JOIN users u ON u.id = s.user_id{}",
            clause.sql()
        );
        let rows = clause
            .bind_as(sqlx::query_as::<_, SalaryLineRow>(&sql))
            .fetch_all(&self.pool)
            .await
            .map_err(db_failure("salary summary"))?;

        Ok(rows
            .into_iter()
            .map(|row| SalaryLine {
                user_id: row.user_id,
                department: row.department,
                base_salary: row.base_salary,
                final_salary: row.final_salary,
                salary_deduction: row.salary_deduction,
                attendance_percentage: row.attendance_percentage,
            })
            .collect())
    }
}
