use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use super::payroll::SalaryBreakdown;
use super::round2;

/// Hours at or above which a day counts as present.
pub const PRESENT_HOURS: Decimal = Decimal::from_parts(4, 0, 0, false, 0);
/// Hours at or above which a day counts as a half day.
pub const HALF_DAY_HOURS: Decimal = Decimal::from_parts(2, 0, 0, false, 0);

const MILLIS_PER_HOUR: i64 = 3_600_000;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    HalfDay,
    Absent,
}

impl AttendanceStatus {
    /// Classifies a day from the hours worked. Both thresholds are inclusive
    /// lower bounds: 4.0 is present, 2.0 is a half day.
    pub fn from_work_hours(hours: Decimal) -> Self {
        if hours >= PRESENT_HOURS {
            AttendanceStatus::Present
        } else if hours >= HALF_DAY_HOURS {
            AttendanceStatus::HalfDay
        } else {
            AttendanceStatus::Absent
        }
    }
}

/// Exact hours between two instants, at millisecond resolution.
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Decimal {
    let millis = (to - from).num_milliseconds();
    Decimal::from(millis) / Decimal::from(MILLIS_PER_HOUR)
}

/// One user's attendance for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    #[schema(value_type = String, format = "date", example = "2024-01-15")]
    pub date: NaiveDate,
    #[schema(value_type = String, format = "date-time")]
    pub check_in: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<DateTime<Utc>>,
    #[schema(value_type = String, example = "8.50")]
    pub work_hours: Decimal,
    /// Unset until check-out.
    pub status: Option<AttendanceStatus>,
}

impl AttendanceRecord {
    pub fn is_checked_out(&self) -> bool {
        self.check_out.is_some()
    }

    /// Validates a check-out instant against this record and derives what
    /// the completed record should hold.
    pub fn check_out_at(&self, at: DateTime<Utc>) -> Result<CheckOut, crate::error::HrError> {
        use crate::error::HrError;

        if self.is_checked_out() {
            return Err(HrError::AlreadyCheckedOut);
        }
        if at <= self.check_in {
            return Err(HrError::InvalidTimeOrder);
        }

        let hours = hours_between(self.check_in, at);
        Ok(CheckOut {
            check_out: at,
            work_hours: round2(hours),
            status: AttendanceStatus::from_work_hours(hours),
        })
    }
}

/// The single mutation applied to an attendance record at check-out.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOut {
    pub check_out: DateTime<Utc>,
    pub work_hours: Decimal,
    pub status: AttendanceStatus,
}

/// Monthly aggregate consumed by payroll.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub user_id: u64,
    pub month: u32,
    pub year: i32,
    /// Calendar days in the month; weekends and holidays are not excluded.
    pub working_days: u32,
    pub present_days: u32,
    pub half_days: u32,
    pub absent_days: u32,
    #[schema(value_type = String)]
    pub total_work_hours: Decimal,
    #[schema(value_type = String)]
    pub attendance_percentage: Decimal,
    #[schema(value_type = String)]
    pub base_salary: Decimal,
    /// What payroll would pay for the month as it stands.
    pub salary: SalaryBreakdown,
    pub records: Vec<AttendanceRecord>,
}

impl AttendanceSummary {
    pub fn from_records(
        user_id: u64,
        month: u32,
        year: i32,
        working_days: u32,
        base_salary: Decimal,
        records: Vec<AttendanceRecord>,
    ) -> Self {
        let count = |status: AttendanceStatus| {
            records.iter().filter(|r| r.status == Some(status)).count() as u32
        };
        let present_days = count(AttendanceStatus::Present);
        let half_days = count(AttendanceStatus::HalfDay);
        let absent_days = count(AttendanceStatus::Absent);
        let total_work_hours: Decimal = records.iter().map(|r| r.work_hours).sum();

        Self {
            user_id,
            month,
            year,
            working_days,
            present_days,
            half_days,
            absent_days,
            total_work_hours: round2(total_work_hours),
            attendance_percentage: attendance_percentage(present_days, half_days, working_days),
            base_salary,
            salary: SalaryBreakdown::derive(base_salary, working_days, absent_days, half_days),
            records,
        }
    }
}

/// `(present + 0.5 * half) / working_days * 100`, rounded to 2 decimals.
pub fn attendance_percentage(present_days: u32, half_days: u32, working_days: u32) -> Decimal {
    if working_days == 0 {
        return Decimal::ZERO;
    }
    let attended = Decimal::from(present_days) + Decimal::new(5, 1) * Decimal::from(half_days);
    round2(attended / Decimal::from(working_days) * Decimal::ONE_HUNDRED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HrError;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, s).unwrap()
    }

    fn open_record() -> AttendanceRecord {
        AttendanceRecord {
            id: 1,
            user_id: 10,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            check_in: at(9, 0, 0),
            check_out: None,
            work_hours: Decimal::ZERO,
            status: None,
        }
    }

    #[test]
    fn test_status_boundaries() {
        assert_eq!(AttendanceStatus::from_work_hours(dec!(4.0)), AttendanceStatus::Present);
        assert_eq!(AttendanceStatus::from_work_hours(dec!(3.999)), AttendanceStatus::HalfDay);
        assert_eq!(AttendanceStatus::from_work_hours(dec!(2.0)), AttendanceStatus::HalfDay);
        assert_eq!(AttendanceStatus::from_work_hours(dec!(1.999)), AttendanceStatus::Absent);
        assert_eq!(AttendanceStatus::from_work_hours(dec!(0)), AttendanceStatus::Absent);
    }

    #[test]
    fn test_status_column_values() {
        assert_eq!(AttendanceStatus::HalfDay.as_ref(), "HALF_DAY");
        assert_eq!("PRESENT".parse::<AttendanceStatus>().unwrap(), AttendanceStatus::Present);
    }

    #[test]
    fn test_check_out_rounds_hours_but_classifies_exact_value() {
        // 3h 59m 59s is 3.9997h: stored as 4.00, still a half day.
        let checkout = open_record().check_out_at(at(12, 59, 59)).unwrap();
        assert_eq!(checkout.work_hours, dec!(4.00));
        assert_eq!(checkout.status, AttendanceStatus::HalfDay);
    }

    #[test]
    fn test_check_out_full_day() {
        let checkout = open_record().check_out_at(at(17, 30, 0)).unwrap();
        assert_eq!(checkout.work_hours, dec!(8.50));
        assert_eq!(checkout.status, AttendanceStatus::Present);
    }

    #[test]
    fn test_check_out_rejects_equal_or_earlier_time() {
        let record = open_record();
        assert!(matches!(record.check_out_at(at(9, 0, 0)), Err(HrError::InvalidTimeOrder)));
        assert!(matches!(record.check_out_at(at(8, 0, 0)), Err(HrError::InvalidTimeOrder)));
    }

    #[test]
    fn test_check_out_twice_is_conflict() {
        let mut record = open_record();
        record.check_out = Some(at(18, 0, 0));
        assert!(matches!(record.check_out_at(at(19, 0, 0)), Err(HrError::AlreadyCheckedOut)));
    }

    #[test]
    fn test_attendance_percentage() {
        assert_eq!(attendance_percentage(20, 2, 31), dec!(67.74));
        assert_eq!(attendance_percentage(0, 0, 0), Decimal::ZERO);
        assert_eq!(attendance_percentage(30, 0, 30), dec!(100.00));
    }

    #[test]
    fn test_summary_ignores_open_records() {
        let mut present = open_record();
        present.status = Some(AttendanceStatus::Present);
        present.work_hours = dec!(8.25);
        let mut half = open_record();
        half.status = Some(AttendanceStatus::HalfDay);
        half.work_hours = dec!(3.10);
        let open = open_record();

        let summary =
            AttendanceSummary::from_records(10, 1, 2024, 31, dec!(60000), vec![present, half, open]);
        assert_eq!(summary.present_days, 1);
        assert_eq!(summary.half_days, 1);
        assert_eq!(summary.absent_days, 0);
        assert_eq!(summary.total_work_hours, dec!(11.35));
        assert_eq!(summary.attendance_percentage, dec!(4.84));
    }
}
