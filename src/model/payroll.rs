use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::attendance::AttendanceSummary;
use super::round2;
use crate::error::{HrError, HrResult};

/// A payroll period: the `"YYYY-MM"` label paired with its numeric year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayrollMonth {
    first_day: NaiveDate,
}

impl PayrollMonth {
    /// Parses `label` as `YYYY-MM`; the label's year must equal `year`.
    pub fn parse(label: &str, year: i32) -> HrResult<Self> {
        let invalid = || HrError::InvalidMonth {
            month: label.to_string(),
            year,
        };

        let (label_year, label_month) = label.trim().split_once('-').ok_or_else(invalid)?;
        let digits = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(label_year, 4) || !digits(label_month, 2) {
            return Err(invalid());
        }
        let label_year: i32 = label_year.parse().map_err(|_| invalid())?;
        let month: u32 = label_month.parse().map_err(|_| invalid())?;

        if label_year != year {
            return Err(invalid());
        }
        Self::from_parts(month, year).ok_or_else(invalid)
    }

    /// Builds a period from a numeric month (1-12) and year.
    pub fn from_parts(month: u32, year: i32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first_day| Self { first_day })
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn label(&self) -> String {
        self.to_string()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        // Only December of the last representable year has no successor.
        self.first_day
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// Calendar days in the month.
    pub fn days(&self) -> u32 {
        self.last_day().day()
    }
}

impl fmt::Display for PayrollMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// The three derived salary figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalaryBreakdown {
    /// Rounded for display; the deduction uses the exact value.
    #[schema(value_type = String)]
    pub per_day_salary: Decimal,
    #[schema(value_type = String)]
    pub salary_deduction: Decimal,
    #[schema(value_type = String)]
    pub final_salary: Decimal,
}

impl SalaryBreakdown {
    /// `per_day = base / working_days`,
    /// `deduction = absent * per_day + half * 0.5 * per_day`,
    /// `final = base - deduction`.
    pub fn derive(base_salary: Decimal, working_days: u32, absent_days: u32, half_days: u32) -> Self {
        if working_days == 0 {
            return Self {
                per_day_salary: Decimal::ZERO,
                salary_deduction: Decimal::ZERO,
                final_salary: round2(base_salary),
            };
        }

        let per_day = base_salary / Decimal::from(working_days);
        let deduction = Decimal::from(absent_days) * per_day
            + Decimal::from(half_days) * Decimal::new(5, 1) * per_day;

        Self {
            per_day_salary: round2(per_day),
            salary_deduction: round2(deduction),
            final_salary: round2(base_salary - deduction),
        }
    }
}

/// A processed monthly salary. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalaryRecord {
    pub id: u64,
    pub user_id: u64,
    #[schema(example = "2024-01")]
    pub month: String,
    pub year: i32,
    #[schema(value_type = String)]
    pub base_salary: Decimal,
    pub working_days: u32,
    pub present_days: u32,
    pub half_days: u32,
    pub absent_days: u32,
    #[schema(value_type = String)]
    pub attendance_percentage: Decimal,
    #[schema(value_type = String)]
    pub salary_deduction: Decimal,
    #[schema(value_type = String)]
    pub final_salary: Decimal,
    pub is_processed: bool,
    #[schema(value_type = String, format = "date-time")]
    pub processed_at: DateTime<Utc>,
}

/// A salary record that has not been given an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSalaryRecord {
    pub user_id: u64,
    pub month: String,
    pub year: i32,
    pub base_salary: Decimal,
    pub working_days: u32,
    pub present_days: u32,
    pub half_days: u32,
    pub absent_days: u32,
    pub attendance_percentage: Decimal,
    pub salary_deduction: Decimal,
    pub final_salary: Decimal,
    pub processed_at: DateTime<Utc>,
}

impl NewSalaryRecord {
    pub fn from_summary(
        month: &PayrollMonth,
        summary: &AttendanceSummary,
        processed_at: DateTime<Utc>,
    ) -> Self {
        let breakdown = summary.salary;

        Self {
            user_id: summary.user_id,
            month: month.label(),
            year: month.year(),
            base_salary: summary.base_salary,
            working_days: summary.working_days,
            present_days: summary.present_days,
            half_days: summary.half_days,
            absent_days: summary.absent_days,
            attendance_percentage: summary.attendance_percentage,
            salary_deduction: breakdown.salary_deduction,
            final_salary: breakdown.final_salary,
            processed_at,
        }
    }

    pub fn with_id(self, id: u64) -> SalaryRecord {
        SalaryRecord {
            id,
            user_id: self.user_id,
            month: self.month,
            year: self.year,
            base_salary: self.base_salary,
            working_days: self.working_days,
            present_days: self.present_days,
            half_days: self.half_days,
            absent_days: self.absent_days,
            attendance_percentage: self.attendance_percentage,
            salary_deduction: self.salary_deduction,
            final_salary: self.final_salary,
            is_processed: true,
            processed_at: self.processed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkPayrollSuccess {
    pub user_id: u64,
    pub user_name: String,
    pub salary: SalaryRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkPayrollFailure {
    pub user_id: u64,
    pub user_name: String,
    pub error: String,
}

/// Outcome of a payroll run over every active user. Per-user failures are
/// reported here, not raised.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkPayrollReport {
    pub month: String,
    pub year: i32,
    pub total_users: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BulkPayrollSuccess>,
    pub errors: Vec<BulkPayrollFailure>,
}

/// One salary record joined with its owner's department.
#[derive(Debug, Clone, PartialEq)]
pub struct SalaryLine {
    pub user_id: u64,
    pub department: String,
    pub base_salary: Decimal,
    pub final_salary: Decimal,
    pub salary_deduction: Decimal,
    pub attendance_percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSalaryStats {
    pub department: String,
    pub employee_count: u64,
    #[schema(value_type = String)]
    pub total_base_salary: Decimal,
    #[schema(value_type = String)]
    pub total_final_salary: Decimal,
    #[schema(value_type = String)]
    pub total_deductions: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalarySummary {
    pub month: Option<String>,
    pub year: Option<i32>,
    pub total_records: u64,
    #[schema(value_type = String)]
    pub total_base_salary: Decimal,
    #[schema(value_type = String)]
    pub total_final_salary: Decimal,
    #[schema(value_type = String)]
    pub total_deductions: Decimal,
    #[schema(value_type = String)]
    pub average_attendance: Decimal,
    pub department_breakdown: Vec<DepartmentSalaryStats>,
}

impl SalarySummary {
    pub fn from_lines(month: Option<String>, year: Option<i32>, lines: &[SalaryLine]) -> Self {
        let mut departments: BTreeMap<&str, (Vec<u64>, DepartmentSalaryStats)> = BTreeMap::new();
        for line in lines {
            let (users, stats) = departments.entry(line.department.as_str()).or_insert_with(|| {
                (
                    Vec::new(),
                    DepartmentSalaryStats {
                        department: line.department.clone(),
                        employee_count: 0,
                        total_base_salary: Decimal::ZERO,
                        total_final_salary: Decimal::ZERO,
                        total_deductions: Decimal::ZERO,
                    },
                )
            });
            if !users.contains(&line.user_id) {
                users.push(line.user_id);
                stats.employee_count += 1;
            }
            stats.total_base_salary += line.base_salary;
            stats.total_final_salary += line.final_salary;
            stats.total_deductions += line.salary_deduction;
        }

        let total_records = lines.len() as u64;
        let sum = |f: fn(&SalaryLine) -> Decimal| round2(lines.iter().map(f).sum());
        let average_attendance = if lines.is_empty() {
            Decimal::ZERO
        } else {
            round2(
                lines.iter().map(|l| l.attendance_percentage).sum::<Decimal>()
                    / Decimal::from(total_records),
            )
        };

        Self {
            month,
            year,
            total_records,
            total_base_salary: sum(|l| l.base_salary),
            total_final_salary: sum(|l| l.final_salary),
            total_deductions: sum(|l| l.salary_deduction),
            average_attendance,
            department_breakdown: departments
                .into_values()
                .map(|(_, mut stats)| {
                    stats.total_base_salary = round2(stats.total_base_salary);
                    stats.total_final_salary = round2(stats.total_final_salary);
                    stats.total_deductions = round2(stats.total_deductions);
                    stats
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_month_label() {
        let month = PayrollMonth::parse("2024-02", 2024).unwrap();
        assert_eq!(month.month(), 2);
        assert_eq!(month.days(), 29);
        assert_eq!(month.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(month.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(month.label(), "2024-02");
    }

    #[test]
    fn test_month_lengths_follow_the_calendar() {
        for (label, year, days) in [("2023-02", 2023, 28), ("2000-02", 2000, 29), ("1900-02", 1900, 28), ("2024-04", 2024, 30)] {
            assert_eq!(PayrollMonth::parse(label, year).unwrap().days(), days, "{label}");
        }
    }

    #[test]
    fn test_december_rolls_over() {
        let month = PayrollMonth::parse("2023-12", 2023).unwrap();
        assert_eq!(month.days(), 31);
        assert_eq!(month.last_day(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn test_parse_rejects_bad_labels() {
        for label in ["2024-13", "2024-00", "2024-1", "24-01", "january", "2024/01", "2023-01", "2024-+1", "+024-01"] {
            assert!(
                matches!(PayrollMonth::parse(label, 2024), Err(HrError::InvalidMonth { .. })),
                "{label} should be rejected"
            );
        }
    }

    #[test]
    fn test_breakdown_matches_worked_example() {
        let breakdown = SalaryBreakdown::derive(dec!(60000), 31, 2, 1);
        assert_eq!(breakdown.per_day_salary, dec!(1935.48));
        assert_eq!(breakdown.salary_deduction, dec!(4838.71));
        assert_eq!(breakdown.final_salary, dec!(55161.29));
    }

    #[test]
    fn test_breakdown_without_absences_pays_base() {
        let breakdown = SalaryBreakdown::derive(dec!(55000), 30, 0, 0);
        assert_eq!(breakdown.salary_deduction, dec!(0));
        assert_eq!(breakdown.final_salary, dec!(55000));
    }

    #[test]
    fn test_summary_groups_by_department() {
        let line = |user_id, department: &str, base, deduction, attendance| SalaryLine {
            user_id,
            department: department.to_string(),
            base_salary: base,
            final_salary: base - deduction,
            salary_deduction: deduction,
            attendance_percentage: attendance,
        };
        let lines = vec![
            line(1, "Engineering", dec!(60000), dec!(4838.71), dec!(90.32)),
            line(2, "Engineering", dec!(65000), dec!(0), dec!(100)),
            line(3, "Finance", dec!(62000), dec!(2000), dec!(93.55)),
        ];

        let summary = SalarySummary::from_lines(Some("2024-01".into()), Some(2024), &lines);
        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.total_base_salary, dec!(187000));
        assert_eq!(summary.total_deductions, dec!(6838.71));
        assert_eq!(summary.average_attendance, dec!(94.62));
        assert_eq!(summary.department_breakdown.len(), 2);
        assert_eq!(summary.department_breakdown[0].department, "Engineering");
        assert_eq!(summary.department_breakdown[0].employee_count, 2);
    }

    #[test]
    fn test_empty_summary() {
        let summary = SalarySummary::from_lines(None, None, &[]);
        assert_eq!(summary.total_records, 0);
        assert_eq!(summary.average_attendance, Decimal::ZERO);
    }
}
