use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::{HrError, HrResult};

/// Shortest reason accepted on a leave request.
pub const MIN_REASON_LEN: usize = 10;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    /// Reached by deleting a pending request; never stored.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: u64,
    pub user_id: u64,
    #[schema(value_type = String, format = "date", example = "2024-01-15")]
    pub from_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2024-01-17")]
    pub to_date: NaiveDate,
    pub total_days: i32,
    pub reason: String,
    pub paid_days: i32,
    pub unpaid_days: i32,
    pub status: LeaveStatus,
    pub approved_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Days covered by `[from, to]`, both ends included.
pub fn inclusive_days(from: NaiveDate, to: NaiveDate) -> i32 {
    ((to - from).num_days() + 1) as i32
}

/// Splits a request against the balance known at the time:
/// `paid = min(total, max(balance, 0))`, the rest unpaid.
pub fn split_against_balance(total_days: i32, balance: i32) -> (i32, i32) {
    let paid = total_days.min(balance.max(0));
    (paid, total_days - paid)
}

/// A validated leave submission, before the balance split.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveDraft {
    pub user_id: u64,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub total_days: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl LeaveDraft {
    pub fn new(
        user_id: u64,
        from_date: NaiveDate,
        to_date: NaiveDate,
        reason: &str,
        created_at: DateTime<Utc>,
    ) -> HrResult<Self> {
        if to_date < from_date {
            return Err(HrError::InvalidDateRange);
        }
        let reason = reason.trim();
        if reason.chars().count() < MIN_REASON_LEN {
            return Err(HrError::validation(format!(
                "Reason must be at least {MIN_REASON_LEN} characters"
            )));
        }

        Ok(Self {
            user_id,
            from_date,
            to_date,
            total_days: inclusive_days(from_date, to_date),
            reason: reason.to_string(),
            created_at,
        })
    }

    /// The pending request this draft becomes once the balance is known.
    pub fn into_pending(self, id: u64, balance: i32) -> LeaveRequest {
        let (paid_days, unpaid_days) = split_against_balance(self.total_days, balance);
        LeaveRequest {
            id,
            user_id: self.user_id,
            from_date: self.from_date,
            to_date: self.to_date,
            total_days: self.total_days,
            reason: self.reason,
            paid_days,
            unpaid_days,
            status: LeaveStatus::Pending,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            created_at: self.created_at,
        }
    }
}

/// An administrator's verdict on a pending request.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveDecision {
    pub status: LeaveStatus,
    pub approver_id: u64,
    pub decided_at: DateTime<Utc>,
    pub rejection_reason: Option<String>,
}

/// Everything a decision writes: the leave row and the balance debit.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub status: LeaveStatus,
    pub approved_by: u64,
    pub approved_at: DateTime<Utc>,
    pub rejection_reason: Option<String>,
    pub paid_days: i32,
    pub unpaid_days: i32,
    pub balance_debit: i32,
}

impl LeaveRequest {
    /// Blocks `[from, to]` unless this request was rejected.
    pub fn overlaps(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.status != LeaveStatus::Rejected && self.from_date <= to && self.to_date >= from
    }

    /// Decides this request against the owner's balance as read inside the
    /// approval transaction.
    ///
    /// If the balance no longer covers `paid_days` (another request was
    /// approved since this one was created), the paid part shrinks to what
    /// is left, so the balance never goes negative.
    pub fn settle(&self, decision: &LeaveDecision, current_balance: i32) -> HrResult<Settlement> {
        if self.status != LeaveStatus::Pending {
            return Err(HrError::AlreadyProcessed);
        }

        match decision.status {
            LeaveStatus::Approved => {
                let (paid_days, unpaid_days) = if current_balance >= self.paid_days {
                    (self.paid_days, self.unpaid_days)
                } else {
                    tracing::warn!(
                        leave_id = self.id,
                        user_id = self.user_id,
                        paid_days = self.paid_days,
                        current_balance,
                        "Leave balance dropped below paid days; re-splitting at approval"
                    );
                    split_against_balance(self.total_days, current_balance.min(self.paid_days))
                };
                Ok(Settlement {
                    status: LeaveStatus::Approved,
                    approved_by: decision.approver_id,
                    approved_at: decision.decided_at,
                    rejection_reason: None,
                    paid_days,
                    unpaid_days,
                    balance_debit: paid_days,
                })
            }
            LeaveStatus::Rejected => {
                let reason = decision
                    .rejection_reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .ok_or(HrError::MissingRejectionReason)?;
                Ok(Settlement {
                    status: LeaveStatus::Rejected,
                    approved_by: decision.approver_id,
                    approved_at: decision.decided_at,
                    rejection_reason: Some(reason.to_string()),
                    paid_days: self.paid_days,
                    unpaid_days: self.unpaid_days,
                    balance_debit: 0,
                })
            }
            other => Err(HrError::validation(format!(
                "Decision must be APPROVED or REJECTED, got {other}"
            ))),
        }
    }

    pub fn apply(&mut self, settlement: &Settlement) {
        self.status = settlement.status;
        self.approved_by = Some(settlement.approved_by);
        self.approved_at = Some(settlement.approved_at);
        self.rejection_reason = settlement.rejection_reason.clone();
        self.paid_days = settlement.paid_days;
        self.unpaid_days = settlement.unpaid_days;
    }
}

/// Lifetime request counts for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveStatistics {
    pub total_leaves: u64,
    pub approved_leaves: u64,
    pub pending_leaves: u64,
    pub rejected_leaves: u64,
    /// Sum of `total_days` of approved requests starting in the current year.
    pub total_approved_days_this_year: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBalance {
    pub user_id: u64,
    pub name: String,
    pub current_balance: i32,
    pub statistics: LeaveStatistics,
}
