use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use mockable::Clock;

use super::ensure_owner;
use crate::error::{HrError, HrResult};
use crate::model::leave_request::{LeaveBalance, LeaveDecision, LeaveDraft, LeaveRequest, LeaveStatus};
use crate::model::pagination::{PageRequest, Paginated};
use crate::store::{HrStore, LeaveFilter};

/// Leave requests and the paid-leave balance they draw on.
///
/// Requests move `PENDING -> APPROVED | REJECTED | CANCELLED`; every target
/// state is terminal. Only approval touches the balance.
#[derive(Clone)]
pub struct LeaveLedger {
    store: Arc<dyn HrStore>,
    clock: Arc<dyn Clock>,
}

impl LeaveLedger {
    pub fn new(store: Arc<dyn HrStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create(
        &self,
        user_id: u64,
        from_date: NaiveDate,
        to_date: NaiveDate,
        reason: &str,
    ) -> HrResult<LeaveRequest> {
        let draft = LeaveDraft::new(user_id, from_date, to_date, reason, self.clock.utc())?;
        let leave = self.store.create_leave(draft).await?;

        tracing::info!(
            user_id,
            leave_id = leave.id,
            total_days = leave.total_days,
            paid_days = leave.paid_days,
            unpaid_days = leave.unpaid_days,
            "Leave requested"
        );
        Ok(leave)
    }

    /// `requesting_user` scopes the lookup to that user's own requests.
    pub async fn find_one(&self, leave_id: u64, requesting_user: Option<u64>) -> HrResult<LeaveRequest> {
        let leave = self
            .store
            .find_leave(leave_id)
            .await?
            .ok_or(HrError::LeaveNotFound { leave_id })?;
        ensure_owner(leave.user_id, requesting_user, "leave requests")?;
        Ok(leave)
    }

    pub async fn find_all(&self, page: PageRequest, filter: LeaveFilter) -> HrResult<Paginated<LeaveRequest>> {
        let (data, total) = self.store.list_leaves(&filter, page).await?;
        Ok(Paginated::new(data, total, page))
    }

    pub async fn approve(
        &self,
        leave_id: u64,
        approver_id: u64,
        decision: LeaveStatus,
        rejection_reason: Option<String>,
    ) -> HrResult<LeaveRequest> {
        if !matches!(decision, LeaveStatus::Approved | LeaveStatus::Rejected) {
            return Err(HrError::validation(format!(
                "Decision must be APPROVED or REJECTED, got {decision}"
            )));
        }

        let decision = LeaveDecision {
            status: decision,
            approver_id,
            decided_at: self.clock.utc(),
            rejection_reason,
        };
        let leave = self.store.settle_leave(leave_id, &decision).await?;

        tracing::info!(
            leave_id,
            approver_id,
            user_id = leave.user_id,
            status = %leave.status,
            paid_days = leave.paid_days,
            "Leave processed"
        );
        Ok(leave)
    }

    /// Withdraws a pending request. The row is deleted, which is what the
    /// CANCELLED state amounts to.
    pub async fn cancel(&self, leave_id: u64, requesting_user: Option<u64>) -> HrResult<()> {
        let leave = self.find_one(leave_id, requesting_user).await?;
        if leave.status != LeaveStatus::Pending {
            return Err(HrError::NotCancellable);
        }

        // Settled between the read and the delete.
        if !self.store.delete_pending_leave(leave_id).await? {
            return Err(HrError::NotCancellable);
        }

        tracing::info!(leave_id, user_id = leave.user_id, "Leave cancelled");
        Ok(())
    }

    pub async fn get_leave_balance(&self, user_id: u64) -> HrResult<LeaveBalance> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or(HrError::UserNotFound { user_id })?;
        let statistics = self
            .store
            .leave_statistics(user_id, self.clock.utc().year())
            .await?;

        Ok(LeaveBalance {
            user_id: user.id,
            name: user.name,
            current_balance: user.leave_balance,
            statistics,
        })
    }
}
