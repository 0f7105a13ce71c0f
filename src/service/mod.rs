//! The engine's operations.
//!
//! Each service is cheap to clone and owns only an `Arc<dyn HrStore>` plus
//! an `Arc<dyn Clock>`, so the same instance serves every request.

pub mod attendance;
pub mod leave;
pub mod payroll;

pub use attendance::AttendanceTracker;
pub use leave::LeaveLedger;
pub use payroll::{BulkPayrollRunner, PayrollCalculator};

use crate::error::{HrError, HrResult};

/// Fails with `Forbidden` when a caller is scoped to their own records and
/// `owner_id` is someone else.
pub(crate) fn ensure_owner(owner_id: u64, requesting_user: Option<u64>, what: &str) -> HrResult<()> {
    match requesting_user {
        Some(caller) if caller != owner_id => Err(HrError::forbidden(format!(
            "You can only access your own {what}"
        ))),
        _ => Ok(()),
    }
}
