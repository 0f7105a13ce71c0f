use std::sync::Arc;

use mockable::Clock;

use crate::service::{AttendanceTracker, BulkPayrollRunner, LeaveLedger, PayrollCalculator};
use crate::store::HrStore;

/// Everything a handler needs, shared across workers through `web::Data`.
#[derive(Clone)]
pub struct AppState {
    pub attendance: AttendanceTracker,
    pub leaves: LeaveLedger,
    pub payroll: PayrollCalculator,
    pub bulk_payroll: BulkPayrollRunner,
}

impl AppState {
    pub fn new(store: Arc<dyn HrStore>, clock: Arc<dyn Clock>, payroll_concurrency: usize) -> Self {
        let payroll = PayrollCalculator::new(store.clone(), clock.clone());
        Self {
            attendance: AttendanceTracker::new(store.clone(), clock.clone()),
            leaves: LeaveLedger::new(store, clock),
            bulk_payroll: BulkPayrollRunner::new(payroll.clone(), payroll_concurrency),
            payroll,
        }
    }
}
