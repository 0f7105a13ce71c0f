pub mod attendance;
pub mod leave_request;
pub mod pagination;
pub mod payroll;
pub mod role;
pub mod user;

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to 2 decimal places, halves away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
