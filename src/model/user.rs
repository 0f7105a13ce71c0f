use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::role::Role;

/// An employee or administrator. Only `leave_balance` is written by this
/// crate, and only through leave approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: String,
    /// Monthly base salary.
    #[schema(value_type = String, example = "60000.00")]
    pub base_salary: Decimal,
    /// Remaining paid leave, in days.
    pub leave_balance: i32,
    pub is_active: bool,
}
