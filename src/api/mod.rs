pub mod attendance;
pub mod leave_request;
pub mod payroll;
pub mod state;

pub use state::AppState;

use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::HrResult;
use crate::model::pagination::PageRequest;

/// `?page=&limit=` shared by every list endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number, default 1.
    pub page: Option<u32>,
    /// Page size, default 10, capped at 100.
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn to_request(&self) -> HrResult<PageRequest> {
        PageRequest::new(self.page, self.limit)
    }
}
