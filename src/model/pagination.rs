use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{HrError, HrResult};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// A validated page window. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Applies the defaults, rejects zero, and caps `limit` at [`MAX_LIMIT`].
    pub fn new(page: Option<u32>, limit: Option<u32>) -> HrResult<Self> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);

        if page == 0 {
            return Err(HrError::InvalidPagination {
                message: "page must be at least 1".to_string(),
            });
        }
        if limit == 0 {
            return Err(HrError::InvalidPagination {
                message: "limit must be at least 1".to_string(),
            });
        }

        Ok(Self {
            page,
            limit: limit.min(MAX_LIMIT),
        })
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            data,
            pagination: Pagination {
                total,
                page: request.page,
                limit: request.limit,
                total_pages: total.div_ceil(request.limit as u64),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(PageRequest::new(None, None).unwrap(), PageRequest { page: 1, limit: 10 });
    }

    #[test]
    fn test_zero_is_rejected() {
        assert!(matches!(PageRequest::new(Some(0), None), Err(HrError::InvalidPagination { .. })));
        assert!(matches!(PageRequest::new(None, Some(0)), Err(HrError::InvalidPagination { .. })));
    }

    #[test]
    fn test_limit_is_capped() {
        assert_eq!(PageRequest::new(Some(2), Some(500)).unwrap().limit, MAX_LIMIT);
    }

    #[test]
    fn test_offset_and_total_pages() {
        let request = PageRequest::new(Some(3), Some(10)).unwrap();
        assert_eq!(request.offset(), 20);

        let page = Paginated::new(vec![1, 2, 3], 21, request);
        assert_eq!(page.pagination.total_pages, 3);
        assert_eq!(Paginated::<u8>::new(vec![], 0, request).pagination.total_pages, 0);
        assert_eq!(Paginated::<u8>::new(vec![], 20, request).pagination.total_pages, 2);
    }
}
