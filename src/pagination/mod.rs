//! Page/limit pagination shared by list endpoints.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Paging request and result. `total` is filled in by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub total: i64,
}

impl Paging {
    pub fn new(page: i64, limit: i64) -> Self {
        let mut paging = Self {
            page,
            limit,
            total: 0,
        };
        paging.fulfill();
        paging
    }

    /// Replace non-positive page/limit with the defaults and cap the limit
    /// at [`MAX_LIMIT`].
    pub fn fulfill(&mut self) {
        if self.page <= 0 {
            self.page = DEFAULT_PAGE;
        }
        if self.limit <= 0 {
            self.limit = DEFAULT_LIMIT;
        }
        self.limit = self.limit.min(MAX_LIMIT);
    }

    /// Rows to skip. Saturates for pages far past the end.
    pub fn offset(&self) -> i64 {
        self.page
            .saturating_sub(1)
            .max(0)
            .saturating_mul(self.limit.max(0))
    }

    pub fn total_pages(&self) -> i64 {
        if self.total <= 0 || self.limit <= 0 {
            return 1;
        }
        self.total / self.limit + i64::from(self.total % self.limit != 0)
    }

    pub fn has_next(&self) -> bool {
        self.total > 0 && self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fulfill_defaults() {
        let mut paging = Paging {
            page: 0,
            limit: -5,
            total: 0,
        };
        paging.fulfill();
        assert_eq!(paging.page, 1);
        assert_eq!(paging.limit, 10);
        assert_eq!(paging.offset(), 0);
    }

    #[test]
    fn test_navigation() {
        let mut paging = Paging::new(2, 10);
        paging.total = 25;
        assert_eq!(paging.offset(), 10);
        assert_eq!(paging.total_pages(), 3);
        assert!(paging.has_next());
        assert!(paging.has_prev());

        paging.page = 3;
        assert!(!paging.has_next());
    }

    #[test]
    fn test_limit_is_capped() {
        let paging = Paging::new(1, 10_000);
        assert_eq!(paging.limit, MAX_LIMIT);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let mut paging = Paging::new(i64::MAX / 5, 10);
        assert_eq!(paging.offset(), i64::MAX);

        paging = Paging::new(i64::MAX, MAX_LIMIT);
        paging.total = i64::MAX;
        assert_eq!(paging.offset(), i64::MAX);
        assert_eq!(paging.total_pages(), i64::MAX / MAX_LIMIT + 1);
        assert!(!paging.has_next());
        assert!(paging.has_prev());
    }

    #[test]
    fn test_empty_result_has_one_page() {
        let paging = Paging::new(1, 10);
        assert_eq!(paging.total_pages(), 1);
        assert!(!paging.has_next());
        assert!(!paging.has_prev());
    }
}
