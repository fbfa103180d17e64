//! Page/offset pagination for the item list.

use serde::{Deserialize, Serialize};

/// Items per page when the query gives none.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on `per_page`.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A 1-based page request. Build it with [`Pagination::new`] or
/// [`Pagination::from_query`] so the bounds hold.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Clamps `page` to at least 1 and `per_page` to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn from_query(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self::new(page.unwrap_or(1), per_page.unwrap_or(DEFAULT_PAGE_SIZE))
    }

    /// Rows to skip. Computed in `u64`, so any `u32` page is representable.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }

    /// Number of pages for `total_items`; an empty result still has one page.
    pub fn total_pages(&self, total_items: u64) -> u32 {
        let pages = total_items.div_ceil(u64::from(self.per_page)).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

/// One page of results plus the counts a client needs to page further.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    /// Matching rows across all pages.
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: &Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            total_pages: pagination.total_pages(total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query_defaults_and_bounds() {
        let p = Pagination::from_query(None, None);
        assert_eq!((p.page, p.per_page), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(p.offset(), 0);

        let p = Pagination::from_query(Some(0), Some(0));
        assert_eq!((p.page, p.per_page), (1, 1));

        let p = Pagination::from_query(Some(4), Some(500));
        assert_eq!(p.per_page, MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 300);
        assert_eq!(p.limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_offset_of_last_page_does_not_overflow() {
        let p = Pagination::new(u32::MAX, MAX_PAGE_SIZE);
        assert_eq!(p.offset(), (u64::from(u32::MAX) - 1) * 100);

        let p = Pagination::new(50_000_000, 100);
        assert_eq!(p.offset(), 4_999_999_900);
    }

    #[test]
    fn test_total_pages() {
        let p = Pagination::new(1, 10);
        assert_eq!(p.total_pages(0), 1);
        assert_eq!(p.total_pages(10), 1);
        assert_eq!(p.total_pages(11), 2);
        assert_eq!(p.total_pages(101), 11);
    }

    #[test]
    fn test_paginated_result_copies_request() {
        let result = PaginatedResult::new(vec!["a", "b"], 13, &Pagination::new(3, 5));
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.page, 3);
        assert_eq!(result.per_page, 5);
        assert_eq!(result.total_pages, 3);
    }
}
