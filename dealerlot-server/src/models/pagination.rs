//! Pagination types shared by listing endpoints

use serde::{Deserialize, Serialize};

/// Maximum items per page
const MAX_LIMIT: u32 = 100;

/// Default items per page
pub const DEFAULT_LIMIT: u32 = 20;

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items per page (max 100)
    pub limit: u32,
}

impl Pagination {
    /// Create pagination with validation.
    ///
    /// - Page is clamped to minimum of 1
    /// - Limit is clamped to 1..=100
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Build from query parameters with an endpoint-specific default limit
    pub fn from_params(params: &PaginationParams, default_limit: u32) -> Self {
        Self::new(
            params.page.unwrap_or(1),
            params.limit.unwrap_or(default_limit),
        )
    }

    /// Calculate SQL OFFSET value.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One page of results plus the total across all pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Paginated<T> {
    /// Total number of pages; zero when there are no items.
    pub fn total_pages(&self) -> u32 {
        if self.total <= 0 {
            0
        } else {
            let pages = self.total.unsigned_abs().div_ceil(u64::from(self.limit.max(1)));
            u32::try_from(pages).unwrap_or(u32::MAX)
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// False for an empty result set regardless of page.
    pub fn has_prev(&self) -> bool {
        self.total > 0 && self.page > 1
    }
}

/// Query parameters for pagination
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
