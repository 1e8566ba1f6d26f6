//! Offset and cursor pagination

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Requested page; out-of-range values are clamped rather than rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, limit: usize) -> Self {
        Self { page, limit }.clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Slice an already-ordered result set
    pub fn paginate<T>(self, items: impl IntoIterator<Item = T>) -> Page<T> {
        let req = self.clamped();
        let all: Vec<T> = items.into_iter().collect();
        let total = all.len();
        let items: Vec<T> = all.into_iter().skip(req.offset()).take(req.limit).collect();
        Page {
            has_more: req.offset().saturating_add(items.len()) < total,
            items,
            page: req.page,
            limit: req.limit,
            total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
            has_more: self.has_more,
        }
    }
}

/// Newest-first page keyed by an opaque cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPage<T, C> {
    pub items: Vec<T>,
    /// Pass back as `before` to fetch the next (older) page
    pub next_cursor: Option<C>,
}
