//! Shared DTO types used across multiple endpoints.

use serde::Serialize;
use utoipa::ToSchema;

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u32,
    /// Total number of pages.
    pub total_pages: u32,
}

pub(crate) fn default_page() -> u32 {
    1
}

pub(crate) fn default_per_page() -> u32 {
    20
}

/// Cuts one page out of `items`. `page` is 1-indexed and `per_page` is
/// clamped to `1..=100`.
#[must_use]
pub fn paginate<T>(items: Vec<T>, page: u32, per_page: u32) -> (Vec<T>, PaginationMeta) {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let total = u32::try_from(items.len()).unwrap_or(u32::MAX);
    let total_pages = total.div_ceil(per_page);
    let start = usize::try_from((page - 1).saturating_mul(per_page)).unwrap_or(usize::MAX);
    let data = items
        .into_iter()
        .skip(start)
        .take(usize::try_from(per_page).unwrap_or(usize::MAX))
        .collect();
    (
        data,
        PaginationMeta {
            page,
            per_page,
            total,
            total_pages,
        },
    )
}
