//! Filtering and fixed-size windowing over a report snapshot.
//!
//! Pure functions: the same snapshot always yields the same pages.

use crate::reports::cache::CachedReport;
use serde::Serialize;

pub use crate::core::config::DEFAULT_PAGE_SIZE;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

/// Keep entries whose archive flag equals `archived`, ordered by id ascending.
pub fn filter_and_sort(entries: Vec<CachedReport>, archived: bool) -> Vec<CachedReport> {
    let mut out: Vec<CachedReport> = entries
        .into_iter()
        .filter(|e| e.report.archived == archived)
        .collect();
    out.sort_by_key(|e| e.report.id);
    out
}

/// Slice `items` into page `page_number` of `page_size` items. The page number
/// is clamped into range, and an empty list still has exactly one page.
pub fn paginate<T: Clone>(items: &[T], page_number: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let current_page = page_number.clamp(1, total_pages);
    let start = (current_page - 1) * page_size;
    let end = (current_page * page_size).min(total_items);

    Page {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        current_page,
        total_pages,
        total_items,
    }
}
