//! # Pagination
//!
//! Per-page normalization, page validation and slice boundaries for search
//! results.

use crate::domain::errors::QueryError;

/// Results per page when none (or a non-positive value) is requested.
pub const DEFAULT_PER_PAGE: usize = 30;

/// Upper bound on results per page.
pub const MAX_PER_PAGE: usize = 100;

/// Normalize a requested per-page value into `[1, MAX_PER_PAGE]`.
#[must_use]
pub fn normalize_per_page(requested: Option<i64>) -> usize {
    match requested {
        None => DEFAULT_PER_PAGE,
        Some(n) if n < 1 => DEFAULT_PER_PAGE,
        Some(n) => usize::try_from(n).map_or(MAX_PER_PAGE, |n| n.min(MAX_PER_PAGE)),
    }
}

/// Number of pages for `total` results; an empty set still has one page.
#[must_use]
pub fn page_count(per_page: usize, total: usize) -> usize {
    total.div_ceil(per_page).max(1)
}

/// Validate a requested page against the result set size.
///
/// # Panics
///
/// If `per_page` is zero. Callers normalize it first.
pub fn resolve_page(
    requested: Option<i64>,
    per_page: usize,
    total: usize,
) -> Result<usize, QueryError> {
    assert!(per_page >= 1, "zero per_page passed to resolve_page");

    let Some(page) = requested else {
        return Ok(1);
    };
    let pages = page_count(per_page, total);
    match usize::try_from(page) {
        Ok(p) if (1..=pages).contains(&p) => Ok(p),
        _ => Err(QueryError::PageOutOfRange { page, pages }),
    }
}

/// Results to skip before `page`.
#[must_use]
pub fn compute_skip(page: usize, per_page: usize) -> usize {
    page.saturating_sub(1).saturating_mul(per_page)
}

/// Length of the page slice starting at `skip`.
#[must_use]
pub fn page_len(total: usize, skip: usize, per_page: usize) -> usize {
    per_page.min(total.saturating_sub(skip))
}
