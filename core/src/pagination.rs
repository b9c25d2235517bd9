//! Pagination controller.
//!
//! Drives an injected page-fetch function until a target count of
//! deduplicated entities is reached or the stop heuristics fire. LinkedIn
//! list endpoints repeat boundary entries across pages and sometimes
//! return transiently empty pages, so "no progress" and "no data" are
//! tracked separately, and a computed iteration bound guarantees
//! termination even when upstream misbehaves.

use std::collections::HashSet;

use tracing::debug;

use crate::error::Result;

/// Consecutive pages with zero new entities (while something has already
/// been collected) before the list is considered exhausted.
pub const MAX_STALL_PAGES: u32 = 3;

/// Consecutive entirely-empty pages tolerated before giving up, for
/// formats prone to transient empties. The cursor keeps advancing
/// speculatively during this window instead of retrying the same offset.
pub const MAX_EMPTY_SEARCH_PAGES: u32 = 4;

/// Iteration floor: even tiny targets get a few pages of slack.
const MIN_ITERATIONS: usize = 8;

/// Iteration cap for unbounded ("fetch until exhausted") calls.
const UNBOUNDED_ITERATIONS: usize = 200;

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    /// Zero-based page number.
    pub page: usize,
    /// Entity offset to request.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub fetched: usize,
    pub page: usize,
    pub target: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct PaginateOptions {
    /// `None` means fetch until exhausted.
    pub target: Option<usize>,
    /// Estimated page size, used for offsets and the iteration bound.
    pub page_size: usize,
    /// Extend the empty-page window to [`MAX_EMPTY_SEARCH_PAGES`].
    pub tolerate_empty_pages: bool,
}

impl Default for PaginateOptions {
    fn default() -> Self {
        Self {
            target: None,
            page_size: 50,
            tolerate_empty_pages: false,
        }
    }
}

/// Accumulate deduplicated entities across pages.
///
/// `key` is the cross-page dedup key (username, or another natural key
/// when the handle is absent). Fetch errors always propagate, first page
/// or later; a page that merely parses to nothing is a heuristic signal,
/// not an error.
pub async fn paginate<T, K, F, Fut>(
    opts: &PaginateOptions,
    key: K,
    progress: Option<&(dyn Fn(Progress) + Send + Sync)>,
    mut fetch_page: F,
) -> Result<Vec<T>>
where
    K: Fn(&T) -> String,
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let page_size = opts.page_size.max(1);
    let bound = iteration_bound(opts.target, page_size);
    let mut collected: Vec<T> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut offset = 0usize;
    let mut stall_pages = 0u32;
    let mut empty_pages = 0u32;

    for page in 0..bound {
        let batch = fetch_page(PageRequest { page, offset }).await?;
        let batch_len = batch.len();

        let mut new_entities = 0usize;
        for entity in batch {
            if opts.target.is_some_and(|t| collected.len() >= t) {
                break;
            }
            if seen.insert(key(&entity)) {
                collected.push(entity);
                new_entities += 1;
            }
        }

        if let Some(report) = progress {
            report(Progress {
                fetched: collected.len(),
                page,
                target: opts.target,
            });
        }
        debug!(page, batch_len, new_entities, total = collected.len(), "page processed");

        if opts.target.is_some_and(|t| collected.len() >= t) {
            break;
        }

        if batch_len == 0 {
            empty_pages += 1;
            let window = if opts.tolerate_empty_pages {
                MAX_EMPTY_SEARCH_PAGES
            } else {
                1
            };
            if empty_pages >= window && collected.is_empty() {
                debug!(empty_pages, "upstream returned nothing, giving up");
                break;
            }
        } else {
            empty_pages = 0;
        }

        if new_entities == 0 && !collected.is_empty() {
            stall_pages += 1;
            if stall_pages >= MAX_STALL_PAGES {
                debug!(stall_pages, "no new entities for several pages, stopping");
                break;
            }
        } else if new_entities > 0 {
            stall_pages = 0;
        }

        // Advance speculatively on empty pages rather than retrying the
        // same offset.
        offset += if batch_len == 0 { page_size } else { batch_len };
    }

    if let Some(target) = opts.target {
        collected.truncate(target);
    }
    Ok(collected)
}

/// Termination bound: target divided by the page-size estimate with slack,
/// floored so small targets are not starved by duplicate-heavy pages.
fn iteration_bound(target: Option<usize>, page_size: usize) -> usize {
    match target {
        Some(t) => MIN_ITERATIONS.max(t.div_ceil(page_size).saturating_mul(3)),
        None => UNBOUNDED_ITERATIONS,
    }
}
