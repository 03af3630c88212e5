use serde::{Deserialize, Serialize};

use crate::constants::MAX_PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl PageRequest {
    pub fn new(limit: Option<i64>, offset: Option<i64>, default_limit: i64) -> Self {
        Self {
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    /// `base_url` is the absolute list url, possibly carrying other query parameters.
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page: PageRequest, base_url: &str) -> Self {
        let separator = if base_url.contains('?') { '&' } else { '?' };
        let link = |offset: i64| {
            format!(
                "{base_url}{separator}limit={}&offset={offset}",
                page.limit
            )
        };

        let next_offset = page.offset.saturating_add(page.limit);
        let next = (next_offset < total_rows).then(|| link(next_offset));
        let previous = (page.offset > 0).then(|| link(page.offset.saturating_sub(page.limit).max(0)));

        Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        }
    }

    pub fn map<U, F>(self, f: F) -> PageContext<U>
    where
        F: FnMut(T) -> U,
    {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
