//! The list/pagination contract shared by every collection endpoint.
//!
//! Requests accept `page`, `limit`, `sortBy` and endpoint-specific filters as
//! query parameters; responses wrap items in `{ data, total, page, limit,
//! totalPages }`.

use serde::{Deserialize, Serialize};

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        Pagination { total: self.total, page: self.page, limit: self.limit, total_pages: self.total_pages }
    }
}

/// Pagination bookkeeping kept by list stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl Pagination {
    #[must_use]
    pub fn with_limit(limit: u32) -> Self {
        Self { total: 0, page: 1, limit, total_pages: 0 }
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Query parameters for a list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    /// Endpoint-specific filters, in insertion order.
    pub filters: Vec<(String, String)>,
}

impl ListParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>) -> Self {
        self.sort_by = Some(field.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push((key.into(), value.to_string()));
        self
    }

    #[must_use]
    pub fn filter_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.filter(key, v),
            None => self,
        }
    }

    /// Render as a URL query string without the leading `?`.
    ///
    /// Zero values for `page`/`limit` are omitted, matching how the web
    /// client skipped falsy parameters.
    #[must_use]
    pub fn to_query(&self) -> String {
        let mut pairs: Vec<(String, String)> = Vec::new();
        if let Some(page) = self.page.filter(|p| *p > 0) {
            pairs.push(("page".into(), page.to_string()));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            pairs.push(("limit".into(), limit.to_string()));
        }
        pairs.extend(self.filters.iter().cloned());
        if let Some(sort_by) = &self.sort_by {
            pairs.push(("sortBy".into(), sort_by.clone()));
        }
        encode_query(&pairs)
    }

    /// Append this query to `path`, adding `?` only when non-empty.
    #[must_use]
    pub fn apply(&self, path: &str) -> String {
        let query = self.to_query();
        if query.is_empty() { path.to_string() } else { format!("{path}?{query}") }
    }
}

/// Form-encode `pairs` as a query string.
pub(crate) fn encode_query(pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return String::new();
    }
    let Ok(mut url) = reqwest::Url::parse("http://query.invalid/") else {
        return String::new();
    };
    url.query_pairs_mut().extend_pairs(pairs);
    url.query().unwrap_or_default().to_string()
}

#[cfg(test)]
#[path = "page_test.rs"]
mod tests;
