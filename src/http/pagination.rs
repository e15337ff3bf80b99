//! Query-string pagination and the listing envelope.
//!
//! Parameters arrive as strings and fall back to defaults when absent or
//! unparseable; `limit` is capped at 100.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl PaginationParams {
    pub fn normalize(&self) -> Pagination {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.parse::<i64>().ok())
            .unwrap_or(1)
            .max(1);
        let limit = self
            .limit
            .as_deref()
            .and_then(|l| l.parse::<i64>().ok())
            .unwrap_or(10)
            .clamp(1, 100);
        Pagination { page, limit }
    }
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: &Pagination) -> Self {
        Self {
            data,
            pagination: PageInfo {
                total,
                page: page.page,
                limit: page.limit,
                total_pages: (total + page.limit - 1) / page.limit,
                has_next: page.page * page.limit < total,
                has_prev: page.page > 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, limit: Option<&str>) -> PaginationParams {
        PaginationParams {
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn defaults_and_clamping() {
        let p = params(None, None).normalize();
        assert_eq!((p.page, p.limit), (1, 10));

        let p = params(Some("0"), Some("1000")).normalize();
        assert_eq!((p.page, p.limit), (1, 100));

        let p = params(Some("-3"), Some("0")).normalize();
        assert_eq!((p.page, p.limit), (1, 1));

        let p = params(Some("abc"), Some("x")).normalize();
        assert_eq!((p.page, p.limit), (1, 10));

        let p = params(Some("3"), Some("25")).normalize();
        assert_eq!((p.page, p.limit), (3, 25));
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn envelope_math() {
        let page = params(Some("2"), Some("10")).normalize();
        let envuelto = Paginated::new(vec![1, 2, 3], 23, &page);
        assert_eq!(envuelto.pagination.total, 23);
        assert_eq!(envuelto.pagination.total_pages, 3);
        assert!(envuelto.pagination.has_next);
        assert!(envuelto.pagination.has_prev);

        let page = params(Some("3"), Some("10")).normalize();
        let envuelto = Paginated::new(vec![1, 2, 3], 23, &page);
        assert!(!envuelto.pagination.has_next);

        let page = params(None, None).normalize();
        let envuelto: Paginated<i32> = Paginated::new(vec![], 0, &page);
        assert_eq!(envuelto.pagination.total_pages, 0);
        assert!(!envuelto.pagination.has_next);
        assert!(!envuelto.pagination.has_prev);
    }
}
