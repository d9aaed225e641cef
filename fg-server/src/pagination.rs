use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 6;
pub const MAX_LIMIT: i64 = 100;

/// `?page=&limit=` query parameters. Pages count from 1.
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Saturates for absurd page numbers, which then simply read past the end.
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }

    /// Wrap one page of results, given how many there are in total.
    pub fn wrap<T>(&self, results: Vec<T>, count: i64) -> Page<T> {
        let page = self.page();
        Page {
            count,
            next: (page.saturating_mul(self.limit()) < count).then_some(page + 1),
            previous: (page > 1).then_some(page - 1),
            results,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_bounds() {
        let p = Pagination::default();
        assert_eq!((p.page(), p.limit(), p.offset()), (1, 6, 0));
        let p = Pagination {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!((p.page(), p.limit()), (1, 100));
        let p = Pagination {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(p.offset(), 20);
    }

    #[test]
    fn neighbours_exist_only_when_there_is_something_there() {
        let p = Pagination {
            page: Some(2),
            limit: Some(2),
        };
        let page = p.wrap(vec![3, 4], 5);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));

        let last = Pagination {
            page: Some(3),
            limit: Some(2),
        }
        .wrap(vec![5], 5);
        assert_eq!(last.next, None);

        let only = Pagination::default().wrap(Vec::<i64>::new(), 0);
        assert_eq!((only.next, only.previous), (None, None));
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let p = Pagination {
            page: Some(i64::MAX),
            limit: Some(MAX_LIMIT),
        };
        assert_eq!(p.offset(), i64::MAX);
        let page = p.wrap(Vec::<i64>::new(), 12);
        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(i64::MAX - 1));
    }
}
