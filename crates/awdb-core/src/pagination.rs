//! Cursor pagination over listing endpoints.
//!
//! Listing endpoints return at most `limit` entries per call. [`paginate`]
//! walks them forward with an advancing cursor and accumulates every entry in
//! server order. It is used to materialize the child lists of the resource
//! tree; documents are paged lazily by [`DocumentCursor`](crate::DocumentCursor).

use std::future::Future;

use jiff::Timestamp;

use crate::{
    AttributeModel, CollectionModel, DatabaseModel, Document, IndexModel, ListPage, Query, Result,
    TRACING_TARGET_PAGINATION,
};

/// Page size used when listing databases.
pub const DATABASE_PAGE_SIZE: u32 = 25;

/// Page size used when listing collections, attributes and indexes.
pub const CHILD_PAGE_SIZE: u32 = 100;

/// A position in a listing, taken from the last entry of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// Entries listed after the entry with this ID.
    After(String),
    /// Entries created strictly after this instant.
    ///
    /// Attributes and indexes have no `$id`, so they page by creation time.
    CreatedAfter(Timestamp),
}

impl PageCursor {
    /// Converts the cursor into the query clause selecting the next page.
    pub fn to_query(&self) -> Query {
        match self {
            Self::After(id) => Query::cursor_after(id.as_str()),
            Self::CreatedAfter(created_at) => {
                Query::greater_than("$createdAt", created_at.to_string())
            }
        }
    }
}

/// Entries that can resume a listing after themselves.
pub trait Paginated {
    /// Returns the cursor selecting the entries after this one.
    ///
    /// `None` ends the pagination.
    fn page_cursor(&self) -> Option<PageCursor>;
}

impl Paginated for DatabaseModel {
    fn page_cursor(&self) -> Option<PageCursor> {
        Some(PageCursor::After(self.id.clone()))
    }
}

impl Paginated for CollectionModel {
    fn page_cursor(&self) -> Option<PageCursor> {
        Some(PageCursor::After(self.id.clone()))
    }
}

impl Paginated for AttributeModel {
    fn page_cursor(&self) -> Option<PageCursor> {
        self.created_at.map(PageCursor::CreatedAfter)
    }
}

impl Paginated for IndexModel {
    fn page_cursor(&self) -> Option<PageCursor> {
        self.created_at.map(PageCursor::CreatedAfter)
    }
}

impl Paginated for Document {
    fn page_cursor(&self) -> Option<PageCursor> {
        Some(PageCursor::After(self.id.clone()))
    }
}

/// Parameters of a single page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum number of entries to return.
    pub limit: u32,
    /// Cursor pointing to the last entry of the previous page.
    pub after: Option<PageCursor>,
}

impl PageRequest {
    /// Creates a request for the first page.
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            after: None,
        }
    }

    /// Creates a request for the page following the given cursor.
    pub fn after(limit: u32, cursor: PageCursor) -> Self {
        Self {
            limit: limit.max(1),
            after: Some(cursor),
        }
    }

    /// Checks if we have a cursor to paginate from.
    pub fn has_cursor(&self) -> bool {
        self.after.is_some()
    }

    /// Builds the paging clauses: the cursor clause (if any) followed by `limit`.
    pub fn to_queries(&self) -> Vec<Query> {
        let mut queries = Vec::with_capacity(2);
        if let Some(cursor) = &self.after {
            queries.push(cursor.to_query());
        }

        queries.push(Query::limit(self.limit));
        queries
    }
}

/// Fetches every page of a listing and returns all entries in server order.
///
/// Stops after a page shorter than `limit`, or when the last entry of a page
/// yields no cursor. Failures of `list_page` are returned unchanged and
/// discard the entries fetched so far.
pub async fn paginate<T, F, Fut>(limit: u32, mut list_page: F) -> Result<Vec<T>>
where
    T: Paginated,
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<ListPage<T>>>,
{
    let mut request = PageRequest::new(limit);
    let mut items = Vec::new();
    let mut pages = 0u32;

    loop {
        let page = list_page(request.clone()).await?;
        pages += 1;

        let fetched = page.items.len();
        let next = page.items.last().and_then(Paginated::page_cursor);
        items.extend(page.items);

        tracing::debug!(
            target: TRACING_TARGET_PAGINATION,
            page = pages,
            fetched,
            accumulated = items.len(),
            total = page.total,
            "Fetched listing page"
        );

        if fetched < request.limit as usize {
            break;
        }

        match next {
            Some(cursor) => request = PageRequest::after(request.limit, cursor),
            None => break,
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::Error;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(String);

    impl Paginated for Item {
        fn page_cursor(&self) -> Option<PageCursor> {
            Some(PageCursor::After(self.0.clone()))
        }
    }

    fn source(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item(format!("{i:04}"))).collect()
    }

    fn serve(items: &[Item], request: &PageRequest) -> ListPage<Item> {
        let start = match &request.after {
            Some(PageCursor::After(id)) => items
                .iter()
                .position(|item| &item.0 == id)
                .map_or(items.len(), |i| i + 1),
            _ => 0,
        };

        let page = items
            .iter()
            .skip(start)
            .take(request.limit as usize)
            .cloned()
            .collect();

        ListPage::new(items.len() as u64, page)
    }

    #[tokio::test]
    async fn returns_every_item_in_order() {
        for limit in 1..=5u32 {
            for n in 0..=12usize {
                let items = source(n);
                let calls = Cell::new(0usize);

                let result = paginate(limit, |request| {
                    calls.set(calls.get() + 1);
                    let page = serve(&items, &request);
                    async move { Ok(page) }
                })
                .await
                .unwrap();

                assert_eq!(result, items, "limit={limit} n={n}");

                // A short page ends the walk; an exact multiple needs one empty page more.
                let expected = n / limit as usize + 1;
                assert_eq!(calls.get(), expected, "limit={limit} n={n}");
                if n == 0 {
                    assert_eq!(calls.get(), 1);
                } else if n % limit as usize != 0 {
                    assert_eq!(calls.get(), n.div_ceil(limit as usize));
                }
            }
        }
    }

    #[tokio::test]
    async fn first_request_has_no_cursor() {
        let items = source(3);
        let mut requests = Vec::new();

        paginate(2, |request| {
            requests.push(request.clone());
            let page = serve(&items, &request);
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(requests.len(), 2);
        assert!(!requests[0].has_cursor());
        assert_eq!(requests[1].after, Some(PageCursor::After("0001".into())));
    }

    #[tokio::test]
    async fn failure_is_surfaced_unchanged() {
        let items = source(10);
        let mut calls = 0;

        let error = paginate(3, |request| {
            calls += 1;
            let result = if calls == 2 {
                Err(Error::transport().with_status(503))
            } else {
                Ok(serve(&items, &request))
            };
            async move { result }
        })
        .await
        .unwrap_err();

        assert!(error.is_transport());
        assert_eq!(error.status, Some(503));
        assert_eq!(calls, 2);
    }

    #[test]
    fn request_queries() {
        let request = PageRequest::new(0);
        assert_eq!(request.limit, 1);
        assert_eq!(request.to_queries(), vec![Query::limit(1)]);

        let created_at: Timestamp = "2024-03-01T10:00:00Z".parse().unwrap();
        let request = PageRequest::after(100, PageCursor::CreatedAfter(created_at));
        let queries = request.to_queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].attribute.as_deref(), Some("$createdAt"));
        assert_eq!(queries[0].first_str(), Some("2024-03-01T10:00:00Z"));
        assert_eq!(queries[1], Query::limit(100));
    }
}
