//! Lazy, page-aware document queries.
//!
//! A [`DocumentCursor`] fetches one page of documents at a time and hands
//! them out one by one as [`QueryItem`]s. While holding an item the consumer
//! may stop the whole query or abandon the rest of the current page.
//!
//! # Example
//!
//! ```rust,ignore
//! use awdb_core::{Query, QueryOptions};
//!
//! let options = QueryOptions::default()
//!     .with_query(Query::equal("status", "archived"))
//!     .with_items_per_page(50);
//!
//! let mut cursor = collection.query(options)?;
//! while let Some(item) = cursor.next().await? {
//!     if item.document.get("keep").is_some() {
//!         cursor.cancel();
//!     }
//! }
//! ```

use std::fmt;

use futures::Stream;

use crate::{Collection, Document, Query, Result, TRACING_TARGET_QUERY};

/// Page size used when [`QueryOptions::items_per_page`] is not set.
pub const DEFAULT_ITEMS_PER_PAGE: u32 = 25;

/// Filters and paging of a document query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Filter, order and projection clauses, sent with every page.
    pub queries: Vec<Query>,
    /// Page size; [`DEFAULT_ITEMS_PER_PAGE`] when unset.
    pub items_per_page: Option<u32>,
    /// Offset clause, sent with every page.
    pub offset: Option<u32>,
}

impl QueryOptions {
    /// Adds a query clause.
    #[must_use]
    pub fn with_query(mut self, query: Query) -> Self {
        self.queries.push(query);
        self
    }

    /// Adds several query clauses.
    #[must_use]
    pub fn with_queries(mut self, queries: impl IntoIterator<Item = Query>) -> Self {
        self.queries.extend(queries);
        self
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_items_per_page(mut self, items_per_page: u32) -> Self {
        self.items_per_page = Some(items_per_page);
        self
    }

    /// Sets the offset clause sent with every page.
    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns the page size, using the default if unset or zero.
    pub fn effective_items_per_page(&self) -> u32 {
        match self.items_per_page {
            Some(0) | None => DEFAULT_ITEMS_PER_PAGE,
            Some(items_per_page) => items_per_page,
        }
    }
}

/// What the cursor does after the item currently held by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryControl {
    /// Yield the next item.
    #[default]
    Continue,
    /// Drop the rest of the current page and continue with the next page.
    SkipPage,
    /// End the query.
    Cancel,
}

/// A document yielded by a [`DocumentCursor`], with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryItem {
    /// The matching document.
    pub document: Document,
    /// Zero-based index among all yielded items.
    pub index: u64,
    /// Total number of matching documents, as reported with the current page.
    ///
    /// Documents added or removed while the query runs make this value drift
    /// from one page to the next.
    pub count: u64,
    /// One-based page number.
    pub page: u32,
    /// Zero-based page number.
    pub page_index: u32,
    /// Requested page size.
    pub items_per_page: u32,
    /// Number of documents on the current page.
    pub page_count: usize,
}

/// Pull-based cursor over the documents matching a query.
///
/// Suspends once per page fetch and never between items of the same page.
/// The cursor is single-pass; create a new one to run the query again.
pub struct DocumentCursor<'a> {
    collection: &'a Collection,
    options: QueryOptions,
    items_per_page: u32,
    buffer: std::vec::IntoIter<Document>,
    last_id: Option<String>,
    page: u32,
    page_count: usize,
    count: u64,
    yielded: u64,
    last_page: bool,
    finished: bool,
    holding: bool,
    control: QueryControl,
}

impl fmt::Debug for DocumentCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCursor")
            .field("collection_id", &self.collection.id())
            .field("options", &self.options)
            .field("page", &self.page)
            .field("yielded", &self.yielded)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl<'a> DocumentCursor<'a> {
    pub(crate) fn new(collection: &'a Collection, options: QueryOptions) -> Self {
        Self {
            collection,
            items_per_page: options.effective_items_per_page(),
            options,
            buffer: Vec::new().into_iter(),
            last_id: None,
            page: 0,
            page_count: 0,
            count: 0,
            yielded: 0,
            last_page: false,
            finished: false,
            holding: false,
            control: QueryControl::Continue,
        }
    }

    /// Returns `true` once the cursor has ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Ends the query after the item currently held.
    pub fn cancel(&mut self) {
        self.set_cancel(true);
    }

    /// Sets or clears the cancel request for the item currently held.
    pub fn set_cancel(&mut self, flag: bool) {
        if flag {
            self.control(QueryControl::Cancel);
        } else if self.control == QueryControl::Cancel {
            self.control = QueryControl::Continue;
        }
    }

    /// Drops the rest of the current page after the item currently held.
    pub fn skip(&mut self) {
        self.set_skip(true);
    }

    /// Sets or clears the skip request for the item currently held.
    pub fn set_skip(&mut self, flag: bool) {
        if flag {
            self.control(QueryControl::SkipPage);
        } else if self.control == QueryControl::SkipPage {
            self.control = QueryControl::Continue;
        }
    }

    /// Records what to do after the item currently held.
    ///
    /// Has no effect when no item is held. A pending cancel is never
    /// downgraded to a skip.
    pub fn control(&mut self, control: QueryControl) {
        if !self.holding {
            return;
        }

        if self.control != QueryControl::Cancel || control == QueryControl::Cancel {
            self.control = control;
        }
    }

    /// Applies `control` to the item currently held, then pulls the next one.
    pub async fn advance(&mut self, control: QueryControl) -> Result<Option<QueryItem>> {
        self.control(control);
        self.next().await
    }

    /// Returns the next item, fetching a page when the current one is used up.
    ///
    /// Returns `Ok(None)` once the query has ended. A failed fetch ends the
    /// cursor as well.
    pub async fn next(&mut self) -> Result<Option<QueryItem>> {
        if self.finished {
            return Ok(None);
        }

        if self.holding {
            self.holding = false;
            match std::mem::take(&mut self.control) {
                QueryControl::Continue => {}
                QueryControl::SkipPage => {
                    tracing::trace!(
                        target: TRACING_TARGET_QUERY,
                        page = self.page,
                        dropped = self.buffer.len(),
                        "Skipping rest of page"
                    );
                    self.buffer = Vec::new().into_iter();
                }
                QueryControl::Cancel => {
                    tracing::debug!(
                        target: TRACING_TARGET_QUERY,
                        collection_id = %self.collection.id(),
                        yielded = self.yielded,
                        "Query cancelled"
                    );
                    self.finished = true;
                    return Ok(None);
                }
            }
        }

        loop {
            if let Some(document) = self.buffer.next() {
                let item = QueryItem {
                    document,
                    index: self.yielded,
                    count: self.count,
                    page: self.page,
                    page_index: self.page - 1,
                    items_per_page: self.items_per_page,
                    page_count: self.page_count,
                };

                self.yielded += 1;
                self.holding = true;
                return Ok(Some(item));
            }

            if self.last_page {
                self.finished = true;
                return Ok(None);
            }

            if let Err(error) = self.fetch_page().await {
                self.finished = true;
                return Err(error);
            }
        }
    }

    /// Builds the clauses of the next page: cursor, filters, offset, limit.
    fn page_queries(&self) -> Vec<Query> {
        let mut queries = Vec::with_capacity(self.options.queries.len() + 3);
        if let Some(last_id) = &self.last_id {
            queries.push(Query::cursor_after(last_id.as_str()));
        }

        queries.extend(self.options.queries.iter().cloned());
        if let Some(offset) = self.options.offset {
            queries.push(Query::offset(offset));
        }

        queries.push(Query::limit(self.items_per_page));
        queries
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let collection = self.collection;
        let page = collection
            .api()
            .list_documents(collection.database_id(), collection.id(), self.page_queries())
            .await?;

        self.page += 1;
        self.count = page.total;
        self.page_count = page.items.len();
        self.last_page = page.items.len() < self.items_per_page as usize;

        match page.items.last() {
            Some(document) => self.last_id = Some(document.id.clone()),
            None => self.last_page = true,
        }

        tracing::debug!(
            target: TRACING_TARGET_QUERY,
            collection_id = %collection.id(),
            page = self.page,
            fetched = self.page_count,
            total = self.count,
            "Fetched document page"
        );

        self.buffer = page.items.into_iter();
        Ok(())
    }

    /// Pulls every remaining item.
    pub async fn collect(mut self) -> Result<Vec<QueryItem>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }

        Ok(items)
    }

    /// Converts the cursor into a stream of items without controls.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<QueryItem>> + 'a {
        async_stream::try_stream! {
            while let Some(item) = self.next().await? {
                yield item;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::TryStreamExt;
    use serde_json::json;

    use super::*;
    use crate::collection::tests::{store, users};
    use crate::mock::{ApiCall, MemoryApi};

    const IDS: [&str; 7] = ["a", "b", "c", "d", "e", "f", "g"];

    fn seeded() -> Arc<MemoryApi> {
        let api = store();
        for (i, id) in IDS.iter().enumerate() {
            api.add_document("main", "users", id, json!({ "n": i, "even": i % 2 == 0 }));
        }
        api
    }

    fn ids(items: &[QueryItem]) -> Vec<&str> {
        items.iter().map(|item| item.document.id.as_str()).collect()
    }

    fn document_listings(api: &MemoryApi) -> Vec<ApiCall> {
        api.calls()
            .into_iter()
            .filter(ApiCall::is_list_documents)
            .collect()
    }

    #[tokio::test]
    async fn yields_every_document_with_position() {
        let api = seeded();
        let collection = users(&api).await;

        let options = QueryOptions::default().with_items_per_page(3);
        let items = collection.query(options).unwrap().collect().await.unwrap();

        assert_eq!(ids(&items), IDS);
        let indexes: Vec<_> = items.iter().map(|item| item.index).collect();
        assert_eq!(indexes, [0, 1, 2, 3, 4, 5, 6]);
        let pages: Vec<_> = items.iter().map(|item| item.page).collect();
        assert_eq!(pages, [1, 1, 1, 2, 2, 2, 3]);
        let page_counts: Vec<_> = items.iter().map(|item| item.page_count).collect();
        assert_eq!(page_counts, [3, 3, 3, 3, 3, 3, 1]);

        let last = &items[6];
        assert_eq!(last.page_index, 2);
        assert_eq!(last.count, 7);
        assert_eq!(last.items_per_page, 3);

        assert_eq!(document_listings(&api).len(), 3);
    }

    #[tokio::test]
    async fn pages_follow_the_last_document() {
        let api = seeded();
        let collection = users(&api).await;

        let options = QueryOptions::default()
            .with_query(Query::is_not_null("n"))
            .with_items_per_page(4);
        collection.query(options).unwrap().collect().await.unwrap();

        let listings = document_listings(&api);
        assert_eq!(
            listings[0].queries().unwrap(),
            [Query::is_not_null("n"), Query::limit(4)]
        );
        assert_eq!(
            listings[1].queries().unwrap(),
            [Query::cursor_after("d"), Query::is_not_null("n"), Query::limit(4)]
        );
    }

    #[tokio::test]
    async fn offset_is_sent_with_every_page() {
        let api = seeded();
        let collection = users(&api).await;

        let options = QueryOptions::default().with_items_per_page(2).with_offset(1);
        let items = collection.query(options).unwrap().collect().await.unwrap();

        assert_eq!(ids(&items), ["b", "c", "e", "f"]);
        for listing in document_listings(&api) {
            assert!(listing.queries().unwrap().contains(&Query::offset(1)));
        }
    }

    #[tokio::test]
    async fn cancel_stops_after_the_held_item() {
        let api = seeded();
        let collection = users(&api).await;

        for k in 0..IDS.len() as u64 {
            let mut cursor = collection
                .query(QueryOptions::default().with_items_per_page(3))
                .unwrap();

            let mut yielded = 0;
            while let Some(item) = cursor.next().await.unwrap() {
                yielded += 1;
                if item.index == k {
                    cursor.cancel();
                }
            }

            assert_eq!(yielded, k + 1);
            assert!(cursor.is_finished());
        }
    }

    #[tokio::test]
    async fn cancel_does_not_fetch_further_pages() {
        let api = seeded();
        let collection = users(&api).await;
        api.clear_calls();

        let mut cursor = collection
            .query(QueryOptions::default().with_items_per_page(3))
            .unwrap();
        cursor.next().await.unwrap();
        let item = cursor.advance(QueryControl::Cancel).await.unwrap();

        assert!(item.is_none());
        assert_eq!(document_listings(&api).len(), 1);
    }

    #[tokio::test]
    async fn skip_on_first_item_drops_the_page() {
        let api = seeded();
        let collection = users(&api).await;

        let mut cursor = collection
            .query(QueryOptions::default().with_items_per_page(3))
            .unwrap();

        let mut items = Vec::new();
        while let Some(item) = cursor.next().await.unwrap() {
            if item.page == 1 {
                cursor.skip();
            }
            items.push(item);
        }

        assert_eq!(ids(&items), ["a", "d", "e", "f", "g"]);
        assert_eq!(items[1].index, 1);
        assert_eq!(items[1].page, 2);

        let listings = document_listings(&api);
        assert_eq!(listings.len(), 3);
        assert_eq!(listings[1].queries().unwrap()[0], Query::cursor_after("c"));
    }

    #[tokio::test]
    async fn skip_on_last_item_changes_nothing() {
        let api = seeded();
        let collection = users(&api).await;

        let mut cursor = collection
            .query(QueryOptions::default().with_items_per_page(3))
            .unwrap();

        let mut items = Vec::new();
        while let Some(item) = cursor.next().await.unwrap() {
            if item.index as usize % 3 == item.page_count - 1 {
                cursor.skip();
            }
            items.push(item);
        }

        assert_eq!(ids(&items), IDS);
    }

    #[tokio::test]
    async fn explicit_false_keeps_controls_inactive() {
        let api = seeded();
        let collection = users(&api).await;

        let mut cursor = collection
            .query(QueryOptions::default().with_items_per_page(3))
            .unwrap();

        let mut yielded = 0;
        while cursor.next().await.unwrap().is_some() {
            yielded += 1;
            cursor.set_cancel(false);
            cursor.set_skip(false);
        }
        assert_eq!(yielded, 7);

        let mut cursor = collection.query(QueryOptions::default()).unwrap();
        cursor.next().await.unwrap();
        cursor.cancel();
        cursor.set_cancel(false);
        assert!(cursor.next().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cancel_wins_over_skip() {
        let api = seeded();
        let collection = users(&api).await;

        let mut cursor = collection
            .query(QueryOptions::default().with_items_per_page(3))
            .unwrap();
        cursor.next().await.unwrap();
        cursor.cancel();
        cursor.skip();
        assert!(cursor.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_result_fetches_once() {
        let api = store();
        let collection = users(&api).await;
        api.clear_calls();

        let mut cursor = collection.query(QueryOptions::default()).unwrap();
        assert!(cursor.next().await.unwrap().is_none());
        assert!(cursor.next().await.unwrap().is_none());
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn exact_multiple_fetches_a_final_empty_page() {
        let api = store();
        for id in ["a", "b", "c", "d"] {
            api.add_document("main", "users", id, json!({}));
        }
        let collection = users(&api).await;

        let options = QueryOptions::default().with_items_per_page(2);
        let items = collection.query(options).unwrap().collect().await.unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(document_listings(&api).len(), 3);
    }

    #[tokio::test]
    async fn failed_fetch_ends_the_cursor() {
        let api = seeded();
        let collection = users(&api).await;
        api.fail_when(|call| {
            call.queries()
                .is_some_and(|queries| queries.contains(&Query::cursor_after("c")))
        });

        let mut cursor = collection
            .query(QueryOptions::default().with_items_per_page(3))
            .unwrap();
        for _ in 0..3 {
            assert!(cursor.next().await.unwrap().is_some());
        }

        assert!(cursor.next().await.unwrap_err().is_transport());
        assert!(cursor.is_finished());
        assert!(cursor.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stream_adapter() {
        let api = seeded();
        let collection = users(&api).await;

        let options = QueryOptions::default()
            .with_query(Query::equal("even", true))
            .with_items_per_page(2);
        let items: Vec<_> = collection
            .query(options)
            .unwrap()
            .into_stream()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(ids(&items), ["a", "c", "e", "g"]);
        assert!(items.iter().all(|item| item.count == 4));
    }
}
