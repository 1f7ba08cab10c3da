//! The seam between the resource tree and the remote database API.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    AttributeModel, CollectionModel, DatabaseModel, Document, IndexModel, Query, Result,
};

/// One page of a listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<T> {
    /// Total number of entries matching the filters, ignoring paging clauses.
    pub total: u64,
    /// Entries of this page.
    pub items: Vec<T>,
}

impl<T> ListPage<T> {
    /// Creates a page with the given total and entries.
    pub fn new(total: u64, items: Vec<T>) -> Self {
        Self { total, items }
    }

    /// Creates an empty page.
    pub fn empty() -> Self {
        Self {
            total: 0,
            items: Vec::new(),
        }
    }

    /// Returns the number of entries on this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if this page has no entries.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maps every entry of the page.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListPage<U> {
        ListPage {
            total: self.total,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// Listing and document mutation calls of the database API.
///
/// Every listing call accepts query clauses (filters, ordering, `limit`,
/// `offset`, `cursorAfter`, `greaterThan`) and returns one [`ListPage`].
/// Implementations must be safe to share between all nodes of a resource tree.
#[async_trait::async_trait]
pub trait DatabaseApi: Send + Sync {
    /// Lists databases of the project.
    async fn list_databases(&self, queries: Vec<Query>) -> Result<ListPage<DatabaseModel>>;

    /// Lists collections of a database.
    async fn list_collections(
        &self,
        database_id: &str,
        queries: Vec<Query>,
    ) -> Result<ListPage<CollectionModel>>;

    /// Lists attributes of a collection.
    async fn list_attributes(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: Vec<Query>,
    ) -> Result<ListPage<AttributeModel>>;

    /// Lists indexes of a collection.
    async fn list_indexes(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: Vec<Query>,
    ) -> Result<ListPage<IndexModel>>;

    /// Lists documents of a collection.
    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: Vec<Query>,
    ) -> Result<ListPage<Document>>;

    /// Creates a document with an explicit ID.
    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> Result<Document>;

    /// Updates fields of a document; `None` leaves the document untouched.
    async fn update_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Option<Map<String, Value>>,
    ) -> Result<Document>;

    /// Deletes a document.
    async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<()>;
}

/// Shared handle to a [`DatabaseApi`] implementation.
pub type SharedApi = Arc<dyn DatabaseApi>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_page_map_keeps_total() {
        let page = ListPage::new(10, vec![1, 2, 3]).map(|n| n * 2);
        assert_eq!(page.total, 10);
        assert_eq!(page.items, vec![2, 4, 6]);
        assert_eq!(page.len(), 3);
        assert!(!page.is_empty());
        assert!(ListPage::<u8>::empty().is_empty());
    }
}
