//! Bulk document mutations.
//!
//! [`Collection::delete_many`] and [`Collection::update_many`] first drain a
//! document query into a queue of IDs, and only then mutate the queued
//! documents one at a time. A failed mutation or callback aborts the batch;
//! documents already mutated stay mutated.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::{
    Collection, Document, DocumentId, Error, QueryControl, QueryItem, QueryOptions, Result,
    TRACING_TARGET_BULK,
};

/// Progress of a bulk operation, passed to its callback after each success.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkProgress<T> {
    /// Number of documents in the batch.
    pub count: usize,
    /// Zero-based position of this document in the batch.
    pub index: usize,
    pub document: T,
}

/// Async callback invoked after each successful mutation.
pub type BulkCallback<'a, T> =
    Box<dyn FnMut(BulkProgress<T>) -> BoxFuture<'a, Result<()>> + Send + 'a>;

type DrainControl<'a> = Box<dyn FnMut(&QueryItem) -> QueryControl + Send + 'a>;

fn boxed_callback<'a, T, F, Fut>(mut callback: F) -> BulkCallback<'a, T>
where
    T: 'a,
    F: FnMut(BulkProgress<T>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<()>> + Send + 'a,
{
    Box::new(move |progress| callback(progress).boxed())
}

/// Options of [`Collection::delete_many`].
#[derive(Default)]
pub struct DeleteOptions<'a> {
    /// Selects the documents to delete.
    pub query: QueryOptions,
    callback: Option<BulkCallback<'a, DocumentId>>,
    drain_control: Option<DrainControl<'a>>,
}

impl fmt::Debug for DeleteOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteOptions")
            .field("query", &self.query)
            .field("callback", &self.callback.is_some())
            .field("drain_control", &self.drain_control.is_some())
            .finish()
    }
}

impl<'a> DeleteOptions<'a> {
    /// Creates options deleting every document matched by `query`.
    pub fn new(query: QueryOptions) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    /// Sets the callback invoked with the ID of every deleted document.
    #[must_use]
    pub fn on_progress<F, Fut>(mut self, callback: F) -> Self
    where
        F: FnMut(BulkProgress<DocumentId>) -> Fut + Send + 'a,
        Fut: Future<Output = Result<()>> + Send + 'a,
    {
        self.callback = Some(boxed_callback(callback));
        self
    }

    /// Controls the query while the target IDs are collected.
    ///
    /// This is the only point where a bulk operation can be cut short
    /// without failing: returning [`QueryControl::Cancel`] ends the
    /// collection after the current document.
    #[must_use]
    pub fn with_drain_control(
        mut self,
        control: impl FnMut(&QueryItem) -> QueryControl + Send + 'a,
    ) -> Self {
        self.drain_control = Some(Box::new(control));
        self
    }
}

/// Options of [`Collection::update_many`].
#[derive(Default)]
pub struct UpdateOptions<'a> {
    /// Selects the documents to update.
    pub query: QueryOptions,
    callback: Option<BulkCallback<'a, Document>>,
    drain_control: Option<DrainControl<'a>>,
}

impl fmt::Debug for UpdateOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateOptions")
            .field("query", &self.query)
            .field("callback", &self.callback.is_some())
            .field("drain_control", &self.drain_control.is_some())
            .finish()
    }
}

impl<'a> UpdateOptions<'a> {
    /// Creates options updating every document matched by `query`.
    pub fn new(query: QueryOptions) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    /// Sets the callback invoked with every updated document.
    #[must_use]
    pub fn on_progress<F, Fut>(mut self, callback: F) -> Self
    where
        F: FnMut(BulkProgress<Document>) -> Fut + Send + 'a,
        Fut: Future<Output = Result<()>> + Send + 'a,
    {
        self.callback = Some(boxed_callback(callback));
        self
    }

    /// Controls the query while the target IDs are collected.
    #[must_use]
    pub fn with_drain_control(
        mut self,
        control: impl FnMut(&QueryItem) -> QueryControl + Send + 'a,
    ) -> Self {
        self.drain_control = Some(Box::new(control));
        self
    }
}

/// Options of [`Collection::insert`].
#[derive(Default)]
pub struct InsertOptions<'a> {
    callback: Option<BulkCallback<'a, Document>>,
}

impl fmt::Debug for InsertOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertOptions")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl<'a> InsertOptions<'a> {
    /// Sets the callback invoked with every created document.
    #[must_use]
    pub fn on_progress<F, Fut>(mut self, callback: F) -> Self
    where
        F: FnMut(BulkProgress<Document>) -> Fut + Send + 'a,
        Fut: Future<Output = Result<()>> + Send + 'a,
    {
        self.callback = Some(boxed_callback(callback));
        self
    }
}

async fn notify<T>(callback: &mut Option<BulkCallback<'_, T>>, progress: BulkProgress<T>) -> Result<()> {
    let Some(callback) = callback.as_mut() else {
        return Ok(());
    };

    let index = progress.index;
    callback(progress).await.map_err(|error| {
        Error::callback()
            .with_message(format!("Progress callback failed at index {index}"))
            .with_source(error)
    })
}

impl Collection {
    /// Collects the IDs of every document matched by `query`.
    async fn drain(
        &self,
        query: QueryOptions,
        control: &mut Option<DrainControl<'_>>,
    ) -> Result<VecDeque<DocumentId>> {
        let mut cursor = self.query(query)?;
        let mut queue = VecDeque::new();

        while let Some(item) = cursor.next().await? {
            if let Some(control) = control.as_mut() {
                let decision = control(&item);
                cursor.control(decision);
            }

            queue.push_back(item.document.document_id());
        }

        Ok(queue)
    }

    /// Deletes every document matched by the options, one at a time.
    ///
    /// Returns the number of deleted documents.
    pub async fn delete_many(&self, options: DeleteOptions<'_>) -> Result<usize> {
        let DeleteOptions {
            query,
            mut callback,
            mut drain_control,
        } = options;

        let mut queue = self.drain(query, &mut drain_control).await?;
        let count = queue.len();

        tracing::debug!(
            target: TRACING_TARGET_BULK,
            collection_id = %self.id(),
            count,
            "Deleting documents"
        );

        let mut index = 0;
        while let Some(document_id) = queue.pop_front() {
            let result = match self.delete_one(&document_id).await {
                Ok(()) => {
                    let progress = BulkProgress {
                        count,
                        index,
                        document: document_id.clone(),
                    };
                    notify(&mut callback, progress).await
                }
                Err(error) => Err(error),
            };

            if let Err(error) = result {
                tracing::warn!(
                    target: TRACING_TARGET_BULK,
                    collection_id = %self.id(),
                    document_id = %document_id,
                    index,
                    count,
                    error = %error,
                    "Bulk delete aborted"
                );
                return Err(error);
            }

            index += 1;
        }

        Ok(count)
    }

    /// Applies `data` to every document matched by the options, one at a time.
    ///
    /// Returns the number of updated documents.
    pub async fn update_many(
        &self,
        data: Option<Map<String, Value>>,
        options: UpdateOptions<'_>,
    ) -> Result<usize> {
        let UpdateOptions {
            query,
            mut callback,
            mut drain_control,
        } = options;

        let mut queue = self.drain(query, &mut drain_control).await?;
        let count = queue.len();

        tracing::debug!(
            target: TRACING_TARGET_BULK,
            collection_id = %self.id(),
            count,
            "Updating documents"
        );

        let mut index = 0;
        while let Some(document_id) = queue.pop_front() {
            let result = match self.update_one(&document_id, data.clone()).await {
                Ok(document) => {
                    let progress = BulkProgress {
                        count,
                        index,
                        document,
                    };
                    notify(&mut callback, progress).await
                }
                Err(error) => Err(error),
            };

            if let Err(error) = result {
                tracing::warn!(
                    target: TRACING_TARGET_BULK,
                    collection_id = %self.id(),
                    document_id = %document_id,
                    index,
                    count,
                    error = %error,
                    "Bulk update aborted"
                );
                return Err(error);
            }

            index += 1;
        }

        Ok(count)
    }

    /// Creates one document per entry, in order, each with a fresh ID.
    pub async fn insert(
        &self,
        items: impl IntoIterator<Item = Map<String, Value>>,
        options: InsertOptions<'_>,
    ) -> Result<Vec<Document>> {
        let InsertOptions { mut callback } = options;
        let items: Vec<_> = items.into_iter().collect();
        let count = items.len();
        let mut documents = Vec::with_capacity(count);

        for (index, data) in items.into_iter().enumerate() {
            let document_id = DocumentId::unique();
            let result = match self.create(&document_id, data).await {
                Ok(document) => {
                    let progress = BulkProgress {
                        count,
                        index,
                        document: document.clone(),
                    };
                    documents.push(document);
                    notify(&mut callback, progress).await
                }
                Err(error) => Err(error),
            };

            if let Err(error) = result {
                tracing::warn!(
                    target: TRACING_TARGET_BULK,
                    collection_id = %self.id(),
                    document_id = %document_id,
                    index,
                    count,
                    error = %error,
                    "Bulk insert aborted"
                );
                return Err(error);
            }
        }

        Ok(documents)
    }
}
