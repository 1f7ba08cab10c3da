//! In-memory implementation of the database API for testing.
//!
//! [`MemoryApi`] stores databases, collections, attributes, indexes and
//! documents in memory, honours the paging and filter clauses used by this
//! crate, records every call it receives and can be told to fail on demand.
//!
//! # Feature Flag
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! awdb-core = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use awdb_core::mock::MemoryApi;
//! use awdb_core::Databases;
//!
//! let api = Arc::new(MemoryApi::new());
//! api.add_database("main", "Main")
//!     .add_collection("main", "users", "Users")
//!     .add_document("main", "users", "u1", serde_json::json!({ "role": "admin" }));
//!
//! let mut databases = Databases::new("project", api.clone());
//! databases.init().await?;
//! ```

use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard, PoisonError};

use jiff::Timestamp;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    AttributeModel, CollectionModel, DatabaseApi, DatabaseModel, Document, Error, IndexModel,
    ListPage, Query, QueryMethod, Result,
};

/// First timestamp handed out by the mock clock (2024-01-01T00:00:00Z).
const CLOCK_START: i64 = 1_704_067_200;

/// Page size applied when a listing carries no `limit` clause.
const DEFAULT_LIMIT: usize = 25;

/// A call received by [`MemoryApi`].
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    ListDatabases {
        queries: Vec<Query>,
    },
    ListCollections {
        database_id: String,
        queries: Vec<Query>,
    },
    ListAttributes {
        database_id: String,
        collection_id: String,
        queries: Vec<Query>,
    },
    ListIndexes {
        database_id: String,
        collection_id: String,
        queries: Vec<Query>,
    },
    ListDocuments {
        database_id: String,
        collection_id: String,
        queries: Vec<Query>,
    },
    CreateDocument {
        database_id: String,
        collection_id: String,
        document_id: String,
    },
    UpdateDocument {
        database_id: String,
        collection_id: String,
        document_id: String,
    },
    DeleteDocument {
        database_id: String,
        collection_id: String,
        document_id: String,
    },
}

impl ApiCall {
    /// Returns the target document ID of a mutation.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::CreateDocument { document_id, .. }
            | Self::UpdateDocument { document_id, .. }
            | Self::DeleteDocument { document_id, .. } => Some(document_id),
            _ => None,
        }
    }

    /// Returns the query clauses of a listing.
    pub fn queries(&self) -> Option<&[Query]> {
        match self {
            Self::ListDatabases { queries }
            | Self::ListCollections { queries, .. }
            | Self::ListAttributes { queries, .. }
            | Self::ListIndexes { queries, .. }
            | Self::ListDocuments { queries, .. } => Some(queries),
            _ => None,
        }
    }

    pub fn is_list_documents(&self) -> bool {
        matches!(self, Self::ListDocuments { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::DeleteDocument { .. })
    }

    pub fn is_update(&self) -> bool {
        matches!(self, Self::UpdateDocument { .. })
    }

    pub fn is_create(&self) -> bool {
        matches!(self, Self::CreateDocument { .. })
    }
}

type FailurePredicate = Box<dyn Fn(&ApiCall) -> bool + Send + Sync>;

struct MemoryCollection {
    model: CollectionModel,
    attributes: Vec<AttributeModel>,
    indexes: Vec<IndexModel>,
    documents: Vec<Document>,
}

struct MemoryDatabase {
    model: DatabaseModel,
    collections: Vec<MemoryCollection>,
}

#[derive(Default)]
struct State {
    databases: Vec<MemoryDatabase>,
    calls: Vec<ApiCall>,
    clock: i64,
}

impl State {
    fn tick(&mut self) -> Timestamp {
        self.clock += 1;
        Timestamp::constant(CLOCK_START + self.clock, 0)
    }

    fn database(&self, database_id: &str) -> Result<&MemoryDatabase> {
        self.databases
            .iter()
            .find(|database| database.model.id == database_id)
            .ok_or_else(|| not_found(format!("Database '{database_id}' could not be found")))
    }

    fn collection(&self, database_id: &str, collection_id: &str) -> Result<&MemoryCollection> {
        self.database(database_id)?
            .collections
            .iter()
            .find(|collection| collection.model.id == collection_id)
            .ok_or_else(|| not_found(format!("Collection '{collection_id}' could not be found")))
    }

    fn collection_mut(
        &mut self,
        database_id: &str,
        collection_id: &str,
    ) -> Result<&mut MemoryCollection> {
        self.databases
            .iter_mut()
            .find(|database| database.model.id == database_id)
            .ok_or_else(|| not_found(format!("Database '{database_id}' could not be found")))?
            .collections
            .iter_mut()
            .find(|collection| collection.model.id == collection_id)
            .ok_or_else(|| not_found(format!("Collection '{collection_id}' could not be found")))
    }
}

fn not_found(message: String) -> Error {
    Error::transport().with_status(404).with_message(message)
}

/// In-memory [`DatabaseApi`] that records every call.
#[derive(Default)]
pub struct MemoryApi {
    state: Mutex<State>,
    failure: Mutex<Option<FailurePredicate>>,
}

impl std::fmt::Debug for MemoryApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MemoryApi")
            .field("databases", &state.databases.len())
            .field("calls", &state.calls.len())
            .finish_non_exhaustive()
    }
}

impl MemoryApi {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a database.
    pub fn add_database(&self, id: &str, name: &str) -> &Self {
        let mut state = self.state();
        let created_at = state.tick();
        state.databases.push(MemoryDatabase {
            model: DatabaseModel {
                id: id.to_owned(),
                name: name.to_owned(),
                created_at: Some(created_at),
                updated_at: Some(created_at),
                enabled: true,
            },
            collections: Vec::new(),
        });

        self
    }

    /// Adds a collection to an existing database.
    ///
    /// # Panics
    ///
    /// Panics if the database does not exist.
    pub fn add_collection(&self, database_id: &str, id: &str, name: &str) -> &Self {
        let mut state = self.state();
        let created_at = state.tick();
        let database = state
            .databases
            .iter_mut()
            .find(|database| database.model.id == database_id)
            .unwrap_or_else(|| panic!("unknown database '{database_id}'"));

        database.collections.push(MemoryCollection {
            model: CollectionModel {
                id: id.to_owned(),
                name: name.to_owned(),
                database_id: database_id.to_owned(),
                created_at: Some(created_at),
                updated_at: Some(created_at),
                permissions: Vec::new(),
                enabled: true,
                document_security: false,
            },
            attributes: Vec::new(),
            indexes: Vec::new(),
            documents: Vec::new(),
        });

        self
    }

    /// Adds an attribute to an existing collection.
    ///
    /// # Panics
    ///
    /// Panics if the collection does not exist.
    pub fn add_attribute(&self, database_id: &str, collection_id: &str, key: &str, kind: &str) -> &Self {
        let mut state = self.state();
        let created_at = state.tick();
        let collection = state
            .collection_mut(database_id, collection_id)
            .unwrap_or_else(|error| panic!("{error}"));

        collection.attributes.push(AttributeModel {
            key: key.to_owned(),
            kind: kind.to_owned(),
            status: "available".to_owned(),
            required: false,
            created_at: Some(created_at),
            extra: Map::new(),
        });

        self
    }

    /// Adds an index to an existing collection.
    ///
    /// # Panics
    ///
    /// Panics if the collection does not exist.
    pub fn add_index(
        &self,
        database_id: &str,
        collection_id: &str,
        key: &str,
        kind: &str,
        attributes: &[&str],
    ) -> &Self {
        let mut state = self.state();
        let created_at = state.tick();
        let collection = state
            .collection_mut(database_id, collection_id)
            .unwrap_or_else(|error| panic!("{error}"));

        collection.indexes.push(IndexModel {
            key: key.to_owned(),
            kind: kind.to_owned(),
            status: "available".to_owned(),
            attributes: attributes.iter().map(|&a| a.to_owned()).collect(),
            created_at: Some(created_at),
            extra: Map::new(),
        });

        self
    }

    /// Adds a document to an existing collection.
    ///
    /// # Panics
    ///
    /// Panics if the collection does not exist or `data` is not a JSON object.
    pub fn add_document(&self, database_id: &str, collection_id: &str, id: &str, data: Value) -> &Self {
        let Value::Object(data) = data else {
            panic!("document data must be a JSON object");
        };

        let mut state = self.state();
        let created_at = state.tick();
        let collection = state
            .collection_mut(database_id, collection_id)
            .unwrap_or_else(|error| panic!("{error}"));

        collection
            .documents
            .push(new_document(database_id, collection_id, id, data, created_at));

        self
    }

    /// Returns the documents currently stored in a collection.
    pub fn documents(&self, database_id: &str, collection_id: &str) -> Vec<Document> {
        self.state()
            .collection(database_id, collection_id)
            .map(|collection| collection.documents.clone())
            .unwrap_or_default()
    }

    /// Returns every call received so far, oldest first.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Makes every call matching `predicate` fail with a transport error.
    ///
    /// The failing call is still recorded.
    pub fn fail_when(&self, predicate: impl Fn(&ApiCall) -> bool + Send + Sync + 'static) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(predicate));
    }

    /// Removes the failure predicate.
    pub fn clear_failure(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn record(&self, call: ApiCall) -> Result<()> {
        let failing = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|predicate| predicate(&call));

        self.state().calls.push(call);
        if failing {
            return Err(Error::transport()
                .with_status(500)
                .with_message("Injected failure"));
        }

        Ok(())
    }
}

fn new_document(
    database_id: &str,
    collection_id: &str,
    id: &str,
    data: Map<String, Value>,
    created_at: Timestamp,
) -> Document {
    let mut document = Document::new(id, data);
    document.database_id = Some(database_id.to_owned());
    document.collection_id = Some(collection_id.to_owned());
    document.created_at = Some(created_at);
    document.updated_at = Some(created_at);
    document
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => {
            match (l.parse::<Timestamp>(), r.parse::<Timestamp>()) {
                (Ok(l), Ok(r)) => Some(l.cmp(&r)),
                _ => Some(l.cmp(r)),
            }
        }
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

fn matches(row: &Value, query: &Query) -> bool {
    let Some(attribute) = query.attribute.as_deref() else {
        return true;
    };

    let field = row.get(attribute).unwrap_or(&Value::Null);
    let first = query.values.first().unwrap_or(&Value::Null);

    match query.method {
        QueryMethod::Equal => query.values.contains(field),
        QueryMethod::NotEqual => !query.values.contains(field),
        QueryMethod::IsNull => field.is_null(),
        QueryMethod::IsNotNull => !field.is_null(),
        QueryMethod::GreaterThan => compare(field, first) == Some(Ordering::Greater),
        QueryMethod::GreaterThanEqual => {
            matches!(compare(field, first), Some(Ordering::Greater | Ordering::Equal))
        }
        QueryMethod::LessThan => compare(field, first) == Some(Ordering::Less),
        QueryMethod::LessThanEqual => {
            matches!(compare(field, first), Some(Ordering::Less | Ordering::Equal))
        }
        QueryMethod::StartsWith => field
            .as_str()
            .zip(first.as_str())
            .is_some_and(|(f, v)| f.starts_with(v)),
        QueryMethod::EndsWith => field
            .as_str()
            .zip(first.as_str())
            .is_some_and(|(f, v)| f.ends_with(v)),
        _ => true,
    }
}

/// Applies filter, order and paging clauses the way the listing endpoints do.
fn list<T: Serialize + Clone>(items: &[T], queries: &[Query]) -> Result<ListPage<T>> {
    let mut rows = items
        .iter()
        .map(|item| -> Result<(Value, &T)> { Ok((serde_json::to_value(item)?, item)) })
        .collect::<Result<Vec<_>>>()?;

    rows.retain(|(row, _)| queries.iter().all(|query| matches(row, query)));

    for query in queries.iter().rev() {
        let Some(attribute) = query.attribute.as_deref() else {
            continue;
        };

        let descending = match query.method {
            QueryMethod::OrderAsc => false,
            QueryMethod::OrderDesc => true,
            _ => continue,
        };

        rows.sort_by(|(l, _), (r, _)| {
            let null = Value::Null;
            let ordering = compare(l.get(attribute).unwrap_or(&null), r.get(attribute).unwrap_or(&null))
                .unwrap_or(Ordering::Equal);
            if descending { ordering.reverse() } else { ordering }
        });
    }

    let total = rows.len() as u64;
    let mut start = 0;
    let mut limit = DEFAULT_LIMIT;

    for query in queries {
        match query.method {
            QueryMethod::CursorAfter => {
                let id = query.first_str().unwrap_or_default();
                let position = rows
                    .iter()
                    .position(|(row, _)| row.get("$id").and_then(Value::as_str) == Some(id))
                    .ok_or_else(|| {
                        Error::transport()
                            .with_status(400)
                            .with_message(format!("Cursor '{id}' could not be found"))
                    })?;
                start += position + 1;
            }
            QueryMethod::Offset => start += query.first_u64().unwrap_or_default() as usize,
            QueryMethod::Limit => limit = query.first_u64().unwrap_or_default() as usize,
            _ => {}
        }
    }

    let items = rows
        .into_iter()
        .skip(start)
        .take(limit)
        .map(|(_, item)| item.clone())
        .collect();

    Ok(ListPage::new(total, items))
}

#[async_trait::async_trait]
impl DatabaseApi for MemoryApi {
    async fn list_databases(&self, queries: Vec<Query>) -> Result<ListPage<DatabaseModel>> {
        self.record(ApiCall::ListDatabases {
            queries: queries.clone(),
        })?;

        let state = self.state();
        let models: Vec<_> = state.databases.iter().map(|d| d.model.clone()).collect();
        list(&models, &queries)
    }

    async fn list_collections(
        &self,
        database_id: &str,
        queries: Vec<Query>,
    ) -> Result<ListPage<CollectionModel>> {
        self.record(ApiCall::ListCollections {
            database_id: database_id.to_owned(),
            queries: queries.clone(),
        })?;

        let state = self.state();
        let models: Vec<_> = state
            .database(database_id)?
            .collections
            .iter()
            .map(|c| c.model.clone())
            .collect();
        list(&models, &queries)
    }

    async fn list_attributes(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: Vec<Query>,
    ) -> Result<ListPage<AttributeModel>> {
        self.record(ApiCall::ListAttributes {
            database_id: database_id.to_owned(),
            collection_id: collection_id.to_owned(),
            queries: queries.clone(),
        })?;

        let state = self.state();
        list(&state.collection(database_id, collection_id)?.attributes, &queries)
    }

    async fn list_indexes(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: Vec<Query>,
    ) -> Result<ListPage<IndexModel>> {
        self.record(ApiCall::ListIndexes {
            database_id: database_id.to_owned(),
            collection_id: collection_id.to_owned(),
            queries: queries.clone(),
        })?;

        let state = self.state();
        list(&state.collection(database_id, collection_id)?.indexes, &queries)
    }

    async fn list_documents(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: Vec<Query>,
    ) -> Result<ListPage<Document>> {
        self.record(ApiCall::ListDocuments {
            database_id: database_id.to_owned(),
            collection_id: collection_id.to_owned(),
            queries: queries.clone(),
        })?;

        let state = self.state();
        list(&state.collection(database_id, collection_id)?.documents, &queries)
    }

    async fn create_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> Result<Document> {
        self.record(ApiCall::CreateDocument {
            database_id: database_id.to_owned(),
            collection_id: collection_id.to_owned(),
            document_id: document_id.to_owned(),
        })?;

        let mut state = self.state();
        let created_at = state.tick();
        let collection = state.collection_mut(database_id, collection_id)?;
        if collection.documents.iter().any(|d| d.id == document_id) {
            return Err(Error::transport().with_status(409).with_message(format!(
                "Document with the requested ID '{document_id}' already exists"
            )));
        }

        let document = new_document(database_id, collection_id, document_id, data, created_at);
        collection.documents.push(document.clone());
        Ok(document)
    }

    async fn update_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: Option<Map<String, Value>>,
    ) -> Result<Document> {
        self.record(ApiCall::UpdateDocument {
            database_id: database_id.to_owned(),
            collection_id: collection_id.to_owned(),
            document_id: document_id.to_owned(),
        })?;

        let mut state = self.state();
        let updated_at = state.tick();
        let document = state
            .collection_mut(database_id, collection_id)?
            .documents
            .iter_mut()
            .find(|d| d.id == document_id)
            .ok_or_else(|| not_found(format!("Document '{document_id}' could not be found")))?;

        if let Some(data) = data {
            document.data.extend(data);
            document.updated_at = Some(updated_at);
        }

        Ok(document.clone())
    }

    async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<()> {
        self.record(ApiCall::DeleteDocument {
            database_id: database_id.to_owned(),
            collection_id: collection_id.to_owned(),
            document_id: document_id.to_owned(),
        })?;

        let mut state = self.state();
        let documents = &mut state.collection_mut(database_id, collection_id)?.documents;
        let position = documents
            .iter()
            .position(|d| d.id == document_id)
            .ok_or_else(|| not_found(format!("Document '{document_id}' could not be found")))?;

        documents.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn store() -> MemoryApi {
        let api = MemoryApi::new();
        api.add_database("main", "Main")
            .add_collection("main", "users", "Users");
        for (id, role) in [("a", "admin"), ("b", "member"), ("c", "admin"), ("d", "member")] {
            api.add_document("main", "users", id, json!({ "role": role }));
        }
        api
    }

    #[tokio::test]
    async fn filters_and_pages_documents() {
        let api = store();

        let page = api
            .list_documents("main", "users", vec![Query::equal("role", "admin"), Query::limit(1)])
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].id, "a");

        let page = api
            .list_documents(
                "main",
                "users",
                vec![
                    Query::cursor_after("a"),
                    Query::equal("role", "admin"),
                    Query::limit(10),
                ],
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "c");
    }

    #[tokio::test]
    async fn unknown_cursor_is_rejected() {
        let api = store();
        let error = api
            .list_documents("main", "users", vec![Query::cursor_after("zz")])
            .await
            .unwrap_err();
        assert_eq!(error.status, Some(400));
    }

    #[tokio::test]
    async fn created_at_cursor_pages_attributes() {
        let api = store();
        api.add_attribute("main", "users", "email", "string")
            .add_attribute("main", "users", "role", "string");

        let first = api
            .list_attributes("main", "users", vec![Query::limit(1)])
            .await
            .unwrap();
        let created_at = first.items[0].created_at.unwrap();

        let rest = api
            .list_attributes(
                "main",
                "users",
                vec![
                    Query::greater_than("$createdAt", created_at.to_string()),
                    Query::limit(1),
                ],
            )
            .await
            .unwrap();
        assert_eq!(rest.items[0].key, "role");
    }

    #[tokio::test]
    async fn mutations_and_failure_injection() {
        let api = store();

        let document = api
            .create_document("main", "users", "e", Map::new())
            .await
            .unwrap();
        assert_eq!(document.collection_id.as_deref(), Some("users"));
        assert!(api.create_document("main", "users", "e", Map::new()).await.is_err());

        api.fail_when(|call| call.document_id() == Some("b"));
        assert!(api.delete_document("main", "users", "b").await.is_err());
        api.clear_failure();
        api.delete_document("main", "users", "b").await.unwrap();

        let ids: Vec<_> = api.documents("main", "users").into_iter().map(|d| d.id).collect();
        assert_eq!(ids, ["a", "c", "d", "e"]);
        assert_eq!(api.calls().iter().filter(|call| call.is_delete()).count(), 2);
    }
}
