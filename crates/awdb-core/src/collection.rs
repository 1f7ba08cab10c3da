//! Collection node: schema children plus single-document operations.

use std::fmt;
use std::slice;

use serde_json::{Map, Value};

use crate::lookup::find_unique;
use crate::{
    Attribute, CHILD_PAGE_SIZE, CollectionModel, Document, DocumentCursor, DocumentId, Index,
    Named, NodeState, QueryOptions, Result, SharedApi, TRACING_TARGET_BULK, TRACING_TARGET_TREE,
    paginate,
};

/// A collection, its attributes and its indexes.
///
/// Documents are not cached; they are read through [`query`](Self::query)
/// and written through the single-document and bulk operations.
pub struct Collection {
    database_id: String,
    model: CollectionModel,
    api: SharedApi,
    attributes: NodeState<Attribute>,
    indexes: NodeState<Index>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("database_id", &self.database_id)
            .field("model", &self.model)
            .field("attributes", &self.attributes)
            .field("indexes", &self.indexes)
            .finish_non_exhaustive()
    }
}

impl Collection {
    /// Creates an uninitialized collection node.
    pub fn new(database_id: impl Into<String>, model: CollectionModel, api: SharedApi) -> Self {
        Self {
            database_id: database_id.into(),
            model,
            api,
            attributes: NodeState::Uninitialized,
            indexes: NodeState::Uninitialized,
        }
    }

    pub fn id(&self) -> &str {
        &self.model.id
    }

    pub fn name(&self) -> &str {
        &self.model.name
    }

    /// Returns the ID of the owning database.
    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn model(&self) -> &CollectionModel {
        &self.model
    }

    pub(crate) fn api(&self) -> &SharedApi {
        &self.api
    }

    pub fn is_initialized(&self) -> bool {
        self.attributes.is_ready() && self.indexes.is_ready()
    }

    pub(crate) fn describe(&self) -> String {
        format!("collection '{}'", self.model.name)
    }

    /// Lists the attributes, then the indexes.
    pub async fn init(&mut self) -> Result<()> {
        let node = self.describe();
        self.attributes.ensure_uninitialized(&node)?;
        self.indexes.ensure_uninitialized(&node)?;

        let api = &self.api;
        let database_id = self.database_id.as_str();
        let collection_id = self.model.id.as_str();

        let attributes = paginate(CHILD_PAGE_SIZE, move |request| {
            api.list_attributes(database_id, collection_id, request.to_queries())
        })
        .await?;

        let indexes = paginate(CHILD_PAGE_SIZE, move |request| {
            api.list_indexes(database_id, collection_id, request.to_queries())
        })
        .await?;

        tracing::debug!(
            target: TRACING_TARGET_TREE,
            database_id = %self.database_id,
            collection_id = %self.model.id,
            attributes = attributes.len(),
            indexes = indexes.len(),
            "Collection initialized"
        );

        let attributes = attributes
            .into_iter()
            .map(|model| Attribute::new(&self.database_id, &self.model.id, model))
            .collect();
        let indexes = indexes
            .into_iter()
            .map(|model| Index::new(&self.database_id, &self.model.id, model))
            .collect();

        self.attributes = NodeState::Ready(attributes);
        self.indexes = NodeState::Ready(indexes);
        Ok(())
    }

    /// Returns every attribute.
    pub fn attribute_list(&self) -> Result<&[Attribute]> {
        self.attributes.items(&self.describe())
    }

    /// Returns every index.
    pub fn index_list(&self) -> Result<&[Index]> {
        self.indexes.items(&self.describe())
    }

    /// Returns the only attribute with the given key.
    pub fn get_attribute(&self, key: &str) -> Result<&Attribute> {
        find_unique(self.attribute_list()?, key, "attribute", &self.describe())
    }

    /// Returns the only index with the given key.
    pub fn get_index(&self, key: &str) -> Result<&Index> {
        find_unique(self.index_list()?, key, "index", &self.describe())
    }

    /// Iterates over the attributes in listing order.
    pub fn iter(&self) -> Result<slice::Iter<'_, Attribute>> {
        Ok(self.attribute_list()?.iter())
    }

    /// Fails unless [`init`](Self::init) has completed.
    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        self.attributes.items(&self.describe())?;
        self.indexes.items(&self.describe())?;
        Ok(())
    }

    /// Starts a lazy query over the documents of this collection.
    pub fn query(&self, options: QueryOptions) -> Result<DocumentCursor<'_>> {
        self.ensure_initialized()?;
        Ok(DocumentCursor::new(self, options))
    }

    /// Returns the first document matching the options, if any.
    ///
    /// Only a single document is requested.
    pub async fn query_one(&self, options: QueryOptions) -> Result<Option<Document>> {
        let mut cursor = self.query(options.with_items_per_page(1))?;
        let item = cursor.next().await?;
        Ok(item.map(|item| item.document))
    }

    /// Creates a document with a freshly generated ID.
    pub async fn insert_one(&self, data: Map<String, Value>) -> Result<Document> {
        self.create(&DocumentId::unique(), data).await
    }

    pub(crate) async fn create(
        &self,
        document_id: &DocumentId,
        data: Map<String, Value>,
    ) -> Result<Document> {
        self.ensure_initialized()?;

        tracing::debug!(
            target: TRACING_TARGET_BULK,
            collection_id = %self.model.id,
            document_id = %document_id,
            "Creating document"
        );

        self.api
            .create_document(&self.database_id, &self.model.id, document_id, data)
            .await
    }

    /// Updates fields of a single document.
    pub async fn update_one(
        &self,
        document_id: &str,
        data: Option<Map<String, Value>>,
    ) -> Result<Document> {
        self.ensure_initialized()?;

        tracing::debug!(
            target: TRACING_TARGET_BULK,
            collection_id = %self.model.id,
            document_id,
            "Updating document"
        );

        self.api
            .update_document(&self.database_id, &self.model.id, document_id, data)
            .await
    }

    /// Deletes a single document.
    pub async fn delete_one(&self, document_id: &str) -> Result<()> {
        self.ensure_initialized()?;

        tracing::debug!(
            target: TRACING_TARGET_BULK,
            collection_id = %self.model.id,
            document_id,
            "Deleting document"
        );

        self.api
            .delete_document(&self.database_id, &self.model.id, document_id)
            .await
    }
}

impl Named for Collection {
    fn lookup_name(&self) -> &str {
        self.name()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::mock::MemoryApi;
    use crate::{ErrorKind, Query};

    pub(crate) fn model(id: &str, name: &str) -> CollectionModel {
        serde_json::from_value(json!({ "$id": id, "name": name, "databaseId": "main" })).unwrap()
    }

    pub(crate) fn store() -> Arc<MemoryApi> {
        let api = Arc::new(MemoryApi::new());
        api.add_database("main", "Main")
            .add_collection("main", "users", "Users")
            .add_attribute("main", "users", "email", "string")
            .add_attribute("main", "users", "role", "string")
            .add_index("main", "users", "by_email", "unique", &["email"]);
        api
    }

    pub(crate) async fn users(api: &Arc<MemoryApi>) -> Collection {
        let mut collection = Collection::new("main", model("users", "Users"), api.clone());
        collection.init().await.unwrap();
        collection
    }

    #[tokio::test]
    async fn init_lists_attributes_then_indexes() {
        let api = store();
        let collection = users(&api).await;

        let keys: Vec<_> = collection.iter().unwrap().map(Attribute::key).collect();
        assert_eq!(keys, ["email", "role"]);
        assert_eq!(collection.get_index("by_email").unwrap().attributes(), ["email"]);
        assert_eq!(collection.get_attribute("role").unwrap().collection_id(), "users");
    }

    #[tokio::test]
    async fn attributes_page_by_creation_time() {
        let api = store();
        for i in 0..150 {
            api.add_attribute("main", "users", &format!("field_{i:03}"), "integer");
        }

        let collection = users(&api).await;
        assert_eq!(collection.attribute_list().unwrap().len(), 152);

        let listing: Vec<_> = api
            .calls()
            .into_iter()
            .filter(|call| matches!(call, crate::mock::ApiCall::ListAttributes { .. }))
            .collect();
        assert_eq!(listing.len(), 2);

        let second = listing[1].queries().unwrap();
        assert_eq!(second[0].attribute.as_deref(), Some("$createdAt"));
        assert_eq!(second[1], Query::limit(CHILD_PAGE_SIZE));
    }

    #[tokio::test]
    async fn lookup_by_key() {
        let api = store();
        api.add_attribute("main", "users", "role", "string");
        let collection = users(&api).await;

        let error = collection.get_attribute("role").unwrap_err();
        assert_eq!(error.kind, ErrorKind::NotFoundOrAmbiguous);
        assert!(std::ptr::eq(
            collection.get_attribute("email").unwrap(),
            collection.get_attribute("email").unwrap()
        ));
    }

    #[tokio::test]
    async fn operations_before_init_are_misuse() {
        let api = store();
        let collection = Collection::new("main", model("users", "Users"), api.clone());

        assert_eq!(collection.query(QueryOptions::default()).unwrap_err().kind, ErrorKind::Misuse);
        assert_eq!(collection.delete_one("x").await.unwrap_err().kind, ErrorKind::Misuse);
        assert_eq!(collection.iter().unwrap_err().kind, ErrorKind::Misuse);
        assert_eq!(collection.get_index("by_email").unwrap_err().kind, ErrorKind::Misuse);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn single_document_operations() {
        let api = store();
        let collection = users(&api).await;

        let mut data = Map::new();
        data.insert("role".into(), json!("admin"));
        let created = collection.insert_one(data).await.unwrap();
        assert_eq!(created.id.len(), 32);

        let mut patch = Map::new();
        patch.insert("role".into(), json!("owner"));
        let updated = collection.update_one(&created.id, Some(patch)).await.unwrap();
        assert_eq!(updated.get("role"), Some(&json!("owner")));

        let found = collection
            .query_one(QueryOptions::default().with_query(Query::equal("role", "owner")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);

        collection.delete_one(&created.id).await.unwrap();
        let missing = collection
            .query_one(QueryOptions::default().with_query(Query::equal("role", "owner")))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn query_one_requests_a_single_document() {
        let api = store();
        api.add_document("main", "users", "a", json!({}))
            .add_document("main", "users", "b", json!({}));
        let collection = users(&api).await;
        api.clear_calls();

        let found = collection.query_one(QueryOptions::default()).await.unwrap();
        assert_eq!(found.unwrap().id, "a");

        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].queries().unwrap(), [Query::limit(1)]);
    }
}
