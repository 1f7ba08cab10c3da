//! Databases registry and database nodes.

use std::fmt;
use std::slice;

use crate::lookup::find_unique;
use crate::{
    CHILD_PAGE_SIZE, Collection, DATABASE_PAGE_SIZE, DatabaseModel, Named, NodeState, Result,
    SharedApi, TRACING_TARGET_TREE, paginate,
};

/// Every database of a project, in remote listing order.
///
/// [`init`](Self::init) lists the databases and initializes each of them in
/// turn, which cascades down to collections, attributes and indexes. The
/// resulting tree is frozen: it is never refreshed.
pub struct Databases {
    project_id: String,
    api: SharedApi,
    databases: NodeState<Database>,
}

impl fmt::Debug for Databases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Databases")
            .field("project_id", &self.project_id)
            .field("databases", &self.databases)
            .finish_non_exhaustive()
    }
}

impl Databases {
    /// Creates an uninitialized registry.
    pub fn new(project_id: impl Into<String>, api: SharedApi) -> Self {
        Self {
            project_id: project_id.into(),
            api,
            databases: NodeState::Uninitialized,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Returns `true` once [`init`](Self::init) has completed.
    pub fn is_initialized(&self) -> bool {
        self.databases.is_ready()
    }

    /// Builds the whole resource tree below this registry.
    ///
    /// Databases are initialized one after another, depth first. On failure
    /// the registry stays uninitialized.
    pub async fn init(&mut self) -> Result<()> {
        self.databases.ensure_uninitialized("database registry")?;

        tracing::debug!(
            target: TRACING_TARGET_TREE,
            project_id = %self.project_id,
            "Initializing database registry"
        );

        let api = &self.api;
        let models = paginate(DATABASE_PAGE_SIZE, move |request| {
            api.list_databases(request.to_queries())
        })
        .await?;

        let mut databases = Vec::with_capacity(models.len());
        for model in models {
            let mut database = Database::new(model, self.api.clone());
            database.init().await?;
            databases.push(database);
        }

        tracing::info!(
            target: TRACING_TARGET_TREE,
            project_id = %self.project_id,
            databases = databases.len(),
            "Database registry initialized"
        );

        self.databases = NodeState::Ready(databases);
        Ok(())
    }

    /// Returns every database.
    pub fn database_list(&self) -> Result<&[Database]> {
        self.databases.items("database registry")
    }

    /// Returns the only database with the given display name.
    pub fn get_database(&self, name: &str) -> Result<&Database> {
        let scope = format!("project '{}'", self.project_id);
        find_unique(self.database_list()?, name, "database", &scope)
    }

    /// Returns the database with the given ID, if any.
    pub fn database_by_id(&self, id: &str) -> Result<Option<&Database>> {
        Ok(self.database_list()?.iter().find(|database| database.id() == id))
    }

    /// Iterates over the databases in listing order.
    pub fn iter(&self) -> Result<slice::Iter<'_, Database>> {
        Ok(self.database_list()?.iter())
    }
}

/// A database and its collections.
pub struct Database {
    model: DatabaseModel,
    api: SharedApi,
    collections: NodeState<Collection>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("model", &self.model)
            .field("collections", &self.collections)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates an uninitialized database node.
    pub fn new(model: DatabaseModel, api: SharedApi) -> Self {
        Self {
            model,
            api,
            collections: NodeState::Uninitialized,
        }
    }

    pub fn id(&self) -> &str {
        &self.model.id
    }

    pub fn name(&self) -> &str {
        &self.model.name
    }

    /// Returns the descriptor reported by the API.
    pub fn model(&self) -> &DatabaseModel {
        &self.model
    }

    pub fn is_initialized(&self) -> bool {
        self.collections.is_ready()
    }

    fn describe(&self) -> String {
        format!("database '{}'", self.model.name)
    }

    /// Lists the collections and initializes each of them in turn.
    pub async fn init(&mut self) -> Result<()> {
        self.collections.ensure_uninitialized(&self.describe())?;

        let api = &self.api;
        let database_id = self.model.id.as_str();
        let models = paginate(CHILD_PAGE_SIZE, move |request| {
            api.list_collections(database_id, request.to_queries())
        })
        .await?;

        let mut collections = Vec::with_capacity(models.len());
        for model in models {
            let mut collection = Collection::new(self.model.id.clone(), model, self.api.clone());
            collection.init().await?;
            collections.push(collection);
        }

        tracing::debug!(
            target: TRACING_TARGET_TREE,
            database_id = %self.model.id,
            collections = collections.len(),
            "Database initialized"
        );

        self.collections = NodeState::Ready(collections);
        Ok(())
    }

    /// Returns every collection.
    pub fn collection_list(&self) -> Result<&[Collection]> {
        self.collections.items(&self.describe())
    }

    /// Returns the only collection with the given display name.
    pub fn get_collection(&self, name: &str) -> Result<&Collection> {
        find_unique(self.collection_list()?, name, "collection", &self.describe())
    }

    /// Returns the collection with the given ID, if any.
    pub fn collection_by_id(&self, id: &str) -> Result<Option<&Collection>> {
        Ok(self
            .collection_list()?
            .iter()
            .find(|collection| collection.id() == id))
    }

    /// Iterates over the collections in listing order.
    pub fn iter(&self) -> Result<slice::Iter<'_, Collection>> {
        Ok(self.collection_list()?.iter())
    }
}

impl Named for Database {
    fn lookup_name(&self) -> &str {
        self.name()
    }
}
