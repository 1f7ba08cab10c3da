//! Index leaf node.

use crate::{IndexModel, Named};

/// An index of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    database_id: String,
    collection_id: String,
    model: IndexModel,
}

impl Index {
    pub(crate) fn new(
        database_id: impl Into<String>,
        collection_id: impl Into<String>,
        model: IndexModel,
    ) -> Self {
        Self {
            database_id: database_id.into(),
            collection_id: collection_id.into(),
            model,
        }
    }

    /// Returns the index key.
    pub fn key(&self) -> &str {
        &self.model.key
    }

    /// Returns the index type (`key`, `unique`, `fulltext`).
    pub fn kind(&self) -> &str {
        &self.model.kind
    }

    /// Returns the indexed attribute keys.
    pub fn attributes(&self) -> &[String] {
        &self.model.attributes
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    pub fn model(&self) -> &IndexModel {
        &self.model
    }
}

impl Named for Index {
    fn lookup_name(&self) -> &str {
        self.key()
    }
}
