//! Attribute leaf node.

use crate::{AttributeModel, Named};

/// An attribute of a collection.
///
/// Wraps the schema descriptor reported by the API together with the identity
/// of the owning collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    database_id: String,
    collection_id: String,
    model: AttributeModel,
}

impl Attribute {
    pub(crate) fn new(
        database_id: impl Into<String>,
        collection_id: impl Into<String>,
        model: AttributeModel,
    ) -> Self {
        Self {
            database_id: database_id.into(),
            collection_id: collection_id.into(),
            model,
        }
    }

    /// Returns the attribute key.
    pub fn key(&self) -> &str {
        &self.model.key
    }

    /// Returns the attribute type (`string`, `integer`, ...).
    pub fn kind(&self) -> &str {
        &self.model.kind
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    /// Returns the full schema descriptor.
    pub fn model(&self) -> &AttributeModel {
        &self.model
    }
}

impl Named for Attribute {
    fn lookup_name(&self) -> &str {
        self.key()
    }
}
