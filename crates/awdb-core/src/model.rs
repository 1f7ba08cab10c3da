//! Resource descriptors as returned by the database API.

use derive_more::{AsRef, Deref, Display, From, Into};
use jiff::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;

fn default_enabled() -> bool {
    true
}

/// Descriptor of a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseModel {
    /// Unique database ID.
    #[serde(rename = "$id")]
    pub id: String,
    /// Display name.
    pub name: String,
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(rename = "$updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    /// Disabled databases are not accessible to clients.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Descriptor of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionModel {
    /// Unique collection ID.
    #[serde(rename = "$id")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// ID of the owning database.
    #[serde(default)]
    pub database_id: String,
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(rename = "$updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(rename = "$permissions", default)]
    pub permissions: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub document_security: bool,
}

/// Opaque schema descriptor of a collection attribute.
///
/// Only the fields needed for navigation are typed; everything else the API
/// reports (size, default, elements, relationship options, ...) is kept as-is
/// in [`extra`](Self::extra).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeModel {
    /// Attribute key, unique within its collection.
    pub key: String,
    /// Attribute type (`string`, `integer`, `relationship`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Provisioning status (`available`, `processing`, ...).
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Opaque schema descriptor of a collection index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexModel {
    /// Index key, unique within its collection.
    pub key: String,
    /// Index type (`key`, `unique`, `fulltext`).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: String,
    /// Indexed attribute keys.
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Identifier of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(AsRef, Deref, Display, From, Into)]
#[serde(transparent)]
#[as_ref(forward)]
#[deref(forward)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a document ID from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh ID accepted by the API (32 lowercase hex characters).
    pub fn unique() -> Self {
        Self(uuid::Uuid::now_v7().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// A document: system fields plus arbitrary user-defined fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$collectionId", default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    #[serde(rename = "$databaseId", default, skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(rename = "$updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(rename = "$permissions", default)]
    pub permissions: Vec<String>,
    /// User-defined fields.
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Document {
    /// Creates a document with the given ID and user fields.
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            collection_id: None,
            database_id: None,
            created_at: None,
            updated_at: None,
            permissions: Vec::new(),
            data,
        }
    }

    /// Returns the document ID.
    pub fn document_id(&self) -> DocumentId {
        DocumentId::new(self.id.clone())
    }

    /// Returns a user field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Deserializes the user fields into a typed value.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn document_splits_system_and_user_fields() {
        let document: Document = serde_json::from_value(json!({
            "$id": "abc",
            "$collectionId": "users",
            "$databaseId": "main",
            "$createdAt": "2024-03-01T10:00:00.000+00:00",
            "$permissions": ["read(\"any\")"],
            "email": "a@example.com",
            "age": 42
        }))
        .unwrap();

        assert_eq!(document.id, "abc");
        assert_eq!(document.collection_id.as_deref(), Some("users"));
        assert!(document.created_at.is_some());
        assert_eq!(document.data.len(), 2);
        assert_eq!(document.get("age"), Some(&json!(42)));
    }

    #[test]
    fn document_parse_typed() {
        #[derive(Deserialize)]
        struct User {
            email: String,
        }

        let mut data = Map::new();
        data.insert("email".into(), json!("a@example.com"));
        let user: User = Document::new("u1", data).parse().unwrap();
        assert_eq!(user.email, "a@example.com");
    }

    #[test]
    fn attribute_keeps_unknown_fields() {
        let attribute: AttributeModel = serde_json::from_value(json!({
            "key": "email",
            "type": "string",
            "status": "available",
            "required": true,
            "size": 255,
            "$createdAt": "2024-03-01T10:00:00.000+00:00"
        }))
        .unwrap();

        assert_eq!(attribute.kind, "string");
        assert_eq!(attribute.extra.get("size"), Some(&json!(255)));
    }

    #[test]
    fn unique_document_ids_differ() {
        let a = DocumentId::unique();
        let b = DocumentId::unique();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }
}
