//! Query clauses understood by the Appwrite listing endpoints.
//!
//! Every clause is sent as a JSON object of the form
//! `{"method": "...", "attribute": "...", "values": [...]}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// The operation of a single query clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryMethod {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Between,
    Contains,
    Search,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    Select,
    OrderAsc,
    OrderDesc,
    CursorAfter,
    CursorBefore,
    Limit,
    Offset,
}

/// A single filter, sort, projection or paging clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// The clause operation.
    pub method: QueryMethod,
    /// The attribute the clause applies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Operands of the clause.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
}

impl Query {
    fn new(method: QueryMethod, attribute: Option<String>, values: Vec<Value>) -> Self {
        Self {
            method,
            attribute,
            values,
        }
    }

    fn filter(method: QueryMethod, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        let values = match value.into() {
            Value::Array(values) => values,
            value => vec![value],
        };

        Self::new(method, Some(attribute.into()), values)
    }

    /// Matches documents whose attribute equals the value (or any of the values of an array).
    pub fn equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(QueryMethod::Equal, attribute, value)
    }

    pub fn not_equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(QueryMethod::NotEqual, attribute, value)
    }

    pub fn less_than(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(QueryMethod::LessThan, attribute, value)
    }

    pub fn less_than_equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(QueryMethod::LessThanEqual, attribute, value)
    }

    pub fn greater_than(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(QueryMethod::GreaterThan, attribute, value)
    }

    pub fn greater_than_equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(QueryMethod::GreaterThanEqual, attribute, value)
    }

    pub fn between(
        attribute: impl Into<String>,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Self {
        Self::new(
            QueryMethod::Between,
            Some(attribute.into()),
            vec![start.into(), end.into()],
        )
    }

    pub fn contains(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(QueryMethod::Contains, attribute, value)
    }

    /// Full-text search; requires a fulltext index on the attribute.
    pub fn search(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::filter(QueryMethod::Search, attribute, value.into())
    }

    pub fn starts_with(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::filter(QueryMethod::StartsWith, attribute, value.into())
    }

    pub fn ends_with(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::filter(QueryMethod::EndsWith, attribute, value.into())
    }

    pub fn is_null(attribute: impl Into<String>) -> Self {
        Self::new(QueryMethod::IsNull, Some(attribute.into()), Vec::new())
    }

    pub fn is_not_null(attribute: impl Into<String>) -> Self {
        Self::new(QueryMethod::IsNotNull, Some(attribute.into()), Vec::new())
    }

    /// Restricts the returned fields.
    pub fn select<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = attributes
            .into_iter()
            .map(|attribute| Value::String(attribute.into()))
            .collect();

        Self::new(QueryMethod::Select, None, values)
    }

    pub fn order_asc(attribute: impl Into<String>) -> Self {
        Self::new(QueryMethod::OrderAsc, Some(attribute.into()), Vec::new())
    }

    pub fn order_desc(attribute: impl Into<String>) -> Self {
        Self::new(QueryMethod::OrderDesc, Some(attribute.into()), Vec::new())
    }

    /// Returns items listed strictly after the item with the given ID.
    pub fn cursor_after(id: impl Into<String>) -> Self {
        Self::new(
            QueryMethod::CursorAfter,
            None,
            vec![Value::String(id.into())],
        )
    }

    /// Returns items listed strictly before the item with the given ID.
    pub fn cursor_before(id: impl Into<String>) -> Self {
        Self::new(
            QueryMethod::CursorBefore,
            None,
            vec![Value::String(id.into())],
        )
    }

    pub fn limit(limit: u32) -> Self {
        Self::new(QueryMethod::Limit, None, vec![Value::from(limit)])
    }

    pub fn offset(offset: u32) -> Self {
        Self::new(QueryMethod::Offset, None, vec![Value::from(offset)])
    }

    /// Returns the first operand as a string, if it is one.
    pub fn first_str(&self) -> Option<&str> {
        self.values.first().and_then(Value::as_str)
    }

    /// Returns the first operand as an unsigned integer, if it is one.
    pub fn first_u64(&self) -> Option<u64> {
        self.values.first().and_then(Value::as_u64)
    }

    /// Encodes the clause in the wire format expected by the API.
    pub fn to_query_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

impl FromStr for Query {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| {
            Error::serialization()
                .with_message(format!("Invalid query clause '{s}'"))
                .with_source(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn limit_wire_format() {
        let query = Query::limit(25);
        assert_eq!(query.to_string(), r#"{"method":"limit","values":[25]}"#);
    }

    #[test]
    fn cursor_after_wire_format() {
        let query = Query::cursor_after("65f1a");
        assert_eq!(
            query.to_string(),
            r#"{"method":"cursorAfter","values":["65f1a"]}"#
        );
    }

    #[test]
    fn equal_flattens_arrays() {
        let query = Query::equal("role", json!(["admin", "owner"]));
        assert_eq!(query.attribute.as_deref(), Some("role"));
        assert_eq!(query.values, vec![json!("admin"), json!("owner")]);

        let query = Query::equal("role", "admin");
        assert_eq!(query.values, vec![json!("admin")]);
    }

    #[test]
    fn order_has_no_values() {
        let query = Query::order_desc("$createdAt");
        assert_eq!(
            query.to_string(),
            r#"{"method":"orderDesc","attribute":"$createdAt"}"#
        );
    }

    #[test]
    fn parse_from_json() {
        let query: Query = r#"{"method":"greaterThan","attribute":"age","values":[18]}"#
            .parse()
            .unwrap();

        assert_eq!(query.method, QueryMethod::GreaterThan);
        assert_eq!(query.first_u64(), Some(18));
    }

    #[test]
    fn parse_rejects_unknown_method() {
        let error = "{\"method\":\"frobnicate\"}".parse::<Query>().unwrap_err();
        assert_eq!(error.kind, crate::ErrorKind::Serialization);
    }
}
