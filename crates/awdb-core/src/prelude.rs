//! Prelude module for awdb-core.
//!
//! This module re-exports the most commonly used types and traits from awdb-core,
//! making it easy to import everything you need with a single `use` statement.

pub use crate::{
    Attribute, BulkProgress, Collection, Database, DatabaseApi, Databases, DeleteOptions,
    Document, DocumentCursor, DocumentId, Error, ErrorKind, Index, InitProjectOptions,
    InsertOptions, Project, ProjectOptions, Query, QueryControl, QueryItem, QueryOptions, Result,
    SharedApi, UpdateOptions,
};
