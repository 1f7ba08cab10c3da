#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for cursor pagination over listing endpoints.
///
/// Use this target for logging page fetches performed while materializing child lists.
pub const TRACING_TARGET_PAGINATION: &str = "awdb_core::pagination";

/// Tracing target for resource tree initialization.
///
/// Use this target for logging project, database and collection initialization.
pub const TRACING_TARGET_TREE: &str = "awdb_core::tree";

/// Tracing target for document queries.
pub const TRACING_TARGET_QUERY: &str = "awdb_core::query";

/// Tracing target for single and bulk document mutations.
pub const TRACING_TARGET_BULK: &str = "awdb_core::bulk";

mod api;
mod attribute;
mod bulk;
mod collection;
mod cursor;
mod database;
mod error;
mod index;
mod lookup;
mod model;
mod node;
mod pagination;
mod project;
mod query;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod reqwest;

#[doc(hidden)]
pub mod prelude;

pub use api::{DatabaseApi, ListPage, SharedApi};
pub use attribute::Attribute;
pub use bulk::{BulkCallback, BulkProgress, DeleteOptions, InsertOptions, UpdateOptions};
pub use collection::Collection;
pub use cursor::{DEFAULT_ITEMS_PER_PAGE, DocumentCursor, QueryControl, QueryItem, QueryOptions};
pub use database::{Database, Databases};
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use index::Index;
pub use lookup::Named;
pub use model::{AttributeModel, CollectionModel, DatabaseModel, Document, DocumentId, IndexModel};
pub use node::NodeState;
pub use pagination::{
    CHILD_PAGE_SIZE, DATABASE_PAGE_SIZE, PageCursor, PageRequest, Paginated, paginate,
};
pub use project::{
    API_KEY_ENV, ConnectionSettings, DEFAULT_ENDPOINT, InitProjectOptions, PROJECT_ID_ENV, Project,
    ProjectOptions,
};
pub use query::{Query, QueryMethod};
