//! Subcommands.

use awdb_core::{Query, QueryOptions};
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};

/// What to do once the project is connected.
#[derive(Debug, Clone, Subcommand, Serialize, Deserialize)]
pub enum Command {
    /// Print every database, collection, attribute and index.
    Tree,

    /// Print matching documents as JSON lines.
    Query {
        #[clap(flatten)]
        target: TargetArgs,

        /// Stop after this many documents
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Delete matching documents one at a time.
    Delete {
        #[clap(flatten)]
        target: TargetArgs,

        /// Delete at most this many documents
        #[arg(long)]
        limit: Option<u64>,
    },
}

impl Command {
    /// Returns the subcommand name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Query { .. } => "query",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Collection and filters a document command applies to.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct TargetArgs {
    /// Database name
    #[arg(long)]
    pub database: String,

    /// Collection name
    #[arg(long)]
    pub collection: String,

    /// Query clause as JSON, repeatable
    #[arg(long = "query")]
    pub queries: Vec<Query>,

    /// Documents fetched per page
    #[arg(long)]
    pub per_page: Option<u32>,

    /// Documents skipped before the first page
    #[arg(long)]
    pub offset: Option<u32>,
}

impl TargetArgs {
    /// Builds the query options of the command.
    pub fn query_options(&self) -> QueryOptions {
        let mut options = QueryOptions::default().with_queries(self.queries.iter().cloned());
        if let Some(per_page) = self.per_page {
            options = options.with_items_per_page(per_page);
        }
        if let Some(offset) = self.offset {
            options = options.with_offset(offset);
        }
        options
    }
}
