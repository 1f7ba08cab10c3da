//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── project: ProjectOptions  # Project ID, endpoint, credentials
//! ├── http: ReqwestConfig      # HTTP timeout and user agent
//! └── command: Command         # tree | query | delete
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.

mod command;

use std::process;

use awdb_core::ProjectOptions;
use awdb_core::reqwest::ReqwestConfig;
use clap::Parser;
pub use command::{Command, TargetArgs};
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "awdb")]
#[command(about = "Browse and bulk-edit Appwrite databases")]
#[command(version)]
pub struct Cli {
    /// Project connection options.
    #[clap(flatten)]
    pub project: ProjectOptions,

    /// HTTP client configuration.
    #[clap(flatten)]
    pub http: ReqwestConfig,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments, so its variables
    /// act as defaults for the `env` bindings.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Logs configuration at debug level (no sensitive information).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            features = ?enabled_features(),
            "Build information"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            project_id = ?self.project.project_id,
            endpoint = ?self.project.endpoint,
            api_key = self.project.api_key.is_some(),
            self_signed = self.project.self_signed,
            http_timeout_secs = self.http.http_timeout,
            command = self.command.name(),
            "Configuration"
        );
    }
}

/// Returns a list of enabled compile-time features.
fn enabled_features() -> Vec<&'static str> {
    [cfg!(feature = "dotenv").then_some("dotenv")]
        .into_iter()
        .flatten()
        .collect()
}
