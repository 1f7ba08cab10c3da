//! Reqwest-based REST client for the Appwrite database API.
//!
//! This module provides a reqwest-based implementation of the [`DatabaseApi`] trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use awdb_core::reqwest::{AppwriteClient, ReqwestConfig};
//! use awdb_core::{Databases, ProjectOptions};
//!
//! let settings = ProjectOptions::new("my-project").with_api_key(key).resolve()?;
//! let client = AppwriteClient::new(settings, ReqwestConfig::default())?;
//!
//! let mut databases = Databases::new("my-project", Arc::new(client));
//! databases.init().await?;
//! ```
//!
//! [`DatabaseApi`]: crate::DatabaseApi

mod client;
mod config;
mod error;

pub use client::AppwriteClient;
pub use config::ReqwestConfig;
pub use error::{Error, Result};

/// Tracing target for REST client operations.
pub const TRACING_TARGET: &str = "awdb_core::client";
