//! Error types for the REST client.

use thiserror::Error;

/// Result type alias for REST client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for REST client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A configured value cannot be sent as a header.
    #[error("Invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
    /// The endpoint cannot be extended with path segments.
    #[error("Endpoint is not a base URL")]
    Endpoint,
    /// The API answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        kind: Option<String>,
        message: String,
    },
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Reqwest(e) => {
                let message = if e.is_timeout() {
                    "Request timed out".to_owned()
                } else if e.is_connect() {
                    "Connection failed".to_owned()
                } else {
                    e.to_string()
                };

                let error = crate::Error::transport().with_message(message);
                let error = match e.status() {
                    Some(status) => error.with_status(status.as_u16()),
                    None => error,
                };
                error.with_source(e)
            }
            Error::Serde(e) => crate::Error::serialization()
                .with_message(e.to_string())
                .with_source(e),
            Error::Header(e) => crate::Error::configuration()
                .with_message("Invalid header value")
                .with_source(e),
            Error::Endpoint => {
                crate::Error::configuration().with_message("Endpoint is not a base URL")
            }
            Error::Api {
                status,
                kind,
                message,
            } => {
                let message = match kind {
                    Some(kind) => format!("{message} ({kind})"),
                    None => message,
                };
                crate::Error::transport()
                    .with_status(status)
                    .with_message(message)
            }
        }
    }
}
