//! Structured error handling for resource tree, query and mutation operations.

use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Type alias for boxed dynamic errors that can be sent across threads.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for Results with our custom Error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Categories of errors that can occur in awdb operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// A lookup by name matched zero or more than one entry.
    NotFoundOrAmbiguous,
    /// The underlying API call failed (network, HTTP status, authentication).
    Transport,
    /// A node was initialized twice or read before initialization.
    Misuse,
    /// Configuration error.
    Configuration,
    /// Serialization/deserialization error.
    Serialization,
    /// A bulk operation callback failed.
    Callback,
    /// Unknown error occurred.
    #[default]
    Unknown,
}

/// Structured error type with classification and context tracking.
#[must_use]
#[derive(Debug, Error)]
#[error(
    "[{kind}]{}{}",
    status.as_ref().map(|s| format!(" (HTTP {s})")).unwrap_or_default(),
    message.as_ref().map(|m| format!(": {m}")).unwrap_or_default()
)]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Primary error message.
    pub message: Option<String>,
    /// HTTP status code reported by the remote API, if any.
    pub status: Option<u16>,
    /// Underlying source error, if any.
    #[source]
    pub source: Option<BoxedError>,
}

impl Error {
    /// Creates a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            status: None,
            source: None,
        }
    }

    /// Creates a new error from a source error.
    pub fn from_source(kind: ErrorKind, source: impl Into<BoxedError>) -> Self {
        Self {
            kind,
            message: None,
            status: None,
            source: Some(source.into()),
        }
    }

    /// Creates a new not-found-or-ambiguous error.
    pub fn not_found_or_ambiguous() -> Self {
        Self::new(ErrorKind::NotFoundOrAmbiguous)
    }

    /// Creates a new transport error.
    pub fn transport() -> Self {
        Self::new(ErrorKind::Transport)
    }

    /// Creates a new misuse error.
    pub fn misuse() -> Self {
        Self::new(ErrorKind::Misuse)
    }

    /// Creates a new configuration error.
    pub fn configuration() -> Self {
        Self::new(ErrorKind::Configuration)
    }

    /// Creates a new serialization error.
    pub fn serialization() -> Self {
        Self::new(ErrorKind::Serialization)
    }

    /// Creates a new callback error.
    pub fn callback() -> Self {
        Self::new(ErrorKind::Callback)
    }

    /// Adds a message to this error.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the HTTP status code reported by the remote API.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the source of the error.
    pub fn with_source(mut self, source: impl Into<BoxedError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns `true` if this error was raised by the underlying API.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::from_source(ErrorKind::Serialization, error).with_message("Invalid JSON payload")
    }
}

impl From<url::ParseError> for Error {
    fn from(error: url::ParseError) -> Self {
        Self::from_source(ErrorKind::Configuration, error).with_message("Invalid endpoint URL")
    }
}
