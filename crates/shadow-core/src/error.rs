//! Error types for shadow-core

use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Result type alias using shadow-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shadow-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A write was attempted without a resolvable identity
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The comments table does not exist on the remote store
    #[error("Comments table missing: {0}")]
    TableMissing(RemoteError),

    /// The remote store rejected the request by policy
    #[error("Permission denied: {0}")]
    PermissionDenied(RemoteError),

    /// Any other remote/transport failure
    #[error("Remote error: {0}")]
    Remote(RemoteError),

    /// Comment body was empty after trimming
    #[error("Comment body cannot be empty")]
    EmptyBody,

    /// No thread is selected
    #[error("No thread selected")]
    NoThread,

    /// Could not derive a thread id from user input
    #[error("Invalid video reference: {0}")]
    InvalidVideoReference(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// The raw backend error behind a remote failure, if any.
    #[must_use]
    pub const fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::TableMissing(error) | Self::PermissionDenied(error) | Self::Remote(error) => {
                Some(error)
            }
            _ => None,
        }
    }
}

impl From<RemoteError> for Error {
    fn from(error: RemoteError) -> Self {
        match Diagnostics::classify(&error).kind() {
            DiagnosticKind::TableMissing => Self::TableMissing(error),
            DiagnosticKind::PermissionDenied => Self::PermissionDenied(error),
            DiagnosticKind::Generic => Self::Remote(error),
        }
    }
}

/// Raw error reported by the remote store or its transport.
///
/// `code` carries the vendor code (Postgres SQLSTATE or PostgREST `PGRST…`)
/// when the transport surfaces one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteError {
    pub code: Option<String>,
    pub message: String,
    pub details: Option<String>,
    pub hint: Option<String>,
    pub status: Option<u16>,
}

impl RemoteError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            ..Self::default()
        }
    }

    /// An error without a machine code, e.g. a dropped connection.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Parse a PostgREST error response.
    ///
    /// Falls back to the raw body (or `HTTP <status>`) when it is not JSON.
    pub fn from_http(status: u16, body: &str) -> Self {
        if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
            if let Some(message) = payload.message.or(payload.msg).or(payload.error) {
                return Self {
                    code: payload.code.filter(|code| !code.trim().is_empty()),
                    message: message.trim().to_string(),
                    details: payload.details,
                    hint: payload.hint,
                    status: Some(status),
                };
            }
        }

        let trimmed = body.trim();
        let message = if trimmed.is_empty() {
            format!("HTTP {status}")
        } else {
            crate::util::compact_text(trimmed)
        };
        Self {
            message,
            status: Some(status),
            ..Self::default()
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code} {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
    msg: Option<String>,
    error: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_http_parses_postgrest_body() {
        let body = r#"{"code":"42P01","details":null,"hint":null,"message":"relation \"public.shadow_comments\" does not exist"}"#;
        let error = RemoteError::from_http(404, body);
        assert_eq!(error.code.as_deref(), Some("42P01"));
        assert_eq!(error.status, Some(404));
        assert!(error.message.contains("does not exist"));
        assert_eq!(
            error.to_string(),
            "42P01 relation \"public.shadow_comments\" does not exist"
        );
    }

    #[test]
    fn from_http_falls_back_to_plain_text() {
        let error = RemoteError::from_http(502, "  upstream timed out ");
        assert_eq!(error.code, None);
        assert_eq!(error.message, "upstream timed out");

        let empty = RemoteError::from_http(503, "");
        assert_eq!(empty.message, "HTTP 503");
    }

    #[test]
    fn remote_errors_map_onto_taxonomy() {
        let missing: Error = RemoteError::new("42P01", "relation does not exist").into();
        assert!(matches!(missing, Error::TableMissing(_)));

        let denied: Error = RemoteError::new("42501", "permission denied for table").into();
        assert!(matches!(denied, Error::PermissionDenied(_)));

        let generic: Error = RemoteError::transport("connection reset").into();
        assert!(matches!(generic, Error::Remote(_)));
        assert_eq!(generic.remote().map(|e| e.message.as_str()), Some("connection reset"));
        assert!(Error::NotAuthenticated.remote().is_none());
    }
}
