//! Shared error type for site adapters.

use thiserror::Error;

/// Failure from an adapter's fetch or parse step.
///
/// `Network` is transient and retried by the assembler; `Http`, `NotFound`, and
/// `Parse` are terminal. A partially recovered chapter list is not an error
/// (the record carries `partial: true` instead).
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Server rejected the request for {url} (HTTP {status})")]
    Http { status: u16, url: String },

    #[error("Not found: {url} (the story may have been removed)")]
    NotFound { url: String },

    #[error("Could not parse required field '{field}' from {origin}")]
    Parse { field: String, origin: String },
}

impl AdapterError {
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        AdapterError::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn http(status: u16, url: impl Into<String>) -> Self {
        AdapterError::Http {
            status,
            url: url.into(),
        }
    }

    pub fn not_found(url: impl Into<String>) -> Self {
        AdapterError::NotFound { url: url.into() }
    }

    pub fn parse(field: impl Into<String>, origin: impl Into<String>) -> Self {
        AdapterError::Parse {
            field: field.into(),
            origin: origin.into(),
        }
    }

    /// True for failures worth another attempt (transport only).
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Network { .. })
    }
}
