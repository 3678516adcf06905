//! Error types for the reconciliation engine
//!
//! Every fallible operation in the crate returns [`Result`]. The variants
//! follow the lifecycle of a reconciliation pass: configuration problems are
//! fatal before any network call, fetch and apply failures are scoped to a
//! zone or a single correction, and rate limiting is transient.

use thiserror::Error;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the reconciliation engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (credentials, unknown backends, bad declarations)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A declared record type the backend cannot handle
    #[error("Provider {provider} does not support {record_type} records{}", caveat.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
    UnsupportedRecordType {
        /// Backend name
        provider: String,
        /// The offending record type
        record_type: String,
        /// Caveat text from the capability descriptor, if any
        caveat: Option<String>,
    },

    /// A record whose label or target cannot be canonicalized
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Retrieving the actual state of a zone failed
    #[error("Failed to fetch records for zone {zone}: {source}")]
    Fetch {
        /// Zone origin
        zone: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// Executing a correction failed
    #[error("Failed to apply correction '{correction}': {source}")]
    Apply {
        /// First line of the correction description
        correction: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// The backend asked us to slow down
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The adapter does not provide the requested operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Zone or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP transport errors (from adapter APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create an unsupported-operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Wrap a failure that happened while fetching a zone
    pub fn fetch(zone: impl Into<String>, source: Error) -> Self {
        Self::Fetch {
            zone: zone.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure that happened while executing a correction
    pub fn apply(correction: impl Into<String>, source: Error) -> Self {
        Self::Apply {
            correction: correction.into(),
            source: Box::new(source),
        }
    }

    /// Whether this is the distinguished rate-limit signal
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Whether this error stops processing before any network call
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::UnsupportedRecordType { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_keeps_source() {
        let err = Error::fetch("example.com", Error::rate_limited("HTTP 429"));
        assert!(err.to_string().contains("example.com"));
        assert!(err.to_string().contains("HTTP 429"));
        assert!(!err.is_rate_limited());

        let source = std::error::Error::source(&err).expect("fetch errors carry a source");
        assert_eq!(source.to_string(), "Rate limited: HTTP 429");
    }

    #[test]
    fn unsupported_record_type_mentions_caveat() {
        let err = Error::UnsupportedRecordType {
            provider: "powerdns".to_string(),
            record_type: "URL".to_string(),
            caveat: Some("redirects are not DNS".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Provider powerdns does not support URL records (redirects are not DNS)"
        );
        assert!(err.is_configuration());
    }
}
