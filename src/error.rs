//! Error types and handling for the deck generation pipeline

use thiserror::Error;

/// Main error type for `tripdeck`
///
/// Apart from [`TripDeckError::Validation`] and [`TripDeckError::Config`],
/// every variant is caught at the smallest scope (one source or one card)
/// and turned into a degraded score instead of aborting a deck.
#[derive(Error, Debug)]
pub enum TripDeckError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Structurally invalid travel request
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Network, timeout or HTTP error from a travel-data provider
    #[error("Source fetch error ({source_kind}): {message}")]
    SourceFetch {
        source_kind: String,
        message: String,
    },

    /// Generated content could not be parsed or broke the card's shape contract
    #[error("Generation parse error: {message}")]
    GenerationParse { message: String },

    /// Transport failure talking to the text-generation backend
    #[error("Generation backend error: {message}")]
    Backend { message: String },

    /// Rate-limit backoff ceiling exceeded for a host
    #[error("Rate limit exceeded for {host} after waiting {waited_ms}ms")]
    RateLimitExceeded { host: String, waited_ms: u64 },

    /// Outbound call exceeded its hard timeout
    #[error("{operation} timed out after {seconds:.1}s")]
    Timeout { operation: String, seconds: f64 },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl TripDeckError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new source fetch error
    pub fn source_fetch<K: Into<String>, S: Into<String>>(source_kind: K, message: S) -> Self {
        Self::SourceFetch {
            source_kind: source_kind.into(),
            message: message.into(),
        }
    }

    /// Create a new generation parse error
    pub fn generation_parse<S: Into<String>>(message: S) -> Self {
        Self::GenerationParse {
            message: message.into(),
        }
    }

    /// Create a new backend error
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(operation: S, seconds: f64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Whether this error must abort a deck before any work starts
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Config { .. })
    }

    /// Re-label a provider-side failure as a fetch error for `source_kind`.
    ///
    /// Rate-limit and timeout failures past their ceiling degrade the source
    /// exactly like a network error does.
    #[must_use]
    pub fn into_source_fetch(self, source_kind: &str) -> Self {
        match self {
            Self::SourceFetch { .. } => self,
            other => Self::source_fetch(source_kind, other.to_string()),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            TripDeckError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            TripDeckError::Validation { message } => format!("Invalid input: {message}"),
            TripDeckError::SourceFetch { source_kind, .. } => {
                format!("Travel data for {source_kind} is currently unavailable.")
            }
            TripDeckError::GenerationParse { .. } | TripDeckError::Backend { .. } => {
                "Some trip details were generated with limited information.".to_string()
            }
            TripDeckError::RateLimitExceeded { .. } => {
                "Too many requests to an external service. Please try again shortly.".to_string()
            }
            TripDeckError::Timeout { .. } => {
                "An external service took too long to respond.".to_string()
            }
            TripDeckError::Cache { .. } => {
                "Cache operation failed. You may need to clear your cache.".to_string()
            }
            TripDeckError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}
