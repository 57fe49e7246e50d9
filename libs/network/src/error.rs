//! Transport Error Types
//!
//! Error handling for endpoint lookup, socket lifecycle and dispatch hook
//! registration. Completion-time failures are not errors here: they travel
//! as a [`RequestState`](crate::RequestState) inside a completion.

use thiserror::Error;

/// Main transport error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Endpoint is not part of the fabric
    #[error("Unknown endpoint {endpoint}")]
    UnknownEndpoint { endpoint: u32 },

    /// Socket was closed before or during the operation
    #[error("Socket closed: endpoint {endpoint}")]
    Closed { endpoint: u32 },

    /// A different default-receive hook is already installed
    #[error("Default receive hook already registered on endpoint {endpoint}")]
    HookAlreadyRegistered { endpoint: u32 },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Resource exhaustion errors
    #[error("Resource exhausted: {resource}: {message}")]
    ResourceExhausted { resource: String, message: String },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Create a resource exhausted error
    pub fn resource_exhausted(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceExhausted {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Check if retrying the same call can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::ResourceExhausted { .. } => true,
            TransportError::UnknownEndpoint { .. }
            | TransportError::Closed { .. }
            | TransportError::HookAlreadyRegistered { .. }
            | TransportError::Configuration { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::UnknownEndpoint { .. } => "endpoint",
            TransportError::Closed { .. } => "closed",
            TransportError::HookAlreadyRegistered { .. } => "hook",
            TransportError::Configuration { .. } => "configuration",
            TransportError::ResourceExhausted { .. } => "resource_exhausted",
        }
    }
}
