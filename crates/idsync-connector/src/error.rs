//! Connector Framework error types
//!
//! Error taxonomy shared by every connector. Each variant keeps enough context
//! (operation name, resource id) for logging without carrying credentials.

use thiserror::Error;

use crate::annotations::RateLimitDescription;

/// Error that can occur during sync or provisioning operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Upstream entity is absent.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// The credential lacks permission for the operation.
    #[error("access denied for {operation}")]
    AccessDenied { operation: String },

    /// A serialized page token could not be decoded or is inconsistent.
    #[error("invalid page token: {message}")]
    InvalidToken { message: String },

    /// Caller input is malformed (missing profile field, bad value type, ...).
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// The request is well formed but not allowed by connector policy.
    #[error("policy violation: {message}")]
    PolicyViolation { message: String },

    /// Any other non-2xx upstream response. Throttled responses keep the
    /// rate-limit state reported alongside them.
    #[error("{operation} failed with status {status}: {code} {summary}")]
    Upstream {
        operation: String,
        status: u16,
        code: String,
        summary: String,
        rate_limit: Option<RateLimitDescription>,
    },

    /// Transport-level failure reaching the upstream API.
    #[error("{operation}: network error: {message}")]
    Network {
        operation: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Connector configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Response body or payload could not be (de)serialized.
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl ConnectorError {
    /// Whether this error reports an absent upstream entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConnectorError::NotFound { .. })
    }

    /// Whether this error reports a permission gap.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, ConnectorError::AccessDenied { .. })
    }

    /// Rate-limit state carried by an upstream failure.
    pub fn rate_limit(&self) -> Option<&RateLimitDescription> {
        match self {
            ConnectorError::Upstream { rate_limit, .. } => rate_limit.as_ref(),
            _ => None,
        }
    }

    /// Check if retrying the same call cannot succeed.
    ///
    /// Retry itself belongs to the transport; this only classifies.
    pub fn is_permanent(&self) -> bool {
        match self {
            ConnectorError::Network { .. } => false,
            ConnectorError::Upstream { status, .. } => !(*status == 429 || *status >= 500),
            _ => true,
        }
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::NotFound { .. } => "NOT_FOUND",
            ConnectorError::AccessDenied { .. } => "ACCESS_DENIED",
            ConnectorError::InvalidToken { .. } => "INVALID_TOKEN",
            ConnectorError::Validation { .. } => "VALIDATION_ERROR",
            ConnectorError::PolicyViolation { .. } => "POLICY_VIOLATION",
            ConnectorError::Upstream { .. } => "UPSTREAM_ERROR",
            ConnectorError::Network { .. } => "NETWORK_ERROR",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::Serialization { .. } => "SERIALIZATION_ERROR",
        }
    }

    // Convenience constructors

    /// Create a not-found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        ConnectorError::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an access-denied error.
    pub fn access_denied(operation: impl Into<String>) -> Self {
        ConnectorError::AccessDenied {
            operation: operation.into(),
        }
    }

    /// Create an invalid page token error.
    pub fn invalid_token(message: impl Into<String>) -> Self {
        ConnectorError::InvalidToken {
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ConnectorError::Validation {
            message: message.into(),
        }
    }

    /// Create a policy violation error.
    pub fn policy_violation(message: impl Into<String>) -> Self {
        ConnectorError::PolicyViolation {
            message: message.into(),
        }
    }

    /// Create a network error with source.
    pub fn network_with_source(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::Network {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        ConnectorError::Serialization {
            message: message.into(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
