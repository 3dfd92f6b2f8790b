//! Error types for the Okta connector.

use thiserror::Error;

use idsync_connector::annotations::RateLimitDescription;
use idsync_connector::error::ConnectorError;

use crate::response::{ErrorCodeClass, OktaApiError};

/// Result type alias using `OktaError`.
pub type OktaResult<T> = Result<T, OktaError>;

/// Errors raised by the Okta HTTP client.
#[derive(Debug, Error)]
pub enum OktaError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-2xx response from the Okta API.
    #[error("Okta API error ({status}): {} {}", .error.error_code, .error.error_summary)]
    Api {
        status: u16,
        error: OktaApiError,
        rate_limit: Option<RateLimitDescription>,
    },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl OktaError {
    /// Classification of an API failure; transport failures are unclassified.
    pub fn class(&self) -> ErrorCodeClass {
        match self {
            OktaError::Api { status, error, .. } => {
                ErrorCodeClass::classify(*status, &error.error_code)
            }
            _ => ErrorCodeClass::Unclassified,
        }
    }

    pub fn is_access_denied(&self) -> bool {
        self.class() == ErrorCodeClass::AccessDenied
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorCodeClass::NotFound
    }

    /// Convert into a [`ConnectorError`], naming the operation that failed.
    pub fn context(self, operation: impl Into<String>) -> ConnectorError {
        let operation = operation.into();
        match self {
            OktaError::Api {
                status,
                error,
                rate_limit,
            } => match ErrorCodeClass::classify(status, &error.error_code) {
                ErrorCodeClass::NotFound => ConnectorError::not_found(operation),
                ErrorCodeClass::AccessDenied => ConnectorError::access_denied(operation),
                ErrorCodeClass::Unclassified => ConnectorError::Upstream {
                    operation,
                    status,
                    code: error.error_code,
                    summary: error.error_summary,
                    rate_limit,
                },
            },
            OktaError::Http(e) => ConnectorError::network_with_source(operation, e),
            OktaError::Json(e) => ConnectorError::serialization(format!("{operation}: {e}")),
            OktaError::Url(e) => ConnectorError::InvalidConfiguration {
                message: format!("{operation}: {e}"),
            },
            OktaError::Config(message) => ConnectorError::InvalidConfiguration { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16, code: &str) -> OktaError {
        OktaError::Api {
            status,
            error: OktaApiError {
                error_code: code.to_string(),
                error_summary: "summary".to_string(),
                ..Default::default()
            },
            rate_limit: None,
        }
    }

    #[test]
    fn test_context_not_found() {
        let err = api_error(404, "E0000007").context("get group 00g1");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: get group 00g1");
    }

    #[test]
    fn test_context_access_denied() {
        assert!(api_error(403, "E0000006")
            .context("list group roles")
            .is_access_denied());
        // Status alone is enough.
        assert!(api_error(403, "").is_access_denied());
    }

    #[test]
    fn test_context_unclassified_keeps_code() {
        let err = api_error(409, "E0000090").context("assign role");
        match err {
            ConnectorError::Upstream { status, code, .. } => {
                assert_eq!(status, 409);
                assert_eq!(code, "E0000090");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_display() {
        let err = api_error(400, "E0000001");
        assert_eq!(err.to_string(), "Okta API error (400): E0000001 summary");
    }
}
