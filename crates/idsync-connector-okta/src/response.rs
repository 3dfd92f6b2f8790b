//! Okta response classification: next-page cursor, rate-limit state and the
//! error envelope.

use chrono::DateTime;
use reqwest::header::{HeaderMap, LINK};
use serde::Deserialize;
use url::Url;

use idsync_connector::annotations::{Annotations, RateLimitDescription};

/// Access to the requested resource is denied.
pub const ACCESS_DENIED_ERROR_CODE: &str = "E0000006";
/// Resource not found.
pub const RESOURCE_NOT_FOUND_ERROR_CODE: &str = "E0000007";
/// Resource not found (alternate form returned by some endpoints).
pub const NOT_FOUND_ERROR_CODE: &str = "E0000008";
/// Role is already assigned to the principal.
pub const ALREADY_ASSIGNED_ERROR_CODE: &str = "E0000090";
/// API call exceeded rate limit.
pub const RATE_LIMIT_ERROR_CODE: &str = "E0000047";

const RATE_LIMIT_LIMIT: &str = "X-Rate-Limit-Limit";
const RATE_LIMIT_REMAINING: &str = "X-Rate-Limit-Remaining";
const RATE_LIMIT_RESET: &str = "X-Rate-Limit-Reset";

/// Error body returned by the Okta API on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OktaApiError {
    #[serde(default)]
    pub error_code: String,
    #[serde(default)]
    pub error_summary: String,
    #[serde(default)]
    pub error_link: String,
    #[serde(default)]
    pub error_id: String,
    #[serde(default)]
    pub error_causes: Vec<OktaErrorCause>,
}

/// One entry of `errorCauses`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OktaErrorCause {
    #[serde(default)]
    pub error_summary: String,
}

impl OktaApiError {
    /// Build an envelope for a response whose body is not an Okta error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let summary = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            body.chars().take(256).collect()
        };
        Self {
            error_summary: summary,
            ..Default::default()
        }
    }

    /// Parse an error body, falling back to the raw text.
    pub fn parse(status: u16, body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| Self::from_status(status, body))
    }
}

/// Classification of an upstream failure.
///
/// Only the codes listed in [`ErrorCodeClass::of`] are recognised; every
/// other code is left to the caller as an unclassified upstream error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCodeClass {
    NotFound,
    AccessDenied,
    Unclassified,
}

impl ErrorCodeClass {
    /// Classify by error code alone.
    pub fn of(code: &str) -> Self {
        match code {
            RESOURCE_NOT_FOUND_ERROR_CODE | NOT_FOUND_ERROR_CODE => ErrorCodeClass::NotFound,
            ACCESS_DENIED_ERROR_CODE => ErrorCodeClass::AccessDenied,
            _ => ErrorCodeClass::Unclassified,
        }
    }

    /// Classify by error code, falling back to the HTTP status.
    pub fn classify(status: u16, code: &str) -> Self {
        match Self::of(code) {
            ErrorCodeClass::Unclassified if status == 403 => ErrorCodeClass::AccessDenied,
            ErrorCodeClass::Unclassified if status == 404 => ErrorCodeClass::NotFound,
            class => class,
        }
    }
}

/// Transient view of an upstream response used to derive the next cursor and
/// annotations.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub status: u16,
    pub headers: HeaderMap,
}

impl ResponseContext {
    pub fn new(status: u16, headers: HeaderMap) -> Self {
        Self { status, headers }
    }

    /// Context for a response served from the local cache.
    pub fn cached() -> Self {
        Self::new(200, HeaderMap::new())
    }

    /// Cursor for the next page, empty when there is none.
    pub fn next_cursor(&self) -> String {
        next_cursor(&self.headers)
    }

    /// Rate-limit state, if the response reported it.
    pub fn rate_limit(&self) -> Option<RateLimitDescription> {
        rate_limit(&self.headers)
    }

    /// Annotations to attach to the page built from this response.
    pub fn annotations(&self) -> Annotations {
        let mut annos = Annotations::new();
        if let Some(desc) = self.rate_limit() {
            annos.with_rate_limiting(desc);
        }
        annos
    }
}

/// Extract the `after` cursor from the `rel="next"` entry of the `Link`
/// header(s).
pub fn next_cursor(headers: &HeaderMap) -> String {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(parse_link_entry)
        .find(|(_, rel)| *rel == "next")
        .and_then(|(target, _)| after_param(target))
        .unwrap_or_default()
}

fn parse_link_entry(entry: &str) -> Option<(&str, &str)> {
    let mut parts = entry.split(';');
    let target = parts
        .next()?
        .trim()
        .strip_prefix('<')?
        .strip_suffix('>')?;
    let rel = parts
        .filter_map(|p| p.trim().strip_prefix("rel="))
        .map(|r| r.trim_matches('"'))
        .next()?;
    Some((target, rel))
}

/// The `after` query parameter of an absolute or relative link.
pub fn after_param(href: &str) -> Option<String> {
    let base = Url::parse("https://localhost").ok()?;
    let url = base.join(href).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "after")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Rate-limit state from the `X-Rate-Limit-*` headers. Missing or
/// unparsable headers yield `None`.
pub fn rate_limit(headers: &HeaderMap) -> Option<RateLimitDescription> {
    let header_i64 = |name: &str| -> Option<i64> {
        headers.get(name)?.to_str().ok()?.trim().parse().ok()
    };

    let limit = header_i64(RATE_LIMIT_LIMIT)?;
    let remaining = header_i64(RATE_LIMIT_REMAINING)?;
    let reset_at = DateTime::from_timestamp(header_i64(RATE_LIMIT_RESET)?, 0)?;

    Some(RateLimitDescription {
        limit,
        remaining,
        reset_at,
    })
}
