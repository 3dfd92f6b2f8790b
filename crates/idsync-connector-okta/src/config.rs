//! Okta connector configuration.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use idsync_connector::error::{ConnectorError, ConnectorResult};
use idsync_connector::pagination::{Token, DEFAULT_PAGE_SIZE};

/// Largest page size the Okta list endpoints accept.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Configuration for one Okta tenant.
#[derive(Debug, Deserialize)]
pub struct OktaConfig {
    /// Okta org domain (e.g. "acme.okta.com"), without scheme.
    pub domain: String,

    /// API token. When absent the connector cannot reach Okta and
    /// `validate` is a no-op.
    #[serde(default, alias = "api-token")]
    pub api_token: Option<SecretString>,

    /// Email domains whose users are in scope. Empty means no users sync.
    #[serde(default, alias = "ciam-email-domains")]
    pub ciam_email_domains: Vec<String>,

    /// Cache single-resource GET responses.
    #[serde(default = "default_cache")]
    pub cache: bool,

    /// Seconds a cached response may stay idle.
    #[serde(default = "default_cache_tti_secs", alias = "cache-tti")]
    pub cache_tti_secs: u64,

    /// Seconds a cached response may live.
    #[serde(default = "default_cache_ttl_secs", alias = "cache-ttl")]
    pub cache_ttl_secs: u64,

    /// Leave secondary emails out of synced users.
    #[serde(default, alias = "skip-secondary-emails")]
    pub skip_secondary_emails: bool,

    /// Sync custom administrator roles in addition to the standard ones.
    #[serde(default, alias = "sync-custom-roles")]
    pub sync_custom_roles: bool,

    /// Enable group membership provisioning and account creation.
    #[serde(default, alias = "okta-provisioning")]
    pub okta_provisioning: bool,

    /// Page size used when the caller does not request one.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// HTTP request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Override for the API base URL (testing only).
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_cache() -> bool {
    true
}

fn default_cache_tti_secs() -> u64 {
    60
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl OktaConfig {
    /// Create a config for `domain` with defaults.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            api_token: None,
            ciam_email_domains: Vec::new(),
            cache: default_cache(),
            cache_tti_secs: default_cache_tti_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            skip_secondary_emails: false,
            sync_custom_roles: false,
            okta_provisioning: false,
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            base_url: None,
        }
    }

    /// Set the API token.
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(SecretString::new(token.into()));
        self
    }

    /// Set the in-scope email domains.
    #[must_use]
    pub fn with_ciam_email_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ciam_email_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_skip_secondary_emails(mut self, skip: bool) -> Self {
        self.skip_secondary_emails = skip;
        self
    }

    #[must_use]
    pub fn with_sync_custom_roles(mut self, enabled: bool) -> Self {
        self.sync_custom_roles = enabled;
        self
    }

    #[must_use]
    pub fn with_provisioning(mut self, enabled: bool) -> Self {
        self.okta_provisioning = enabled;
        self
    }

    /// Enable or disable the response cache.
    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Point the client at a different base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Base URL of the Okta API.
    pub fn api_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", self.domain),
        }
    }

    /// Configured email domains, lowercased.
    pub fn lowered_email_domains(&self) -> Vec<String> {
        self.ciam_email_domains
            .iter()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect()
    }

    /// Whether an API token is configured.
    pub fn has_api_token(&self) -> bool {
        self.api_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }

    /// Effective page size for a request.
    pub fn page_limit(&self, token: &Token) -> usize {
        token.size_or(self.page_size).min(MAX_PAGE_SIZE)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` naming the offending field.
    pub fn validate(&self) -> ConnectorResult<()> {
        if self.domain.trim().is_empty() {
            return Err(invalid("domain is required"));
        }
        if self.domain.contains("://") || self.domain.contains('/') {
            return Err(invalid("domain must be a host name without scheme or path"));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(invalid(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs must be positive"));
        }
        if let Some(base_url) = &self.base_url {
            url::Url::parse(base_url)
                .map_err(|e| invalid(format!("invalid base_url: {e}")))?;
        }
        Ok(())
    }

    /// Copy of the configuration with the API token masked.
    pub fn redacted(&self) -> Self {
        Self {
            domain: self.domain.clone(),
            api_token: self
                .api_token
                .as_ref()
                .map(|_| SecretString::new("***".to_string())),
            ciam_email_domains: self.ciam_email_domains.clone(),
            cache: self.cache,
            cache_tti_secs: self.cache_tti_secs,
            cache_ttl_secs: self.cache_ttl_secs,
            skip_secondary_emails: self.skip_secondary_emails,
            sync_custom_roles: self.sync_custom_roles,
            okta_provisioning: self.okta_provisioning,
            page_size: self.page_size,
            request_timeout_secs: self.request_timeout_secs,
            base_url: self.base_url.clone(),
        }
    }
}

fn invalid(message: impl Into<String>) -> ConnectorError {
    ConnectorError::InvalidConfiguration {
        message: message.into(),
    }
}
