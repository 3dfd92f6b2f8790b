//! Okta REST client.

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::cache::ResponseCache;
use crate::config::OktaConfig;
use crate::error::{OktaError, OktaResult};
use crate::response::{OktaApiError, ResponseContext};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type asking Okta to leave credentials out of user records.
pub const OMIT_CREDENTIALS_CONTENT_TYPE: &str =
    r#"application/json; okta-response="omitCredentials,omitCredentialsLinks,omitTransitioningToStatus""#;

/// Query parameters of a request.
pub type Query<'a> = [(&'a str, String)];

/// Okta API client.
#[derive(Debug)]
pub struct OktaClient {
    http_client: reqwest::Client,
    base_url: String,
    api_token: Option<SecretString>,
    response_cache: Option<ResponseCache>,
}

impl OktaClient {
    /// Creates a client from the connector configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &OktaConfig) -> OktaResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| OktaError::Config(format!("Failed to create HTTP client: {e}")))?;

        let response_cache = config.cache.then(|| {
            ResponseCache::new(
                Duration::from_secs(config.cache_tti_secs),
                Duration::from_secs(config.cache_ttl_secs),
            )
        });

        Ok(Self {
            http_client,
            base_url: config.api_base_url(),
            api_token: config
                .api_token
                .as_ref()
                .filter(|t| !t.expose_secret().is_empty())
                .map(|t| SecretString::new(t.expose_secret().clone())),
            response_cache,
        })
    }

    /// Returns the base URL for API requests.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str, query: &Query<'_>) -> OktaResult<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        let params: Vec<_> = query.iter().filter(|(_, v)| !v.is_empty()).collect();
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Performs a GET request.
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Query<'_>,
    ) -> OktaResult<(T, ResponseContext)> {
        let url = self.url(path, query)?;
        let (body, ctx) = self
            .send(Method::GET, url, None::<&()>, JSON_CONTENT_TYPE)
            .await?;
        Ok((serde_json::from_str(&body)?, ctx))
    }

    /// Performs a GET request for user records, omitting credentials.
    #[instrument(skip(self))]
    pub async fn get_users<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Query<'_>,
    ) -> OktaResult<(T, ResponseContext)> {
        let url = self.url(path, query)?;
        let (body, ctx) = self
            .send(Method::GET, url, None::<&()>, OMIT_CREDENTIALS_CONTENT_TYPE)
            .await?;
        Ok((serde_json::from_str(&body)?, ctx))
    }

    /// Performs a GET request for a single resource, served from the response
    /// cache when enabled.
    #[instrument(skip(self))]
    pub async fn get_cached<T: DeserializeOwned>(
        &self,
        path: &str,
        content_type: &str,
    ) -> OktaResult<(T, ResponseContext)> {
        let url = self.url(path, &[])?;
        let key = url.to_string();

        if let Some(body) = self.response_cache.as_ref().and_then(|c| c.get(&key)) {
            debug!(url = %key, "response cache hit");
            return Ok((serde_json::from_str(&body)?, ResponseContext::cached()));
        }

        let (body, ctx) = self
            .send(Method::GET, url, None::<&()>, content_type)
            .await?;
        let value = serde_json::from_str(&body)?;
        if let Some(cache) = &self.response_cache {
            cache.insert(key, body);
        }
        Ok((value, ctx))
    }

    /// Performs a POST request.
    #[instrument(skip(self, body))]
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        query: &Query<'_>,
        body: &B,
    ) -> OktaResult<(T, ResponseContext)> {
        let url = self.url(path, query)?;
        let (text, ctx) = self
            .send(Method::POST, url, Some(body), JSON_CONTENT_TYPE)
            .await?;
        Ok((serde_json::from_str(&text)?, ctx))
    }

    /// Performs a PUT request without a body.
    #[instrument(skip(self))]
    pub async fn put(&self, path: &str) -> OktaResult<ResponseContext> {
        let url = self.url(path, &[])?;
        let (_, ctx) = self
            .send(Method::PUT, url, None::<&()>, JSON_CONTENT_TYPE)
            .await?;
        Ok(ctx)
    }

    /// Performs a DELETE request.
    #[instrument(skip(self))]
    pub async fn delete(&self, path: &str) -> OktaResult<ResponseContext> {
        let url = self.url(path, &[])?;
        let (_, ctx) = self
            .send(Method::DELETE, url, None::<&()>, JSON_CONTENT_TYPE)
            .await?;
        Ok(ctx)
    }

    /// Drops the cached response of a GET on `path`, if any.
    pub fn invalidate_cached(&self, path: &str) {
        let Some(cache) = &self.response_cache else {
            return;
        };
        if let Ok(url) = self.url(path, &[]) {
            debug!(url = %url, "response cache invalidated");
            cache.invalidate(url.as_str());
        }
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        content_type: &str,
    ) -> OktaResult<(String, ResponseContext)> {
        debug!(%method, path = %url.path(), "okta request");

        let mut request = self
            .http_client
            .request(method, url)
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .header(CONTENT_TYPE, content_type)
            .header(
                USER_AGENT,
                concat!("idsync-connector-okta/", env!("CARGO_PKG_VERSION")),
            );

        if let Some(token) = &self.api_token {
            request = request.header(AUTHORIZATION, format!("SSWS {}", token.expose_secret()));
        }
        if let Some(b) = body {
            request = request.json(b);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let ctx = ResponseContext::new(status, response.headers().clone());
        let text = response.text().await?;

        if !(200..300).contains(&status) {
            let error = OktaApiError::parse(status, &text);
            debug!(
                status,
                error_code = %error.error_code,
                error_id = %error.error_id,
                "okta request failed"
            );
            return Err(OktaError::Api {
                status,
                error,
                rate_limit: ctx.rate_limit(),
            });
        }

        Ok((text, ctx))
    }
}
