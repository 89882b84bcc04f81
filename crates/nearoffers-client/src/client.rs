//! HTTP client for the nearby-offers backend.
//!
//! Wraps `reqwest` with the backend's `{"error": "..."}` envelope handling,
//! retry on transient failures, and typed response deserialization.

use std::time::Duration;

use nearoffers_core::{AppConfig, Business, Coordinate, Offer, SearchRadius};
use reqwest::{Client, Url};

use crate::error::ClientError;
use crate::normalize::{normalize_business, normalize_offer};
use crate::retry::retry_with_backoff;
use crate::types::{BusinessesResponse, NearbyOffersResponse};

const DEFAULT_USER_AGENT: &str = "nearoffers/0.1 (proximity-client)";

/// Client for the offers backend.
///
/// Use [`OffersClient::new`] with an explicit base URL (a wiremock server in
/// tests) or [`OffersClient::from_app_config`] in the binary.
#[derive(Debug, Clone)]
pub struct OffersClient {
    client: Client,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl OffersClient {
    /// Creates a client without retries.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ClientError::InvalidBaseUrl`] if
    /// `base_url` does not parse.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        Self::with_user_agent(base_url, timeout_secs, DEFAULT_USER_AGENT)
    }

    /// Creates a client with a custom `User-Agent`.
    ///
    /// # Errors
    ///
    /// Same as [`OffersClient::new`].
    pub fn with_user_agent(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .user_agent(user_agent)
            .build()?;

        // Keep exactly one trailing slash so `Url::join` appends to the base
        // path instead of replacing its last segment.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| ClientError::InvalidBaseUrl {
            base_url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url: parsed,
            max_retries: 0,
            backoff_base_ms: 0,
        })
    }

    /// Builds a client from the loaded application configuration.
    ///
    /// # Errors
    ///
    /// Same as [`OffersClient::new`].
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ClientError> {
        Ok(Self::with_user_agent(
            &config.api_base_url,
            config.request_timeout_secs,
            &config.user_agent,
        )?
        .with_retry(config.max_retries, config.retry_backoff_base_ms))
    }

    /// Enables retry with exponential back-off for transient failures.
    #[must_use]
    pub fn with_retry(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetches active offers within `radius` of `center`, closest first.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Api`] if the backend answers with an error envelope.
    /// - [`ClientError::Http`] / [`ClientError::UnexpectedStatus`] on
    ///   transport failure or a bare non-2xx status.
    /// - [`ClientError::Deserialize`] if the body does not match the expected
    ///   shape.
    pub async fn nearby_offers(
        &self,
        center: Coordinate,
        radius: SearchRadius,
    ) -> Result<Vec<Offer>, ClientError> {
        let url = self.build_url(
            "api/nearby_offers",
            &[
                ("lat", &center.latitude.to_string()),
                ("lng", &center.longitude.to_string()),
                ("radius", &radius.meters().to_string()),
            ],
        )?;
        let body = self.get_with_retry(&url).await?;

        let context = format!(
            "nearby_offers(lat={}, lng={})",
            center.latitude, center.longitude
        );
        let response: NearbyOffersResponse = serde_json::from_value(body)
            .map_err(|e| ClientError::Deserialize { context, source: e })?;

        if let Some(count) = response.count {
            if usize::try_from(count).ok() != Some(response.offers.len()) {
                tracing::debug!(
                    count,
                    received = response.offers.len(),
                    "nearby_offers count does not match payload length"
                );
            }
        }

        Ok(response.offers.into_iter().map(normalize_offer).collect())
    }

    /// Fetches every business that has a map position.
    ///
    /// # Errors
    ///
    /// Same as [`OffersClient::nearby_offers`].
    pub async fn businesses(&self) -> Result<Vec<Business>, ClientError> {
        let url = self.build_url("api/businesses", &[])?;
        let body = self.get_with_retry(&url).await?;

        let response: BusinessesResponse =
            serde_json::from_value(body).map_err(|e| ClientError::Deserialize {
                context: "businesses".to_owned(),
                source: e,
            })?;

        Ok(response
            .businesses
            .into_iter()
            .map(normalize_business)
            .collect())
    }

    /// Builds the full request URL with percent-encoded query parameters.
    fn build_url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, ClientError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::InvalidBaseUrl {
                base_url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn get_with_retry(&self, url: &Url) -> Result<serde_json::Value, ClientError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.request_json(url)
        })
        .await
    }

    /// Sends a GET request and parses the body as JSON.
    ///
    /// The backend returns `{"error": "..."}` with both 2xx and error
    /// statuses, so the body is inspected before the status.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] for an error envelope,
    /// [`ClientError::UnexpectedStatus`] for a non-2xx status without one,
    /// [`ClientError::Http`] on transport failure and
    /// [`ClientError::Deserialize`] if a 2xx body is not JSON.
    async fn request_json(&self, url: &Url) -> Result<serde_json::Value, ClientError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let parsed = serde_json::from_str::<serde_json::Value>(&text);
        if let Ok(body) = &parsed {
            if let Some(message) = body.get("error").and_then(serde_json::Value::as_str) {
                return Err(ClientError::Api {
                    status: status.as_u16(),
                    message: message.to_owned(),
                });
            }
        }

        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        parsed.map_err(|e| ClientError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }
}
