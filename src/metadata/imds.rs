//! IMDSv2 client.
//!
//! Each lookup is two calls: a `PUT` for a session token, then a `GET` for
//! the attribute. A failed token call is not fatal; the attribute is still
//! requested without a token, which IMDSv1-compatible endpoints accept.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::{
    MetadataConfig, IMDS_METADATA_PATH, IMDS_TOKEN_HEADER, IMDS_TOKEN_PATH, IMDS_TOKEN_TTL_HEADER,
};

use super::MetadataSource;

/// Instance metadata client with a bounded per-call timeout.
#[derive(Debug, Clone)]
pub struct ImdsClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    token_ttl_seconds: u64,
}

impl ImdsClient {
    /// Build the client. Fails only when the HTTP backend cannot initialize.
    pub fn new(config: &MetadataConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_millis(config.timeout_ms);

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .no_proxy()
            .build()?;

        tracing::debug!(
            base_url = %config.base_url,
            timeout_ms = config.timeout_ms,
            "Initialized instance metadata client"
        );

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            token_ttl_seconds: config.token_ttl_seconds,
        })
    }

    fn token_url(&self) -> String {
        format!("{}{}", self.base_url, IMDS_TOKEN_PATH)
    }

    fn attribute_url(&self, attribute: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url,
            IMDS_METADATA_PATH,
            attribute.trim_start_matches('/')
        )
    }

    /// Request a session token. Any failure yields `None`.
    async fn fetch_token(&self) -> Option<String> {
        let result = self
            .http_client
            .put(self.token_url())
            .header(IMDS_TOKEN_TTL_HEADER, self.token_ttl_seconds.to_string())
            .timeout(self.timeout)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "Metadata token request failed");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            tracing::debug!(
                status = response.status().as_u16(),
                "Metadata token request rejected"
            );
            return None;
        }

        match response.text().await {
            Ok(body) => {
                let token = body.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read metadata token body");
                None
            }
        }
    }

    async fn fetch_attribute(
        &self,
        attribute: &str,
        token: Option<&str>,
    ) -> Result<Option<String>, reqwest::Error> {
        let mut request = self
            .http_client
            .get(self.attribute_url(attribute))
            .timeout(self.timeout);
        if let Some(token) = token {
            request = request.header(IMDS_TOKEN_HEADER, token);
        }

        let response = request.send().await?;
        if response.status() != StatusCode::OK {
            tracing::debug!(
                attribute,
                status = response.status().as_u16(),
                "Metadata attribute not available"
            );
            return Ok(None);
        }

        Ok(Some(response.text().await?.trim().to_string()))
    }
}

#[async_trait]
impl MetadataSource for ImdsClient {
    async fn fetch(&self, attribute: &str) -> Option<String> {
        let token = self.fetch_token().await;

        match self.fetch_attribute(attribute, token.as_deref()).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(attribute, error = %e, "Metadata attribute request failed");
                None
            }
        }
    }
}
