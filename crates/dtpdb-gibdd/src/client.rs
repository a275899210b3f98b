//! HTTP client for the accident-card endpoint of the statistics service.
//!
//! Wraps `reqwest` with the service's double-encoded wire format: the query
//! is serialized into the `data` string of the POST body, and the response's
//! `data` string is decoded again into the actual card table.

use std::time::Duration;

use reqwest::Client;

use crate::error::GibddError;
use crate::types::{CardDataEnvelope, CardDataRequest, CardQuery, CardTable};

const DEFAULT_BASE_URL: &str = "http://stat.gibdd.ru";
const CARD_DATA_PATH: &str = "/map/getDTPCardData";

/// Client for the accident statistics API.
///
/// Use [`GibddClient::new`] for production or [`GibddClient::with_base_url`]
/// to point at a mock server in tests.
pub struct GibddClient {
    client: Client,
    base_url: String,
}

impl GibddClient {
    /// Creates a new client pointed at the production statistics API.
    ///
    /// # Errors
    ///
    /// Returns [`GibddError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self, GibddError> {
        Self::with_base_url(timeout_secs, user_agent, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`GibddError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn with_base_url(
        timeout_secs: u64,
        user_agent: &str,
        base_url: &str,
    ) -> Result<Self, GibddError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Fetches the raw accident cards matching `query`.
    ///
    /// Returns each card as an opaque `serde_json::Value`; the pipeline
    /// stages payloads verbatim and normalizes them later. An empty result
    /// set is `Ok(vec![])`, not an error.
    ///
    /// # Errors
    ///
    /// - [`GibddError::Http`] on network failure or non-2xx HTTP status.
    /// - [`GibddError::MissingData`] if the envelope has no `data` field.
    /// - [`GibddError::Deserialize`] if the envelope or the nested document
    ///   does not match the expected shape.
    pub async fn fetch_cards(&self, query: &CardQuery) -> Result<Vec<serde_json::Value>, GibddError> {
        let url = format!("{}{CARD_DATA_PATH}", self.base_url);
        let data = serde_json::to_string(query).map_err(|e| GibddError::Deserialize {
            context: "card query".to_owned(),
            source: e,
        })?;

        tracing::debug!(%url, query = %data, "requesting accident cards");

        let response = self
            .client
            .post(&url)
            .json(&CardDataRequest { data })
            .send()
            .await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;

        let envelope: CardDataEnvelope =
            serde_json::from_str(&body).map_err(|e| GibddError::Deserialize {
                context: url.clone(),
                source: e,
            })?;

        let inner = envelope.data.ok_or(GibddError::MissingData)?;

        let table: CardTable =
            serde_json::from_str(&inner).map_err(|e| GibddError::Deserialize {
                context: format!("{url} (nested data document)"),
                source: e,
            })?;

        Ok(table.tab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_base_url_strips_trailing_slash() {
        let client = GibddClient::with_base_url(5, "test/0.1", "http://stat.gibdd.ru/")
            .expect("client construction should not fail");
        assert_eq!(client.base_url, "http://stat.gibdd.ru");
    }
}
