//! Delivery of normalized records to the ingestion endpoint.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::error::DeliveryError;
use crate::normalize::IngestRecord;

/// Response bodies quoted in errors are cut to this many characters.
pub const ERROR_BODY_CHARS: usize = 500;

#[async_trait]
pub trait IngestSink: Send + Sync {
    /// Deliver one record; returns the HTTP status on success.
    async fn deliver(&self, record: &IngestRecord) -> Result<u16, DeliveryError>;
}

/// Posts each record as JSON with a bearer token.
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url, token)
    }

    pub fn with_client(
        client: reqwest::Client,
        url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl IngestSink for HttpSink {
    async fn deliver(&self, record: &IngestRecord) -> Result<u16, DeliveryError> {
        let body = serde_json::to_vec(record)?;
        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&self.token)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: text.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }
        Ok(status.as_u16())
    }
}
