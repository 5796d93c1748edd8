//! Raw message retrieval from object storage.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{IngestError, Result};

#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    /// Size reported by the store, if any.
    pub content_length: Option<i64>,
}

impl FetchedObject {
    /// Reported size when the store gave a positive one, else the bytes read.
    pub fn size(&self) -> u64 {
        self.content_length
            .and_then(|n| u64::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(self.body.len() as u64)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<FetchedObject>;
}

pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let cfg = aws_config::load_from_env().await;
        Self::new(aws_sdk_s3::Client::new(&cfg))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, bucket: &str, key: &str) -> Result<FetchedObject> {
        let fetch_error = |reason: String| IngestError::Fetch {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let obj = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| fetch_error(aws_sdk_s3::error::DisplayErrorContext(&e).to_string()))?;
        let content_length = obj.content_length();
        let body = obj
            .body
            .collect()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
            .into_bytes();

        Ok(FetchedObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body,
            content_length,
        })
    }
}
