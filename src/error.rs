//! Error types for the ingest pipeline.

/// Top-level error for one invocation. Every variant is fatal and is handed
/// back to the invoking platform unchanged.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid trigger event: {0}")]
    Event(String),

    #[error("Failed to fetch s3://{bucket}/{key}: {reason}")]
    Fetch {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Failed to parse MIME message: {0}")]
    Parse(#[from] mailparse::MailParseError),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Failures posting a record to the ingestion endpoint.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Ingestion endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Could not encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
