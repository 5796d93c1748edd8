//! Runtime configuration.
//!
//! Settings come from flags or their environment variables (flags win) and
//! are turned once into an immutable [`Config`] that is passed explicitly
//! through the pipeline.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::error::{ConfigError, Result};
use crate::resolve::SenderStrategy;

pub const DEFAULT_PREFIX: &str = "raw/";
pub const DEFAULT_MAX_BODY_CHARS: usize = 20_000;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Bucket holding the raw messages written by the mail relay.
    #[arg(long, env = "RAW_EMAIL_BUCKET")]
    pub bucket: String,

    #[arg(long, env = "RAW_EMAIL_PREFIX", default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    #[arg(long, env = "INGEST_URL")]
    pub ingest_url: String,

    #[arg(long, env = "INGEST_TOKEN", hide_env_values = true)]
    pub ingest_token: String,

    /// Maximum characters kept per body. Anything below one or not a number
    /// falls back to 20000.
    #[arg(long, env = "MAX_BODY_CHARS")]
    pub max_body_chars: Option<String>,

    /// Optional tag copied into every record as `mailSource`.
    #[arg(long, env = "MAIL_SOURCE")]
    pub mail_source: Option<String>,

    #[arg(long, env = "SENDER_STRATEGY", value_enum, default_value_t = SenderStrategy::Cascade)]
    pub sender_strategy: SenderStrategy,

    /// Trigger event JSON. Reads stdin when unset or `-`.
    #[arg(long = "event", env = "EVENT_PATH")]
    pub event_path: Option<PathBuf>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bucket: String,
    pub prefix: String,
    pub ingest_url: String,
    pub ingest_token: String,
    pub max_body_chars: usize,
    pub mail_source: Option<String>,
    pub sender_strategy: SenderStrategy,
}

impl Config {
    pub fn object_key(&self, message_id: &str) -> String {
        format!("{}{}", self.prefix, message_id)
    }
}

impl TryFrom<&Args> for Config {
    type Error = ConfigError;

    fn try_from(args: &Args) -> std::result::Result<Self, Self::Error> {
        let ingest_url = required(&args.ingest_url, "INGEST_URL")?;
        reqwest::Url::parse(&ingest_url).map_err(|e| ConfigError::InvalidValue {
            key: "INGEST_URL",
            message: e.to_string(),
        })?;

        Ok(Self {
            bucket: required(&args.bucket, "RAW_EMAIL_BUCKET")?,
            prefix: args.prefix.clone(),
            ingest_url,
            ingest_token: required(&args.ingest_token, "INGEST_TOKEN")?,
            max_body_chars: parse_max_body_chars(args.max_body_chars.as_deref()),
            mail_source: args
                .mail_source
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            sender_strategy: args.sender_strategy,
        })
    }
}

/// Settings are read once at startup; a missing one stops the invocation
/// before any work starts.
pub fn load(args: &Args) -> Result<Config> {
    Ok(Config::try_from(args)?)
}

fn required(value: &str, key: &'static str) -> std::result::Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::MissingRequired(key));
    }
    Ok(value.to_string())
}

/// Lenient body limit: any finite number of at least one overrides the
/// default, rounded down.
pub fn parse_max_body_chars(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite() && *n >= 1.0)
        .map(|n| n.floor() as usize)
        .unwrap_or(DEFAULT_MAX_BODY_CHARS)
}
