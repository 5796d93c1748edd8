//! Inbound mail normalizer.
//!
//! Takes a relay delivery event, fetches the raw MIME message it points at,
//! resolves the true sender and recipients, bounds the bodies and posts a
//! single JSON record to an ingestion endpoint.

pub mod address;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod normalize;
pub mod pipeline;
pub mod resolve;
pub mod sink;
pub mod store;

pub use config::{Args, Config};
pub use error::{IngestError, Result};
pub use normalize::IngestRecord;
pub use pipeline::{handle_event, handle_raw_event, Delivered};
