//! One invocation: event → fetch → parse → normalize → deliver.
//!
//! Every step runs in sequence and any failure ends the invocation with the
//! error handed back unchanged, so the platform's redrive policy decides
//! what happens next.

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::event::{EnvelopeMetadata, TriggerEvent};
use crate::message::parse_message;
use crate::normalize::{build_record, IngestRecord};
use crate::sink::IngestSink;
use crate::store::ObjectStore;

#[derive(Debug, Clone)]
pub struct Delivered {
    pub record: IngestRecord,
    pub status: u16,
}

/// Parse raw trigger JSON and process it with [`handle_event`].
pub async fn handle_raw_event(
    raw: &[u8],
    config: &Config,
    store: &dyn ObjectStore,
    sink: &dyn IngestSink,
) -> Result<Option<Delivered>> {
    let event = TriggerEvent::from_slice(raw).inspect_err(|e| {
        error!(bucket = %config.bucket, error = %e, "Invalid trigger event");
    })?;
    handle_event(event, config, store, sink).await
}

/// Process the first record of a trigger event. An event without records
/// is a no-op and returns `Ok(None)`.
pub async fn handle_event(
    event: TriggerEvent,
    config: &Config,
    store: &dyn ObjectStore,
    sink: &dyn IngestSink,
) -> Result<Option<Delivered>> {
    let envelope = match event.into_envelope() {
        Ok(Some(envelope)) => envelope,
        Ok(None) => {
            warn!("Trigger event has no delivery records; nothing to do");
            return Ok(None);
        }
        Err(e) => {
            error!(bucket = %config.bucket, error = %e, "Invalid trigger event");
            return Err(e);
        }
    };

    let key = config.object_key(&envelope.message_id);
    match forward(&envelope, &key, config, store, sink).await {
        Ok(delivered) => {
            info!(
                message_id = %envelope.message_id,
                key = %key,
                bytes = delivered.record.raw_size,
                recipients = ?delivered.record.recipients,
                source = envelope.source.as_deref().unwrap_or_default(),
                status = delivered.status,
                "Forwarded inbound message"
            );
            Ok(Some(delivered))
        }
        Err(e) => {
            error!(
                message_id = %envelope.message_id,
                bucket = %config.bucket,
                key = %key,
                error = %e,
                "Failed to forward inbound message"
            );
            Err(e)
        }
    }
}

async fn forward(
    envelope: &EnvelopeMetadata,
    key: &str,
    config: &Config,
    store: &dyn ObjectStore,
    sink: &dyn IngestSink,
) -> Result<Delivered> {
    let object = store.get(&config.bucket, key).await?;
    debug!(key, bytes = object.body.len(), "Fetched raw message");

    let message = parse_message(&object.body)?;
    let record = build_record(&message, envelope, &object, config)?;
    debug!(from = %record.from, to = record.to.len(), "Normalized message");

    let status = sink.deliver(&record).await?;
    Ok(Delivered { record, status })
}
