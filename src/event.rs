//! Trigger event: a relay receipt notification carrying one or more
//! delivery records. Only the first record is used.

use serde::Deserialize;

use crate::error::{IngestError, Result};

#[derive(Debug, Deserialize)]
pub struct TriggerEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
pub struct EventRecord {
    pub ses: SesRecord,
}

#[derive(Debug, Deserialize)]
pub struct SesRecord {
    pub mail: SesMail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesMail {
    pub message_id: String,
    pub timestamp: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub destination: Vec<String>,
    pub common_headers: Option<CommonHeaders>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommonHeaders {
    pub subject: Option<String>,
    pub from: Option<Vec<String>>,
}

/// Delivery-time facts about one message, independent of its headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeMetadata {
    pub message_id: String,
    /// ISO-8601 delivery timestamp.
    pub timestamp: Option<String>,
    /// Relay envelope sender.
    pub source: Option<String>,
    pub destinations: Vec<String>,
    pub common_subject: Option<String>,
    pub common_from: Vec<String>,
}

impl From<SesMail> for EnvelopeMetadata {
    fn from(mail: SesMail) -> Self {
        let common = mail.common_headers.unwrap_or_default();
        Self {
            message_id: mail.message_id,
            timestamp: non_blank(mail.timestamp),
            source: non_blank(mail.source),
            destinations: mail.destination,
            common_subject: common.subject,
            common_from: common.from.unwrap_or_default(),
        }
    }
}

impl TriggerEvent {
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| IngestError::Event(e.to_string()))
    }

    /// Envelope of the first record, or `None` when the event carries no
    /// records at all.
    pub fn into_envelope(self) -> Result<Option<EnvelopeMetadata>> {
        let Some(record) = self.records.into_iter().next() else {
            return Ok(None);
        };
        let envelope = EnvelopeMetadata::from(record.ses.mail);
        if envelope.message_id.trim().is_empty() {
            return Err(IngestError::Event("record has an empty messageId".into()));
        }
        Ok(Some(envelope))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
