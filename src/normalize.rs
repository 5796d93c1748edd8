//! Body truncation, snippet extraction and record assembly.

use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat};
use regex::Regex;
use serde::Serialize;

use crate::address::{flatten, CanonicalAddress};
use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::event::EnvelopeMetadata;
use crate::message::ParsedMessage;
use crate::resolve::resolve_sender;
use crate::store::FetchedObject;

pub const SNIPPET_CHARS: usize = 500;

/// The normalized record posted to the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRecord {
    pub message_id: String,
    pub from: CanonicalAddress,
    pub to: Vec<CanonicalAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<Vec<CanonicalAddress>>,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub snippet: Option<String>,
    pub received_at: String,
    pub raw_size: u64,
    pub recipients: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mail_source: Option<String>,
    pub bucket: String,
    pub key: String,
}

/// Cut a body to at most `limit` characters. Missing or empty bodies
/// become `None`.
pub fn truncate_body(body: Option<&str>, limit: usize) -> Option<String> {
    let body = body.filter(|b| !b.is_empty())?;
    Some(take_chars(body, limit).to_string())
}

/// Short preview: the plain-text body, or the HTML body with its tags
/// blanked out, whichever first has visible content.
pub fn snippet(text: Option<&str>, html: Option<&str>) -> Option<String> {
    let from_text = text.map(str::trim).filter(|t| !t.is_empty());
    let candidate = match from_text {
        Some(t) => t.to_string(),
        None => {
            let stripped = strip_tags(html?);
            let trimmed = stripped.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.to_string()
        }
    };
    Some(take_chars(&candidate, SNIPPET_CHARS).to_string())
}

/// Replace every `<...>` run with a single space. Entities are left alone.
pub fn strip_tags(html: &str) -> String {
    tag_regex().replace_all(html, " ").into_owned()
}

fn tag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid HTML tag regex"))
}

fn take_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Assemble the record for one message. Pure: the same inputs always give
/// the same record.
pub fn build_record(
    message: &ParsedMessage,
    envelope: &EnvelopeMetadata,
    object: &FetchedObject,
    config: &Config,
) -> Result<IngestRecord> {
    let cc = flatten(message.cc.as_ref());

    Ok(IngestRecord {
        message_id: envelope.message_id.clone(),
        from: resolve_sender(message, envelope, config.sender_strategy),
        to: flatten(message.to.as_ref()),
        cc: (!cc.is_empty()).then_some(cc),
        subject: non_blank(message.subject.as_deref())
            .or_else(|| non_blank(envelope.common_subject.as_deref())),
        text: truncate_body(message.text.as_deref(), config.max_body_chars),
        html: truncate_body(message.html.as_deref(), config.max_body_chars),
        snippet: snippet(message.text.as_deref(), message.html.as_deref()),
        received_at: received_at(message, envelope)?,
        raw_size: object.size(),
        recipients: envelope
            .destinations
            .iter()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect(),
        mail_source: config.mail_source.clone(),
        bucket: object.bucket.clone(),
        key: object.key.clone(),
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn received_at(message: &ParsedMessage, envelope: &EnvelopeMetadata) -> Result<String> {
    if let Some(ts) = &envelope.timestamp {
        return Ok(ts.clone());
    }
    message
        .date
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| {
            IngestError::Event(format!(
                "no delivery timestamp or Date header for message {}",
                envelope.message_id
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{AddressInput, RawAddress};
    use crate::resolve::SenderStrategy;
    use bytes::Bytes;

    fn config() -> Config {
        Config {
            bucket: "inbound".into(),
            prefix: "raw/".into(),
            ingest_url: "http://localhost/ingest".into(),
            ingest_token: "t".into(),
            max_body_chars: 20_000,
            mail_source: None,
            sender_strategy: SenderStrategy::Cascade,
        }
    }

    fn envelope() -> EnvelopeMetadata {
        EnvelopeMetadata {
            message_id: "msg-1".into(),
            timestamp: Some("2026-03-01T10:00:00.000Z".into()),
            source: Some("relay@mx.example.com".into()),
            destinations: vec!["Inbox@Example.com".into(), " ".into()],
            common_subject: Some("From summary".into()),
            common_from: vec![],
        }
    }

    fn object(body: &'static [u8]) -> FetchedObject {
        FetchedObject {
            bucket: "inbound".into(),
            key: "raw/msg-1".into(),
            body: Bytes::from_static(body),
            content_length: None,
        }
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body(None, 10), None);
        assert_eq!(truncate_body(Some(""), 10), None);
        assert_eq!(truncate_body(Some("short"), 10).as_deref(), Some("short"));
        assert_eq!(truncate_body(Some("abcdefghij"), 10).as_deref(), Some("abcdefghij"));
        assert_eq!(truncate_body(Some("abcdefghijk"), 10).as_deref(), Some("abcdefghij"));
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_body(Some("éééé"), 2).as_deref(), Some("éé"));
    }

    #[test]
    fn test_long_text_truncated_and_snippet_from_original() {
        let body = format!("   {}", "x".repeat(25_000));
        let text = truncate_body(Some(&body), 20_000).unwrap();
        assert_eq!(text.chars().count(), 20_000);
        assert_eq!(text, body.chars().take(20_000).collect::<String>());

        let snip = snippet(Some(&body), None).unwrap();
        assert_eq!(snip, "x".repeat(500));
    }

    #[test]
    fn test_snippet_from_html_only() {
        let snip = snippet(None, Some("<p>Hello <b>world</b></p>")).unwrap();
        assert_eq!(snip, "Hello  world");
    }

    #[test]
    fn test_snippet_skips_blank_text() {
        let snip = snippet(Some(" \r\n "), Some("<div>fallback</div>")).unwrap();
        assert_eq!(snip, "fallback");
    }

    #[test]
    fn test_snippet_none_without_content() {
        assert_eq!(snippet(None, None), None);
        assert_eq!(snippet(Some("   "), Some("<br/><img src=\"x\">")), None);
    }

    #[test]
    fn test_strip_tags_keeps_entities() {
        assert_eq!(strip_tags("a&amp;b<br>c"), "a&amp;b c");
    }

    #[test]
    fn test_build_record() {
        let message = ParsedMessage {
            from: Some(AddressInput::Mailbox(RawAddress::new("Jane@Example.org", "Jane"))),
            to: Some(AddressInput::Text("a@b.com, A@B.com".into())),
            subject: Some("  Hello  ".into()),
            text: Some("Body".into()),
            ..Default::default()
        };
        let record = build_record(&message, &envelope(), &object(b"raw bytes"), &config()).unwrap();

        assert_eq!(record.message_id, "msg-1");
        assert_eq!(record.from.address, "jane@example.org");
        assert_eq!(record.to.len(), 2);
        assert_eq!(record.cc, None);
        assert_eq!(record.subject.as_deref(), Some("Hello"));
        assert_eq!(record.text.as_deref(), Some("Body"));
        assert_eq!(record.html, None);
        assert_eq!(record.snippet.as_deref(), Some("Body"));
        assert_eq!(record.received_at, "2026-03-01T10:00:00.000Z");
        assert_eq!(record.raw_size, 9);
        assert_eq!(record.recipients, vec!["inbox@example.com"]);
        assert_eq!(record.bucket, "inbound");
        assert_eq!(record.key, "raw/msg-1");
    }

    #[test]
    fn test_record_json_shape() {
        let record =
            build_record(&ParsedMessage::default(), &envelope(), &object(b""), &config()).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["messageId"], "msg-1");
        assert_eq!(json["from"]["address"], "relay@mx.example.com");
        assert!(json["from"].get("name").is_none());
        assert_eq!(json["to"], serde_json::json!([]));
        assert!(json.get("cc").is_none());
        assert!(json.get("mailSource").is_none());
        assert_eq!(json["subject"], "From summary");
        assert!(json["text"].is_null());
        assert!(json["snippet"].is_null());
        assert_eq!(json["rawSize"], 0);
        assert_eq!(json["receivedAt"], "2026-03-01T10:00:00.000Z");
    }

    #[test]
    fn test_received_at_falls_back_to_date_header() {
        let message = ParsedMessage {
            date: Some(1_772_359_200),
            ..Default::default()
        };
        let env = EnvelopeMetadata {
            timestamp: None,
            ..envelope()
        };
        let record = build_record(&message, &env, &object(b""), &config()).unwrap();
        assert_eq!(record.received_at, "2026-03-01T10:00:00.000Z");

        let err = build_record(&ParsedMessage::default(), &env, &object(b""), &config());
        assert!(matches!(err, Err(IngestError::Event(_))));
    }

    #[test]
    fn test_configured_limit_reaches_record() {
        let text = format!("  {}", "t".repeat(25_000));
        let html = format!("<p>{}</p>", "h".repeat(25_000));
        let message = ParsedMessage {
            text: Some(text.clone()),
            html: Some(html.clone()),
            ..Default::default()
        };
        let mut cfg = config();
        cfg.max_body_chars = 1_000;
        let record = build_record(&message, &envelope(), &object(b""), &cfg).unwrap();

        let cut_text = record.text.unwrap();
        assert_eq!(cut_text.chars().count(), 1_000);
        assert_eq!(cut_text, text.chars().take(1_000).collect::<String>());
        let cut_html = record.html.unwrap();
        assert_eq!(cut_html.chars().count(), 1_000);
        assert!(cut_html.starts_with("<p>hhh"));
        assert_eq!(record.snippet.unwrap(), "t".repeat(500));
    }

    #[test]
    fn test_snippet_uses_untruncated_body() {
        let text = format!("{}{}", " ".repeat(50), "s".repeat(600));
        let message = ParsedMessage {
            text: Some(text),
            ..Default::default()
        };
        let mut cfg = config();
        cfg.max_body_chars = 60;
        let record = build_record(&message, &envelope(), &object(b""), &cfg).unwrap();

        assert_eq!(record.text.as_deref().map(|t| t.chars().count()), Some(60));
        assert_eq!(record.snippet.unwrap(), "s".repeat(500));
    }

    #[test]
    fn test_build_is_deterministic() {
        let message = ParsedMessage {
            cc: Some(AddressInput::Text("c@d.com".into())),
            html: Some("<p>hi</p>".into()),
            ..Default::default()
        };
        let mut cfg = config();
        cfg.mail_source = Some("ses".into());
        let a = build_record(&message, &envelope(), &object(b"x"), &cfg).unwrap();
        let b = build_record(&message, &envelope(), &object(b"x"), &cfg).unwrap();
        assert_eq!(serde_json::to_vec(&a).unwrap(), serde_json::to_vec(&b).unwrap());
        assert_eq!(a.cc.as_ref().unwrap()[0].address, "c@d.com");
        assert_eq!(a.snippet.as_deref(), Some("hi"));
    }
}
