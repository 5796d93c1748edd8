//! Picks the one address that stands for a message's true sender.
//!
//! Forwarders rewrite the visible `From` to their own address, so the
//! default strategy consults the headers forwarders leave behind first and
//! only then falls back to `From`, `Reply-To`, the relay's header summary
//! and finally the relay envelope sender.

use clap::ValueEnum;

use crate::address::{extract_from_text, flatten, AddressInput, CanonicalAddress};
use crate::event::EnvelopeMetadata;
use crate::message::ParsedMessage;

/// Headers that may carry the original author, in priority order.
pub const ORIGINAL_SENDER_HEADERS: [&str; 7] = [
    "x-original-from",
    "x-original-sender",
    "x-google-original-from",
    "x-forwarded-for",
    "original-from",
    "resent-from",
    "reply-to",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SenderStrategy {
    /// Original-sender headers, `From`, `Reply-To`, relay summary, envelope.
    #[default]
    Cascade,
    /// `From` only, then the envelope sender.
    FromOnly,
}

pub fn resolve_sender(
    message: &ParsedMessage,
    envelope: &EnvelopeMetadata,
    strategy: SenderStrategy,
) -> CanonicalAddress {
    let found = match strategy {
        SenderStrategy::Cascade => original_sender(message)
            .or_else(|| first(message.from.as_ref()))
            .or_else(|| first(message.reply_to.as_ref()))
            .or_else(|| {
                envelope
                    .common_from
                    .iter()
                    .find_map(|value| extract_from_text(value).into_iter().next())
            }),
        SenderStrategy::FromOnly => first(message.from.as_ref()),
    };
    found.unwrap_or_else(|| envelope_sender(envelope))
}

fn original_sender(message: &ParsedMessage) -> Option<CanonicalAddress> {
    ORIGINAL_SENDER_HEADERS.iter().find_map(|name| {
        let value = message.header(name).filter(|v| !v.trim().is_empty())?;
        extract_from_text(value).into_iter().next()
    })
}

fn first(input: Option<&AddressInput>) -> Option<CanonicalAddress> {
    flatten(input).into_iter().next()
}

fn envelope_sender(envelope: &EnvelopeMetadata) -> CanonicalAddress {
    envelope
        .source
        .as_deref()
        .and_then(|source| CanonicalAddress::new(source, None))
        .unwrap_or_else(CanonicalAddress::unknown)
}
