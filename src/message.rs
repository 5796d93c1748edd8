//! MIME parsing via `mailparse`, reduced to the fields the normalizer uses.

use std::collections::HashMap;

use mailparse::{
    DispositionType, MailAddr, MailAddrList, MailHeaderMap, ParsedMail, SingleInfo,
};

use crate::address::AddressInput;
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct ParsedMessage {
    /// Top-level headers keyed by lower-cased name. When a header repeats,
    /// the first occurrence wins.
    pub headers: HashMap<String, String>,
    pub from: Option<AddressInput>,
    pub to: Option<AddressInput>,
    pub cc: Option<AddressInput>,
    pub reply_to: Option<AddressInput>,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
    /// `Date` header as epoch seconds, when it parses.
    pub date: Option<i64>,
}

impl ParsedMessage {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

pub fn parse_message(raw: &[u8]) -> Result<ParsedMessage> {
    let mail = mailparse::parse_mail(raw)?;

    let mut headers = HashMap::new();
    for header in &mail.headers {
        headers
            .entry(header.get_key().to_ascii_lowercase())
            .or_insert_with(|| header.get_value());
    }

    Ok(ParsedMessage {
        headers,
        from: address_header(&mail, "From"),
        to: address_header(&mail, "To"),
        cc: address_header(&mail, "Cc"),
        reply_to: address_header(&mail, "Reply-To"),
        subject: header_first(&mail, "Subject"),
        text: find_body(&mail, "text/plain")?,
        html: find_body(&mail, "text/html")?,
        date: header_first(&mail, "Date").and_then(|d| mailparse::dateparse(&d).ok()),
    })
}

fn header_first(mail: &ParsedMail, name: &str) -> Option<String> {
    mail.headers
        .get_first_value(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Structured addresses when the header parses cleanly, otherwise the raw
/// text so the token scan still gets a chance at it.
fn address_header(mail: &ParsedMail, name: &str) -> Option<AddressInput> {
    let header = mail.headers.get_first_header(name)?;
    match mailparse::addrparse_header(header) {
        Ok(list) if !list.is_empty() && all_well_formed(&list) => {
            Some(AddressInput::from(&list))
        }
        _ => {
            let value = header.get_value();
            (!value.trim().is_empty()).then(|| AddressInput::Text(value))
        }
    }
}

// mailparse accepts a bare phrase like `Jane Doe jane@example.com` as one
// address; those go back through the text scan instead.
fn all_well_formed(list: &MailAddrList) -> bool {
    let ok = |info: &SingleInfo| {
        info.addr.contains('@') && !info.addr.chars().any(char::is_whitespace)
    };
    list.iter().all(|addr| match addr {
        MailAddr::Single(info) => ok(info),
        MailAddr::Group(group) => group.addrs.iter().all(ok),
    })
}

/// First inline leaf part of the given MIME type, depth first.
fn find_body(mail: &ParsedMail, mimetype: &str) -> Result<Option<String>> {
    if mail.subparts.is_empty() {
        if mail.get_content_disposition().disposition == DispositionType::Attachment {
            return Ok(None);
        }
        if mail.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
            return Ok(Some(mail.get_body()?));
        }
        return Ok(None);
    }
    for part in &mail.subparts {
        if let Some(body) = find_body(part, mimetype)? {
            return Ok(Some(body));
        }
    }
    Ok(None)
}
