//! Address flattening: every address-bearing input shape becomes an ordered
//! list of lower-cased [`CanonicalAddress`] values.

use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use mailparse::{MailAddr, MailAddrList, SingleInfo};
use regex::Regex;
use serde::Serialize;

/// One address occurrence as the MIME parser produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAddress {
    pub address: String,
    /// Display name; empty when the header carried none.
    pub name: String,
}

impl RawAddress {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }
}

/// Every shape an address-bearing value can take.
///
/// A header that is missing altogether is `None` at the call site, not a
/// variant here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressInput {
    /// Free-form header text, scanned for address tokens.
    Text(String),
    Mailbox(RawAddress),
    /// A named group wrapping further inputs (possibly nested groups).
    Group {
        name: String,
        members: Vec<AddressInput>,
    },
    /// An ordered sequence, flattened element by element.
    List(Vec<AddressInput>),
}

impl AddressInput {
    /// Wrap a list of header strings, e.g. a relay's `commonHeaders.from`.
    pub fn texts<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(|v| Self::Text(v.into())).collect())
    }
}

impl From<&SingleInfo> for AddressInput {
    fn from(info: &SingleInfo) -> Self {
        Self::Mailbox(RawAddress::new(
            info.addr.clone(),
            info.display_name.clone().unwrap_or_default(),
        ))
    }
}

impl From<&MailAddrList> for AddressInput {
    fn from(list: &MailAddrList) -> Self {
        Self::List(
            list.iter()
                .map(|addr| match addr {
                    MailAddr::Single(info) => AddressInput::from(info),
                    MailAddr::Group(group) => AddressInput::Group {
                        name: group.group_name.clone(),
                        members: group.addrs.iter().map(AddressInput::from).collect(),
                    },
                })
                .collect(),
        )
    }
}

/// A normalized address: lower-cased, trimmed and never empty.
///
/// Two canonical addresses are equal when their address strings are equal;
/// the display name does not take part.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalAddress {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CanonicalAddress {
    /// Normalize an address and display name. Returns `None` when the address
    /// is blank.
    pub fn new(address: &str, name: Option<&str>) -> Option<Self> {
        let address = address.trim().to_lowercase();
        if address.is_empty() {
            return None;
        }
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        Some(Self { address, name })
    }

    pub fn unknown() -> Self {
        Self {
            address: UNKNOWN_SENDER.to_string(),
            name: None,
        }
    }
}

impl PartialEq for CanonicalAddress {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for CanonicalAddress {}

impl Hash for CanonicalAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

impl std::fmt::Display for CanonicalAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

pub const UNKNOWN_SENDER: &str = "unknown@sender";

fn address_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}")
            .expect("valid address regex")
    })
}

/// Flatten any address input into canonical addresses, in order of
/// occurrence. Duplicates are kept; unparseable text yields nothing.
pub fn flatten(input: Option<&AddressInput>) -> Vec<CanonicalAddress> {
    let mut out = Vec::new();
    if let Some(input) = input {
        flatten_into(input, &mut out);
    }
    out
}

fn flatten_into(input: &AddressInput, out: &mut Vec<CanonicalAddress>) {
    match input {
        AddressInput::Text(text) => out.extend(extract_from_text(text)),
        AddressInput::Mailbox(raw) => {
            out.extend(CanonicalAddress::new(&raw.address, Some(raw.name.as_str())))
        }
        AddressInput::Group { members, .. } | AddressInput::List(members) => {
            for member in members {
                flatten_into(member, out);
            }
        }
    }
}

/// Scan free-form header text for `local@domain.tld` tokens.
///
/// When nothing matches but the text still contains an `@`, the whole
/// trimmed text is taken as a single address.
pub fn extract_from_text(text: &str) -> Vec<CanonicalAddress> {
    let found: Vec<CanonicalAddress> = address_regex()
        .find_iter(text)
        .filter_map(|m| CanonicalAddress::new(m.as_str(), None))
        .collect();
    if !found.is_empty() {
        return found;
    }
    if text.contains('@') {
        return CanonicalAddress::new(text, None).into_iter().collect();
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(list: &[CanonicalAddress]) -> Vec<&str> {
        list.iter().map(|a| a.address.as_str()).collect()
    }

    #[test]
    fn test_absent_yields_nothing() {
        assert!(flatten(None).is_empty());
    }

    #[test]
    fn test_text_keeps_only_matching_tokens() {
        let input = AddressInput::Text("Jane Doe <JANE@Example.COM>, bad-token".into());
        let out = flatten(Some(&input));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].address, "jane@example.com");
        assert_eq!(out[0].name, None);
    }

    #[test]
    fn test_text_fallback_uses_whole_string() {
        let out = extract_from_text("  Odd@Host  ");
        assert_eq!(addrs(&out), vec!["odd@host"]);
    }

    #[test]
    fn test_text_without_at_yields_nothing() {
        assert!(extract_from_text("undisclosed-recipients:;").is_empty());
        assert!(extract_from_text("").is_empty());
    }

    #[test]
    fn test_text_multiple_matches_in_order() {
        let out = extract_from_text("a@x.com, B <b@y.org>; a@x.com");
        assert_eq!(addrs(&out), vec!["a@x.com", "b@y.org", "a@x.com"]);
    }

    #[test]
    fn test_list_of_texts() {
        let input = AddressInput::texts(["one@a.io", "no address here", "Two <TWO@b.io>"]);
        assert_eq!(addrs(&flatten(Some(&input))), vec!["one@a.io", "two@b.io"]);
    }

    #[test]
    fn test_mailbox_normalizes_name_and_address() {
        let input = AddressInput::Mailbox(RawAddress::new(" Bob@Example.com ", "  Bob  "));
        let out = flatten(Some(&input));
        assert_eq!(out[0].address, "bob@example.com");
        assert_eq!(out[0].name.as_deref(), Some("Bob"));

        let blank_name = AddressInput::Mailbox(RawAddress::new("x@y.com", "   "));
        assert_eq!(flatten(Some(&blank_name))[0].name, None);
    }

    #[test]
    fn test_mailbox_with_blank_address_is_skipped() {
        let input = AddressInput::Mailbox(RawAddress::new("  ", "Nobody"));
        assert!(flatten(Some(&input)).is_empty());
    }

    #[test]
    fn test_nested_groups_keep_order_and_duplicates() {
        let input = AddressInput::List(vec![
            AddressInput::Mailbox(RawAddress::new("first@a.com", "")),
            AddressInput::Group {
                name: "team".into(),
                members: vec![
                    AddressInput::Mailbox(RawAddress::new("Second@A.com", "Second")),
                    AddressInput::Group {
                        name: "inner".into(),
                        members: vec![AddressInput::Mailbox(RawAddress::new("third@a.com", ""))],
                    },
                ],
            },
            AddressInput::Mailbox(RawAddress::new("FIRST@a.com", "Again")),
        ]);
        let out = flatten(Some(&input));
        assert_eq!(
            addrs(&out),
            vec!["first@a.com", "second@a.com", "third@a.com", "first@a.com"]
        );
        assert_eq!(out[0], out[3]);
    }

    #[test]
    fn test_from_mailparse_list() {
        let raw = "Alice <alice@a.com>, Team: bob@b.com, Carol <carol@c.com>;";
        let list = mailparse::addrparse(raw).unwrap();
        let out = flatten(Some(&AddressInput::from(&list)));
        assert_eq!(addrs(&out), vec!["alice@a.com", "bob@b.com", "carol@c.com"]);
        assert_eq!(out[0].name.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_serialize_omits_absent_name() {
        let addr = CanonicalAddress::new("a@b.com", None).unwrap();
        assert_eq!(serde_json::to_string(&addr).unwrap(), r#"{"address":"a@b.com"}"#);
    }

    #[test]
    fn test_display() {
        let addr = CanonicalAddress::new("a@b.com", Some("A")).unwrap();
        assert_eq!(addr.to_string(), "A <a@b.com>");
        assert_eq!(CanonicalAddress::unknown().to_string(), "unknown@sender");
    }
}
