use chrono::{DateTime, FixedOffset};

use super::Uid;
use crate::error::ExtractionError;
use crate::parse::canonical_key;
use crate::visible_text::visible_text;

/// The header fields of a message, in the order their names first appear.
///
/// Names are stored in canonical form (`Content-Type`), and lookups are case-insensitive. A
/// field that occurs more than once keeps every value, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, Vec<String>)>,
}

impl Headers {
    pub(crate) fn append(&mut self, name: String, value: String) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.fields.push((name, vec![value])),
        }
    }

    /// The first value of the field `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Every value of the field `name`; empty if it is absent.
    pub fn get_all(&self, name: &str) -> &[String] {
        let name = canonical_key(name);
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, values)| &values[..])
            .unwrap_or(&[])
    }

    /// Iterate over `(name, values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(name, values)| (name.as_str(), &values[..]))
    }

    /// The number of distinct field names.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no header fields at all.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A parsed mail message: its header fields and the raw bytes that follow the header block.
///
/// The body is not decoded in any way; MIME structure, transfer encodings and charsets are left
/// to the consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub(crate) headers: Headers,
    pub(crate) body: Vec<u8>,
}

impl Message {
    /// The header fields.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The raw body. `&[u8]` implements [`std::io::Read`], so this can be handed straight to
    /// [`visible_text`].
    pub fn body(&self) -> &[u8] {
        &self.body[..]
    }

    /// The `Subject` header, if any.
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("Subject")
    }

    /// The `Date` header parsed as an [RFC 2822](https://tools.ietf.org/html/rfc2822) date.
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.headers
            .get("Date")
            .and_then(|date| DateTime::parse_from_rfc2822(date).ok())
    }

    /// Extract the visible text fragments of the body, treating it as HTML.
    pub fn visible_text(&self) -> Result<Vec<Vec<u8>>, ExtractionError> {
        visible_text(self.body())
    }
}

/// A message retrieved from the mailbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Email {
    pub(crate) uid: Uid,
    pub(crate) internal_date: Option<DateTime<FixedOffset>>,
    pub(crate) message: Message,
}

impl Email {
    /// The unique identifier of this message within the selected mailbox.
    pub fn uid(&self) -> Uid {
        self.uid
    }

    /// When the server received the message, if it reported it.
    pub fn internal_date(&self) -> Option<DateTime<FixedOffset>> {
        self.internal_date
    }

    /// The parsed message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Take the parsed message, dropping the mailbox metadata.
    pub fn into_message(self) -> Message {
        self.message
    }
}
