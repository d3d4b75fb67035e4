use chrono::{DateTime, FixedOffset};

use super::Uid;

/// One message as returned by a `UID FETCH` for the fields this crate asks for.
///
/// Each field is optional because servers are free to send `FETCH` responses on their own
/// accord. Gmail, for example, is known to interleave unsolicited flag-only updates with the
/// messages that were actually requested; such records carry neither a header block nor a body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// `UID`: the unique identifier of the message.
    pub uid: Option<Uid>,
    /// `INTERNALDATE`: when the server received the message.
    pub internal_date: Option<DateTime<FixedOffset>>,
    /// `RFC822.HEADER`: the header block, including its terminating empty line.
    pub header: Option<Vec<u8>>,
    /// `BODY[]`: the full message.
    pub body: Option<Vec<u8>>,
}

impl RawRecord {
    /// Whether this record lacks what is needed to build an [`Email`](super::Email) from it.
    ///
    /// A record without a header block or without a UID is not an answer to our fetch, and is
    /// skipped by the pipeline. A missing body is treated as an empty one.
    pub fn is_partial(&self) -> bool {
        self.header.is_none() || self.uid.is_none()
    }
}
