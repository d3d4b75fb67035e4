//! Enable the test_helpers feature to expose an in-memory mailbox for testing code that uses
//! this crate without an IMAP server.
//!
//! To use add a dev-dependency on this crate with the feature "test_helpers"
//! e.g.
//!
//! ```toml
//! [dependencies]
//! imap-ingest = { version = "0.1" }
//!
//! [dev-dependencies]
//! # mirror the same configuration your dependencies and add test_helpers
//! imap-ingest = { version = "0.1", features = ["test_helpers"] }
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate};
use thiserror::Error;

use crate::search::SEARCH_DATE_FORMAT;
use crate::session::Session;
use crate::types::{Flag, RawRecord, StoreOp, Uid, UidSet};
use crate::utils::iter_join;

/// The error a [`MemorySession`] reports for a command it was told to fail.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct SessionFailure(pub String);

#[derive(Clone, Debug)]
struct StoredMessage {
    uid: Uid,
    internal_date: Option<DateTime<FixedOffset>>,
    header: Vec<u8>,
    body: Vec<u8>,
    flags: BTreeSet<Flag>,
}

/// A mailbox held in memory that answers the [`Session`] commands the way a server would.
///
/// Fetching `BODY[]` sets `\Seen`, as it does on a real server. Every command is recorded in
/// its wire form, see [`MemorySession::commands`].
#[derive(Clone, Debug, Default)]
pub struct MemorySession {
    messages: Vec<StoredMessage>,
    unsolicited: Vec<(usize, RawRecord)>,
    fail_search: Option<String>,
    fail_fetch: Option<String>,
    fail_store: Vec<(Uid, String)>,
    commands: Vec<String>,
}

impl MemorySession {
    /// An empty mailbox.
    pub fn new() -> Self {
        MemorySession::default()
    }

    /// Add the message `raw` under `uid`, replacing any message already stored there.
    ///
    /// The header block is everything up to and including the first empty line.
    pub fn deliver(&mut self, uid: Uid, internal_date: Option<DateTime<FixedOffset>>, raw: &[u8]) {
        let header_len = header_len(raw);
        let message = StoredMessage {
            uid,
            internal_date,
            header: raw[..header_len].to_vec(),
            body: raw.to_vec(),
            flags: BTreeSet::new(),
        };
        match self.messages.binary_search_by_key(&uid, |m| m.uid) {
            Ok(i) => self.messages[i] = message,
            Err(i) => self.messages.insert(i, message),
        }
    }

    /// Set `flag` on `uid` without recording a command.
    pub fn set_flag(&mut self, uid: Uid, flag: Flag) {
        if let Some(message) = self.message_mut(uid) {
            message.flags.insert(flag);
        }
    }

    /// Insert `record` at position `at` of every `UID FETCH` result, the way servers interleave
    /// unsolicited `FETCH` responses.
    pub fn with_unsolicited(mut self, at: usize, record: RawRecord) -> Self {
        self.unsolicited.push((at, record));
        self
    }

    /// Fail every `UID SEARCH` with `message`.
    pub fn fail_search(mut self, message: &str) -> Self {
        self.fail_search = Some(message.to_string());
        self
    }

    /// Fail every `UID FETCH` with `message`.
    pub fn fail_fetch(mut self, message: &str) -> Self {
        self.fail_fetch = Some(message.to_string());
        self
    }

    /// Fail every `UID STORE` that touches `uid` with `message`.
    pub fn fail_store(mut self, uid: Uid, message: &str) -> Self {
        self.fail_store.push((uid, message.to_string()));
        self
    }

    /// The commands issued so far, oldest first, e.g. `UID STORE 3 -FLAGS \SEEN`.
    pub fn commands(&self) -> &[String] {
        &self.commands[..]
    }

    /// The flags currently set on `uid`; empty if there is no such message.
    pub fn flags(&self, uid: Uid) -> BTreeSet<Flag> {
        self.messages
            .iter()
            .find(|m| m.uid == uid)
            .map(|m| m.flags.clone())
            .unwrap_or_default()
    }

    fn message_mut(&mut self, uid: Uid) -> Option<&mut StoredMessage> {
        self.messages.iter_mut().find(|m| m.uid == uid)
    }
}

fn header_len(raw: &[u8]) -> usize {
    let mut line_start = 0;
    for (i, &c) in raw.iter().enumerate() {
        if c != b'\n' {
            continue;
        }
        let line = &raw[line_start..i];
        if line.is_empty() || line == b"\r" {
            return i + 1;
        }
        line_start = i + 1;
    }
    raw.len()
}

impl Session for MemorySession {
    type Error = SessionFailure;

    fn uid_search(&mut self, terms: &[String]) -> Result<Vec<Uid>, Self::Error> {
        self.commands
            .push(format!("UID SEARCH {}", iter_join(terms, " ")));
        if let Some(message) = &self.fail_search {
            return Err(SessionFailure(message.clone()));
        }

        let terms: Vec<&str> = terms.iter().map(String::as_str).collect();
        let is_match: Box<dyn Fn(&StoredMessage) -> bool> = match terms[..] {
            ["ALL"] => Box::new(|_: &StoredMessage| true),
            ["UNSEEN"] => Box::new(|m: &StoredMessage| !m.flags.contains(&Flag::Seen)),
            ["SINCE", date] => {
                let since = NaiveDate::parse_from_str(date, SEARCH_DATE_FORMAT)
                    .map_err(|e| SessionFailure(format!("BAD invalid date {:?}: {}", date, e)))?;
                Box::new(move |m: &StoredMessage| {
                    m.internal_date
                        .map_or(false, |received| received.date_naive() >= since)
                })
            }
            _ => {
                return Err(SessionFailure(format!(
                    "BAD unsupported search {:?}",
                    terms
                )))
            }
        };

        Ok(self
            .messages
            .iter()
            .filter(|&m| is_match(m))
            .map(|m| m.uid)
            .collect())
    }

    fn uid_fetch(&mut self, uids: &UidSet, fields: &[&str]) -> Result<Vec<RawRecord>, Self::Error> {
        self.commands
            .push(format!("UID FETCH {} ({})", uids, fields.join(" ")));
        if let Some(message) = &self.fail_fetch {
            return Err(SessionFailure(message.clone()));
        }

        let marks_seen = fields.contains(&"BODY[]");
        let mut records = Vec::new();
        for message in self.messages.iter_mut().filter(|m| uids.contains(m.uid)) {
            if marks_seen {
                message.flags.insert(Flag::Seen);
            }
            records.push(RawRecord {
                uid: Some(message.uid),
                internal_date: message.internal_date,
                header: Some(message.header.clone()),
                body: Some(message.body.clone()),
            });
        }
        for (at, record) in &self.unsolicited {
            records.insert((*at).min(records.len()), record.clone());
        }
        Ok(records)
    }

    fn uid_store(&mut self, uids: &UidSet, op: StoreOp, flag: Flag) -> Result<(), Self::Error> {
        self.commands
            .push(format!("UID STORE {} {} {}", uids, op, flag));
        if let Some((_, message)) = self.fail_store.iter().find(|(uid, _)| uids.contains(*uid)) {
            return Err(SessionFailure(message.clone()));
        }

        for uid in uids.iter() {
            if let Some(message) = self.message_mut(uid) {
                match op {
                    StoreOp::Add => message.flags.insert(flag),
                    StoreOp::Remove => message.flags.remove(&flag),
                };
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deliver_splits_header() {
        let mut session = MemorySession::new();
        session.deliver(1, None, b"Subject: a\r\nTo: b\r\n\r\nbody\r\n\r\nmore");
        let records = session
            .uid_fetch(&UidSet::single(1), &["RFC822.HEADER"])
            .unwrap();
        assert_eq!(
            records[0].header.as_deref(),
            Some(&b"Subject: a\r\nTo: b\r\n\r\n"[..])
        );
        assert_eq!(
            records[0].body.as_deref(),
            Some(&b"Subject: a\r\nTo: b\r\n\r\nbody\r\n\r\nmore"[..])
        );
        // no BODY[] requested, so the message stays unseen
        assert!(session.flags(1).is_empty());
    }

    #[test]
    fn search_is_ascending() {
        let mut session = MemorySession::new();
        session.deliver(9, None, b"Subject: nine\n\n");
        session.deliver(2, None, b"Subject: two\n\n");
        assert_eq!(session.uid_search(&["ALL".to_string()]).unwrap(), vec![2, 9]);
    }

    #[test]
    fn unknown_search() {
        let mut session = MemorySession::new();
        assert!(session.uid_search(&["FLAGGED".to_string()]).is_err());
        assert_eq!(session.commands(), &["UID SEARCH FLAGGED".to_string()]);
    }

    #[test]
    fn since_without_internal_date() {
        let mut session = MemorySession::new();
        session.deliver(1, None, b"Subject: undated\n\n");
        let terms = ["SINCE".to_string(), "01-Jan-1970".to_string()];
        assert!(session.uid_search(&terms).unwrap().is_empty());
    }

    #[test]
    fn unsolicited_position_is_clamped() {
        let mut session = MemorySession::new().with_unsolicited(10, RawRecord::default());
        session.deliver(1, None, b"Subject: one\n\n");
        let records = session.uid_fetch(&UidSet::single(1), &["UID"]).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].is_partial());
    }
}
