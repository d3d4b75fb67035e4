//! The retrieval pipeline: search, fetch, parse, stream, then fix up flags.
//!
//! Each retrieval call runs on its own worker thread, which is the only producer into a bounded
//! channel. The caller drains the channel through [`Responses`]; a full channel blocks the
//! worker until the caller catches up. The end of the stream is signalled by the worker
//! dropping its end of the channel, and an error is always the last item of a stream.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::flags::FlagMutator;
use crate::parse::new_email;
use crate::search::RetrievalMode;
use crate::session::Session;
use crate::types::{Email, Flag, FlagChange, UidSet};

/// The data items requested for every message: the server's receive date, the full message,
/// the UID and the header block.
pub const FETCH_FIELDS: [&str; 4] = ["INTERNALDATE", "BODY[]", "UID", "RFC822.HEADER"];

/// One item of a retrieval stream.
pub type Response = std::result::Result<Email, Error>;

/// What to do with a message once it has been handed to the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Leave messages marked as read. Fetching `BODY[]` sets `\Seen`, so when this is `false`
    /// the flag is cleared again after each message is emitted.
    pub mark_as_read: bool,
    /// Set `\Deleted` on each message after it is emitted. Nothing is expunged.
    pub delete: bool,
}

impl FetchOptions {
    /// Options with both `mark_as_read` and `delete` given explicitly.
    pub fn new(mark_as_read: bool, delete: bool) -> Self {
        FetchOptions {
            mark_as_read,
            delete,
        }
    }
}

/// The consuming end of a retrieval stream.
///
/// Iteration blocks until the worker produces the next item, and ends once the worker is done.
/// Dropping a `Responses` early does not stop the worker: it runs the retrieval to completion,
/// including any flag changes, and its sends are discarded.
#[derive(Debug)]
pub struct Responses {
    rx: Receiver<Response>,
}

impl Iterator for Responses {
    type Item = Response;

    fn next(&mut self) -> Option<Response> {
        self.rx.recv().ok()
    }
}

pub(crate) struct FetchPipeline<S> {
    // dropped before `tx`, so a finished stream means the session is free again
    session: Arc<Mutex<S>>,
    mode: RetrievalMode,
    options: FetchOptions,
    tx: SyncSender<Response>,
}

impl<S: Session + Send + 'static> FetchPipeline<S> {
    /// Start a retrieval on a new worker thread, with room for `capacity` undelivered items.
    pub(crate) fn spawn(
        session: Arc<Mutex<S>>,
        mode: RetrievalMode,
        options: FetchOptions,
        capacity: usize,
    ) -> Result<Responses> {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let pipeline = FetchPipeline {
            session,
            mode,
            options,
            tx,
        };

        thread::Builder::new()
            .name("imap-ingest-retrieval".to_string())
            .spawn(move || pipeline.run())
            .map_err(Error::Worker)?;
        Ok(Responses { rx })
    }

    fn run(self) {
        let mut session = match self.session.lock() {
            Ok(session) => session,
            Err(_) => {
                warn!("mailbox session lock poisoned; not retrieving");
                self.emit(Err(Error::SessionPoisoned));
                return;
            }
        };

        if let Err(e) = self.retrieve(&mut *session) {
            warn!(mode = ?self.mode, "retrieval stopped: {}", e);
            self.emit(Err(e));
        }
    }

    fn retrieve(&self, session: &mut S) -> Result<()> {
        let terms = self.mode.search_terms();
        debug!(?terms, "searching mailbox");
        let uids: UidSet = session
            .uid_search(&terms)
            .map_err(Error::search)?
            .into_iter()
            .collect();
        if uids.is_empty() {
            debug!("no matching messages");
            return Ok(());
        }

        debug!(count = uids.len(), "fetching messages");
        let records = session
            .uid_fetch(&uids, &FETCH_FIELDS)
            .map_err(Error::fetch)?;

        for record in records {
            // unsolicited FETCH responses (flag updates and the like) carry no message
            let (Some(uid), Some(header)) = (record.uid, record.header.as_deref()) else {
                debug!(uid = ?record.uid, "skipping partial fetch record");
                continue;
            };

            let body = record.body.as_deref().unwrap_or_default();
            let email = new_email(uid, record.internal_date, header, body)
                .map_err(|source| Error::Parse { uid, source })?;
            trace!(uid, "emitting message");
            self.emit(Ok(email));

            let mut flags = FlagMutator::new(&mut *session);
            if !self.options.mark_as_read {
                flags.mark_unread(uid).map_err(|e| {
                    Error::flag_mutation(FlagChange::remove(uid, Flag::Seen), e)
                })?;
            }
            if self.options.delete {
                flags.mark_deleted(uid).map_err(|e| {
                    Error::flag_mutation(FlagChange::add(uid, Flag::Deleted), e)
                })?;
            }
        }
        Ok(())
    }

    fn emit(&self, response: Response) {
        if self.tx.send(response).is_err() {
            trace!("response stream dropped; continuing without a consumer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::testing::MemorySession;
    use crate::types::RawRecord;
    use chrono::{DateTime, FixedOffset, NaiveDate};
    use std::sync::TryLockError;
    use std::time::Duration;

    fn date(s: &str) -> Option<DateTime<FixedOffset>> {
        Some(DateTime::parse_from_rfc3339(s).unwrap())
    }

    fn message(n: u32) -> Vec<u8> {
        format!(
            "From: sender@localhost\r\nSubject: message {}\r\n\r\nbody of message {}",
            n, n
        )
        .into_bytes()
    }

    fn mailbox(uids: &[u32]) -> MemorySession {
        let mut session = MemorySession::new();
        for (day, &uid) in uids.iter().enumerate() {
            let received = format!("2024-03-{:02}T10:00:00+00:00", day + 1);
            session.deliver(uid, date(&received), &message(uid));
        }
        session
    }

    fn run(
        session: MemorySession,
        mode: RetrievalMode,
        options: FetchOptions,
    ) -> (Vec<Response>, Arc<Mutex<MemorySession>>) {
        let session = Arc::new(Mutex::new(session));
        let responses = FetchPipeline::spawn(Arc::clone(&session), mode, options, 100)
            .unwrap()
            .collect();
        (responses, session)
    }

    fn uids(responses: &[Response]) -> Vec<u32> {
        responses
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .map(Email::uid)
            .collect()
    }

    fn stores(session: &Mutex<MemorySession>) -> Vec<String> {
        session
            .lock()
            .unwrap()
            .commands()
            .iter()
            .filter(|c| c.starts_with("UID STORE"))
            .cloned()
            .collect()
    }

    #[test]
    fn all_in_server_order() {
        let (responses, session) = run(
            mailbox(&[1, 2, 5]),
            RetrievalMode::All,
            FetchOptions::new(true, false),
        );
        assert_eq!(uids(&responses), vec![1, 2, 5]);
        assert!(responses.iter().all(Result::is_ok));

        let email = responses[2].as_ref().unwrap();
        assert_eq!(email.message().subject(), Some("message 5"));
        assert_eq!(email.internal_date(), date("2024-03-03T10:00:00+00:00"));

        let session = session.lock().unwrap();
        assert_eq!(
            session.commands(),
            &[
                "UID SEARCH ALL".to_string(),
                "UID FETCH 1:2,5 (INTERNALDATE BODY[] UID RFC822.HEADER)".to_string(),
            ]
        );
        assert!(session.flags(5).contains(&Flag::Seen));
    }

    #[test]
    fn unread_mode_and_restored_seen_flag() {
        let mut inbox = mailbox(&[1, 2, 3]);
        inbox.set_flag(2, Flag::Seen);
        let (responses, session) =
            run(inbox, RetrievalMode::Unread, FetchOptions::default());
        assert_eq!(uids(&responses), vec![1, 3]);
        assert_eq!(
            stores(&session),
            vec!["UID STORE 1 -FLAGS \\SEEN", "UID STORE 3 -FLAGS \\SEEN"]
        );
        let session = session.lock().unwrap();
        assert!(!session.flags(1).contains(&Flag::Seen));
        assert!(session.flags(2).contains(&Flag::Seen));
        assert!(!session.flags(3).contains(&Flag::Seen));
    }

    #[test]
    fn partial_records_are_skipped() {
        let inbox = mailbox(&[1, 2, 3]).with_unsolicited(
            1,
            RawRecord {
                uid: Some(2),
                ..Default::default()
            },
        );
        let (responses, _) = run(inbox, RetrievalMode::All, FetchOptions::new(true, false));
        assert_eq!(responses.len(), 3);
        assert_eq!(uids(&responses), vec![1, 2, 3]);
    }

    #[test]
    fn parse_failure_ends_stream() {
        let mut inbox = mailbox(&[1, 3]);
        inbox.deliver(2, None, b"this is not a header\r\n\r\nbody");
        let (responses, session) = run(inbox, RetrievalMode::All, FetchOptions::default());

        assert_eq!(responses.len(), 2);
        assert_eq!(uids(&responses), vec![1]);
        match &responses[1] {
            Err(Error::Parse { uid: 2, source }) => {
                assert!(matches!(source, ParseError::HeaderLine(_)))
            }
            other => panic!("unexpected response: {:?}", other),
        }
        assert_eq!(stores(&session), vec!["UID STORE 1 -FLAGS \\SEEN"]);
    }

    #[test]
    fn mark_unread_failure_ends_stream() {
        let inbox = mailbox(&[1, 2, 3]).fail_store(2, "NO store refused");
        let (responses, session) = run(inbox, RetrievalMode::All, FetchOptions::default());

        assert_eq!(responses.len(), 3);
        assert_eq!(uids(&responses), vec![1, 2]);
        match &responses[2] {
            Err(e @ Error::FlagMutation { change, .. }) => {
                assert_eq!(*change, FlagChange::remove(2, Flag::Seen));
                assert_eq!(
                    e.to_string(),
                    "unable to remove seen flag from 2: NO store refused"
                );
            }
            other => panic!("unexpected response: {:?}", other),
        }
        assert_eq!(
            stores(&session),
            vec!["UID STORE 1 -FLAGS \\SEEN", "UID STORE 2 -FLAGS \\SEEN"]
        );
    }

    #[test]
    fn delete_after_emitting() {
        let (responses, session) = run(
            mailbox(&[4, 7]),
            RetrievalMode::All,
            FetchOptions::new(false, true),
        );
        assert_eq!(uids(&responses), vec![4, 7]);
        assert_eq!(
            stores(&session),
            vec![
                "UID STORE 4 -FLAGS \\SEEN",
                "UID STORE 4 +FLAGS \\DELETED",
                "UID STORE 7 -FLAGS \\SEEN",
                "UID STORE 7 +FLAGS \\DELETED",
            ]
        );
        assert!(session.lock().unwrap().flags(7).contains(&Flag::Deleted));
    }

    #[test]
    fn delete_failure_ends_stream() {
        let inbox = mailbox(&[1, 2]).fail_store(1, "NO read-only");
        let (responses, _) = run(inbox, RetrievalMode::All, FetchOptions::new(true, true));
        assert_eq!(uids(&responses), vec![1]);
        assert!(matches!(
            responses.last(),
            Some(Err(Error::FlagMutation { change, .. })) if *change == FlagChange::add(1, Flag::Deleted)
        ));
    }

    #[test]
    fn empty_search_skips_fetch() {
        let (responses, session) =
            run(MemorySession::new(), RetrievalMode::All, FetchOptions::default());
        assert!(responses.is_empty());
        assert_eq!(session.lock().unwrap().commands(), &["UID SEARCH ALL".to_string()]);
    }

    #[test]
    fn since_after_newest() {
        let since = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let (responses, _) = run(
            mailbox(&[1, 2]),
            RetrievalMode::Since(since),
            FetchOptions::default(),
        );
        assert!(responses.is_empty());
    }

    #[test]
    fn since_includes_the_day() {
        let since = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let (responses, session) = run(
            mailbox(&[1, 2, 3]),
            RetrievalMode::Since(since),
            FetchOptions::new(true, false),
        );
        assert_eq!(uids(&responses), vec![2, 3]);
        assert_eq!(
            session.lock().unwrap().commands()[0],
            "UID SEARCH SINCE 02-Mar-2024"
        );
    }

    #[test]
    fn search_failure() {
        let inbox = mailbox(&[1]).fail_search("BAD search");
        let (responses, _) = run(inbox, RetrievalMode::All, FetchOptions::default());
        assert_eq!(responses.len(), 1);
        match &responses[0] {
            Err(e @ Error::Search(_)) => assert_eq!(e.to_string(), "uid search failed: BAD search"),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn fetch_failure() {
        let inbox = mailbox(&[1]).fail_fetch("NO fetch");
        let (responses, _) = run(inbox, RetrievalMode::All, FetchOptions::default());
        assert_eq!(responses.len(), 1);
        assert!(matches!(responses[0], Err(Error::Fetch(_))));
    }

    #[test]
    fn bounded_queue_blocks_worker() {
        let session = Arc::new(Mutex::new(mailbox(&[1, 2, 3, 4, 5])));
        let mut responses = FetchPipeline::spawn(
            Arc::clone(&session),
            RetrievalMode::All,
            FetchOptions::default(),
            1,
        )
        .unwrap();

        // with one slot the worker is stuck sending the second message, still holding the session
        thread::sleep(Duration::from_millis(100));
        assert!(matches!(session.try_lock(), Err(TryLockError::WouldBlock)));

        assert_eq!(responses.next().unwrap().unwrap().uid(), 1);
        let rest: Vec<_> = responses.collect();
        assert_eq!(uids(&rest), vec![2, 3, 4, 5]);
        assert_eq!(stores(&session).len(), 5);
    }

    #[test]
    fn dropped_consumer_does_not_stop_worker() {
        let session = Arc::new(Mutex::new(mailbox(&[1, 2, 3])));
        let mut responses = FetchPipeline::spawn(
            Arc::clone(&session),
            RetrievalMode::All,
            FetchOptions::new(false, true),
            1,
        )
        .unwrap();
        assert_eq!(responses.next().unwrap().unwrap().uid(), 1);
        drop(responses);

        // the worker holds the session until it is done, so this waits for it
        let session = session.lock().unwrap();
        for uid in [1, 2, 3] {
            assert!(session.flags(uid).contains(&Flag::Deleted));
            assert!(!session.flags(uid).contains(&Flag::Seen));
        }
    }

    #[test]
    fn poisoned_session() {
        let session = Arc::new(Mutex::new(mailbox(&[1])));
        let poisoner = Arc::clone(&session);
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poisoning the session");
        })
        .join();

        let responses: Vec<_> =
            FetchPipeline::spawn(session, RetrievalMode::All, FetchOptions::default(), 100)
                .unwrap()
                .collect();
        assert_eq!(responses.len(), 1);
        assert!(matches!(responses[0], Err(Error::SessionPoisoned)));
    }
}
