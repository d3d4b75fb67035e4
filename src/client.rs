//! The entry point for retrieving mail.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::flags::FlagMutator;
use crate::pipeline::{FetchOptions, FetchPipeline, Responses};
use crate::search::RetrievalMode;
use crate::session::Session;
use crate::types::{Email, Flag, FlagChange, Uid};

/// A mailbox that messages can be streamed out of.
///
/// The `Client` owns a logged-in [`Session`] with a folder selected; use
/// [`ClientBuilder`](crate::ClientBuilder) to get one for an IMAP server, or [`Client::new`]
/// to wrap any other [`Session`].
///
/// Every retrieval call starts a worker thread that holds the session for the whole call, so
/// calls on one `Client` run one after the other. The flag methods ([`Client::mark_read`] and
/// friends) also need the session: calling one while still iterating a stream from the same
/// client waits for that stream's worker, which may itself be waiting for the iteration to
/// continue. Finish or drop the stream first.
///
/// ```no_run
/// # use imap_ingest::{ClientBuilder, Config};
/// # fn main() -> imap_ingest::Result<()> {
/// let client = ClientBuilder::new("imap.example.com", 993)
///     .config(Config::default().with_tls(true))
///     .connect("user", "password")?;
///
/// for response in client.generate_unread(false, false)? {
///     let email = response?;
///     println!("{}: {:?}", email.uid(), email.message().subject());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client<S> {
    session: Arc<Mutex<S>>,
    config: Config,
}

impl<S: Session + Send + 'static> Client<S> {
    /// Wrap an authenticated session that already has a folder selected.
    pub fn new(session: S, config: Config) -> Self {
        Client {
            session: Arc::new(Mutex::new(session)),
            config,
        }
    }

    /// The settings this client was created with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start streaming the messages selected by `mode`.
    ///
    /// This only fails if the worker thread cannot be started; everything that goes wrong
    /// during retrieval is delivered as the last item of the returned stream.
    pub fn generate(&self, mode: RetrievalMode, options: FetchOptions) -> Result<Responses> {
        FetchPipeline::spawn(
            Arc::clone(&self.session),
            mode,
            options,
            self.config.queue_capacity,
        )
    }

    /// Stream every message in the folder.
    pub fn generate_all(&self, mark_as_read: bool, delete: bool) -> Result<Responses> {
        self.generate(RetrievalMode::All, FetchOptions::new(mark_as_read, delete))
    }

    /// Stream every message without the `\Seen` flag.
    pub fn generate_unread(&self, mark_as_read: bool, delete: bool) -> Result<Responses> {
        self.generate(RetrievalMode::Unread, FetchOptions::new(mark_as_read, delete))
    }

    /// Stream every message received on or after `since`.
    pub fn generate_since(
        &self,
        since: NaiveDate,
        mark_as_read: bool,
        delete: bool,
    ) -> Result<Responses> {
        self.generate(
            RetrievalMode::Since(since),
            FetchOptions::new(mark_as_read, delete),
        )
    }

    /// Retrieve every message in the folder.
    ///
    /// On failure the messages retrieved before the error are dropped; use
    /// [`Client::generate_all`] to keep them.
    pub fn get_all(&self, mark_as_read: bool, delete: bool) -> Result<Vec<Email>> {
        self.generate_all(mark_as_read, delete)?.collect()
    }

    /// Retrieve every message without the `\Seen` flag.
    pub fn get_unread(&self, mark_as_read: bool, delete: bool) -> Result<Vec<Email>> {
        self.generate_unread(mark_as_read, delete)?.collect()
    }

    /// Retrieve every message received on or after `since`.
    pub fn get_since(&self, since: NaiveDate, mark_as_read: bool, delete: bool) -> Result<Vec<Email>> {
        self.generate_since(since, mark_as_read, delete)?.collect()
    }

    /// Flag the message `uid` as deleted. It is removed by the next `EXPUNGE`.
    pub fn mark_deleted(&self, uid: Uid) -> Result<()> {
        self.apply(FlagChange::add(uid, Flag::Deleted))
    }

    /// Clear the `\Seen` flag of the message `uid`.
    pub fn mark_unread(&self, uid: Uid) -> Result<()> {
        self.apply(FlagChange::remove(uid, Flag::Seen))
    }

    /// Set the `\Seen` flag of the message `uid`.
    pub fn mark_read(&self, uid: Uid) -> Result<()> {
        self.apply(FlagChange::add(uid, Flag::Seen))
    }

    fn apply(&self, change: FlagChange) -> Result<()> {
        self.with_session(|session| {
            FlagMutator::new(session)
                .apply(change)
                .map_err(|e| Error::flag_mutation(change, e))
        })?
    }

    /// Run `f` with exclusive access to the session, for instance to expunge or log out.
    ///
    /// Waits for any retrieval that is still running.
    pub fn with_session<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut S) -> R,
    {
        let mut session = self.session.lock().map_err(|_| Error::SessionPoisoned)?;
        Ok(f(&mut *session))
    }

    /// Take the session back out of the client.
    ///
    /// Returns `None` while a retrieval worker still holds on to the session, or if a worker
    /// panicked while using it.
    pub fn into_session(self) -> Option<S> {
        Arc::try_unwrap(self.session).ok()?.into_inner().ok()
    }
}
