//! IMAP ingestion error types.

use std::error::Error as StdError;
use std::io::Error as IoError;
use std::result;

use thiserror::Error;

use crate::types::{FlagChange, Uid};

/// A convenience wrapper around `Result` for `imap_ingest::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A failure reported by the underlying [`Session`](crate::session::Session), boxed so that any
/// session implementation can be carried through the response stream.
pub type SessionError = Box<dyn StdError + Send + 'static>;

/// A set of errors that can occur while retrieving mail.
///
/// When one of these is yielded by a [`Responses`](crate::pipeline::Responses) stream, it is
/// always the last item of that stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The `UID SEARCH` command failed.
    #[error("uid search failed: {0}")]
    Search(#[source] SessionError),
    /// The batched `UID FETCH` command failed.
    #[error("unable to perform uid fetch: {0}")]
    Fetch(#[source] SessionError),
    /// A fetched message could not be parsed.
    #[error("unable to parse email {uid}: {source}")]
    Parse {
        /// The message that failed to parse.
        uid: Uid,
        /// What was wrong with it.
        #[source]
        source: ParseError,
    },
    /// A `UID STORE` issued on behalf of the caller failed.
    #[error("unable to {change}: {source}")]
    FlagMutation {
        /// The flag change that was attempted.
        change: FlagChange,
        /// The error the session reported.
        #[source]
        source: SessionError,
    },
    /// Reading an HTML body failed before the end of the stream.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// An error from the `imap` crate while connecting, logging in or selecting a folder.
    #[error("imap error: {0}")]
    Imap(#[from] imap::Error),
    /// A TLS connection was requested, but the crate was built without a TLS backend.
    #[error("TLS requested but neither the `native-tls` nor the `rustls-tls` feature is enabled")]
    TlsUnavailable,
    /// The retrieval worker thread could not be started.
    #[error("unable to start retrieval worker: {0}")]
    Worker(#[source] IoError),
    /// A previous user of the shared session panicked while holding it.
    #[error("mailbox session lock poisoned")]
    SessionPoisoned,
}

impl Error {
    pub(crate) fn search<E: StdError + Send + 'static>(err: E) -> Self {
        Error::Search(Box::new(err))
    }

    pub(crate) fn fetch<E: StdError + Send + 'static>(err: E) -> Self {
        Error::Fetch(Box::new(err))
    }

    pub(crate) fn flag_mutation<E: StdError + Send + 'static>(change: FlagChange, err: E) -> Self {
        Error::FlagMutation {
            change,
            source: Box::new(err),
        }
    }
}

/// Errors encountered while parsing the header block of a message.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The header block began with a continuation line.
    #[error("malformed MIME header initial line: {0:?}")]
    InitialLine(String),
    /// A line in the header block was not a `name: value` field.
    #[error("malformed MIME header line: {0:?}")]
    HeaderLine(String),
    /// There was neither a header field nor a header terminator.
    #[error("message has no header block")]
    Empty,
}

/// A read failure while extracting visible text from an HTML body.
///
/// The fragments extracted before the failure are kept so the caller can decide whether a
/// partial result is useful.
#[derive(Debug, Error)]
#[error("unable to extract visible text: {source}")]
pub struct ExtractionError {
    /// Visible text fragments accumulated before the read failed.
    pub fragments: Vec<Vec<u8>>,
    /// The underlying read error.
    #[source]
    pub source: IoError,
}
