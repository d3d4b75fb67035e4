//! The mailbox operations the retrieval pipeline relies on.
//!
//! [`Session`] is the seam between this crate and an IMAP implementation. It is implemented for
//! [`imap::Session`], and can be implemented by hand to drive the pipeline from anything else,
//! such as the in-memory mailbox in the `testing` module.

use std::error::Error as StdError;
use std::io::{Read, Write};

use tracing::trace;

use crate::types::{Flag, RawRecord, StoreOp, Uid, UidSet};
use crate::utils::iter_join;

/// An authenticated IMAP session with a mailbox already selected.
///
/// Every method maps onto a single IMAP command. Implementations are used from one thread at a
/// time: the [`Client`](crate::client::Client) hands the session to its worker behind a mutex.
pub trait Session {
    /// The error reported when a command fails.
    type Error: StdError + Send + 'static;

    /// Issue `UID SEARCH` with the given criteria, e.g. `["SINCE", "02-Jan-2006"]`.
    ///
    /// The returned identifiers are in ascending order.
    fn uid_search(&mut self, terms: &[String]) -> Result<Vec<Uid>, Self::Error>;

    /// Issue `UID FETCH` for `uids`, asking for the given data items.
    ///
    /// Every `FETCH` response the server sends back is returned, in the order it arrived,
    /// including unsolicited ones that may not carry the requested items.
    fn uid_fetch(&mut self, uids: &UidSet, fields: &[&str]) -> Result<Vec<RawRecord>, Self::Error>;

    /// Issue `UID STORE` adding or removing `flag` on `uids`.
    fn uid_store(&mut self, uids: &UidSet, op: StoreOp, flag: Flag) -> Result<(), Self::Error>;
}

impl<S: Session + ?Sized> Session for &mut S {
    type Error = S::Error;

    fn uid_search(&mut self, terms: &[String]) -> Result<Vec<Uid>, Self::Error> {
        (**self).uid_search(terms)
    }

    fn uid_fetch(&mut self, uids: &UidSet, fields: &[&str]) -> Result<Vec<RawRecord>, Self::Error> {
        (**self).uid_fetch(uids, fields)
    }

    fn uid_store(&mut self, uids: &UidSet, op: StoreOp, flag: Flag) -> Result<(), Self::Error> {
        (**self).uid_store(uids, op, flag)
    }
}

impl<T: Read + Write> Session for imap::Session<T> {
    type Error = imap::Error;

    fn uid_search(&mut self, terms: &[String]) -> Result<Vec<Uid>, Self::Error> {
        let query = iter_join(terms, " ");
        trace!(%query, "uid search");
        let mut uids: Vec<Uid> = imap::Session::uid_search(self, query)?.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn uid_fetch(&mut self, uids: &UidSet, fields: &[&str]) -> Result<Vec<RawRecord>, Self::Error> {
        let query = format!("({})", fields.join(" "));
        trace!(uids = %uids, %query, "uid fetch");
        let fetches = imap::Session::uid_fetch(self, uids.to_string(), query)?;
        Ok(fetches
            .iter()
            .map(|fetch| RawRecord {
                uid: fetch.uid,
                internal_date: fetch.internal_date(),
                header: fetch.header().map(<[u8]>::to_vec),
                body: fetch.body().map(<[u8]>::to_vec),
            })
            .collect())
    }

    fn uid_store(&mut self, uids: &UidSet, op: StoreOp, flag: Flag) -> Result<(), Self::Error> {
        let query = format!("{} {}", op, flag);
        trace!(uids = %uids, %query, "uid store");
        imap::Session::uid_store(self, uids.to_string(), query)?;
        Ok(())
    }
}
