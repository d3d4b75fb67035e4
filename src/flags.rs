//! Alter the flags of a single message.

use tracing::trace;

use crate::session::Session;
use crate::types::{Flag, FlagChange, Uid, UidSet};

/// Issues one `UID STORE` per call against a borrowed [`Session`].
///
/// Adding a flag that is already set, or removing one that is not, is harmless: IMAP `STORE` is
/// idempotent.
pub struct FlagMutator<'s, S: ?Sized> {
    session: &'s mut S,
}

impl<'s, S: Session + ?Sized> FlagMutator<'s, S> {
    /// Wrap a session.
    pub fn new(session: &'s mut S) -> Self {
        FlagMutator { session }
    }

    /// Set `\Deleted` on `uid`, marking it for removal by a later `EXPUNGE`.
    pub fn mark_deleted(&mut self, uid: Uid) -> Result<(), S::Error> {
        self.apply(FlagChange::add(uid, Flag::Deleted))
    }

    /// Clear `\Seen` on `uid`.
    pub fn mark_unread(&mut self, uid: Uid) -> Result<(), S::Error> {
        self.apply(FlagChange::remove(uid, Flag::Seen))
    }

    /// Set `\Seen` on `uid`.
    pub fn mark_read(&mut self, uid: Uid) -> Result<(), S::Error> {
        self.apply(FlagChange::add(uid, Flag::Seen))
    }

    /// Perform an arbitrary flag change.
    pub fn apply(&mut self, change: FlagChange) -> Result<(), S::Error> {
        trace!(uid = change.uid, "{}", change);
        self.session
            .uid_store(&UidSet::single(change.uid), change.op, change.flag)
    }
}
