//! This module contains types used throughout the retrieval pipeline.

use std::collections::HashSet;
use std::fmt;

use crate::utils::iter_join_onto;

/// From section [2.3.1.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.1).
///
/// A 32-bit value assigned to each message by the server. Unique identifiers do not change
/// during the session, so they are what this crate uses to fetch a message and to alter its
/// flags afterwards.
pub type Uid = imap::types::Uid;

/// An ordered set of [`Uid`]s, as sent in a `UID FETCH` or `UID STORE` command.
///
/// The set remembers insertion order and silently drops duplicates, so collecting the result of
/// a `UID SEARCH` preserves whatever order the server used. It renders as the sequence-set form
/// IMAP expects, with ascending runs of consecutive identifiers collapsed into ranges
/// (`1:5,9,3`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UidSet {
    order: Vec<Uid>,
    index: HashSet<Uid>,
}

impl UidSet {
    /// An empty set.
    pub fn new() -> Self {
        UidSet::default()
    }

    /// A set holding exactly one message.
    pub fn single(uid: Uid) -> Self {
        let mut set = UidSet::new();
        set.insert(uid);
        set
    }

    /// Add `uid` to the end of the set unless it is already present.
    ///
    /// Returns `true` if the set changed.
    pub fn insert(&mut self, uid: Uid) -> bool {
        if !self.index.insert(uid) {
            return false;
        }
        self.order.push(uid);
        true
    }

    /// Whether the set holds no identifiers.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The number of identifiers in the set.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether `uid` is in the set.
    pub fn contains(&self, uid: Uid) -> bool {
        self.index.contains(&uid)
    }

    /// Iterate over the identifiers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Uid> + '_ {
        self.order.iter().copied()
    }

    fn runs(&self) -> Vec<Run> {
        let mut runs: Vec<Run> = Vec::new();
        for &uid in &self.order {
            match runs.last_mut() {
                Some(run) if run.last.checked_add(1) == Some(uid) => run.last = uid,
                _ => runs.push(Run {
                    first: uid,
                    last: uid,
                }),
            }
        }
        runs
    }
}

impl FromIterator<Uid> for UidSet {
    fn from_iter<I: IntoIterator<Item = Uid>>(iter: I) -> Self {
        let mut set = UidSet::new();
        for uid in iter {
            set.insert(uid);
        }
        set
    }
}

impl fmt::Display for UidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        iter_join_onto(f, self.runs(), ",")
    }
}

/// `first:last`, or just `first` for a run of one.
struct Run {
    first: Uid,
    last: Uid,
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}:{}", self.first, self.last)
        }
    }
}

mod email;
pub use self::email::{Email, Headers, Message};

mod fetch;
pub use self::fetch::RawRecord;

mod flag;
pub use self::flag::{Flag, FlagChange, StoreOp};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_set_keeps_first_occurrence_order() {
        let set: UidSet = vec![9, 3, 9, 5, 3].into_iter().collect();
        assert_eq!(set.len(), 3);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![9, 3, 5]);
        assert_eq!(set.to_string(), "9,3,5");
    }

    #[test]
    fn uid_set_single() {
        let set = UidSet::single(42);
        assert!(set.contains(42));
        assert!(!set.contains(41));
        assert_eq!(set.to_string(), "42");
    }

    #[test]
    fn uid_set_empty() {
        let mut set = UidSet::new();
        assert!(set.is_empty());
        assert_eq!(set.to_string(), "");
        assert!(set.insert(1));
        assert!(!set.insert(1));
        assert!(!set.is_empty());
    }

    #[test]
    fn consecutive_runs_become_ranges() {
        let set: UidSet = (1..=5).chain([9]).collect();
        assert_eq!(set.to_string(), "1:5,9");

        let set: UidSet = vec![7, 8, 2, 3, 4, 10].into_iter().collect();
        assert_eq!(set.to_string(), "7:8,2:4,10");

        // descending neighbours are not a run
        let set: UidSet = vec![3, 2, 1].into_iter().collect();
        assert_eq!(set.to_string(), "3,2,1");
    }

    #[test]
    fn large_search_result() {
        let set: UidSet = (1..=100_000).chain(1..=100_000).collect();
        assert_eq!(set.len(), 100_000);
        assert!(set.contains(100_000));
        assert_eq!(set.to_string(), "1:100000");
    }

    #[test]
    fn run_ends_at_max_uid() {
        let set: UidSet = vec![Uid::MAX - 1, Uid::MAX, 1].into_iter().collect();
        assert_eq!(set.to_string(), format!("{}:{},1", Uid::MAX - 1, Uid::MAX));
    }
}
