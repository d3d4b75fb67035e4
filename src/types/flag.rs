use std::fmt;

use super::Uid;

/// The system flags this crate alters. These are pre-defined in [RFC 3501 section
/// 2.3.2](https://tools.ietf.org/html/rfc3501#section-2.3.2) and begin with `\` in the IMAP
/// protocol. Flag names are case-insensitive on the wire; they are sent in upper case.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Flag {
    /// Message has been read
    Seen,

    /// Message is "deleted" for removal by later EXPUNGE
    Deleted,
}

impl Flag {
    /// The flag as it is written in a `STORE` command.
    pub fn as_str(&self) -> &'static str {
        match *self {
            Flag::Seen => "\\SEEN",
            Flag::Deleted => "\\DELETED",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a `STORE` adds or removes flags.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum StoreOp {
    /// `+FLAGS`
    Add,
    /// `-FLAGS`
    Remove,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            StoreOp::Add => write!(f, "+FLAGS"),
            StoreOp::Remove => write!(f, "-FLAGS"),
        }
    }
}

/// A single flag alteration against a single message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlagChange {
    /// The message to alter.
    pub uid: Uid,
    /// The flag to add or remove.
    pub flag: Flag,
    /// Add or remove.
    pub op: StoreOp,
}

impl FlagChange {
    /// Set `flag` on `uid`.
    pub fn add(uid: Uid, flag: Flag) -> Self {
        FlagChange {
            uid,
            flag,
            op: StoreOp::Add,
        }
    }

    /// Clear `flag` on `uid`.
    pub fn remove(uid: Uid, flag: Flag) -> Self {
        FlagChange {
            uid,
            flag,
            op: StoreOp::Remove,
        }
    }
}

impl fmt::Display for FlagChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.op, self.flag) {
            (StoreOp::Remove, Flag::Seen) => write!(f, "remove seen flag from {}", self.uid),
            (StoreOp::Add, Flag::Seen) => write!(f, "set seen flag on {}", self.uid),
            (StoreOp::Add, Flag::Deleted) => write!(f, "delete email {}", self.uid),
            (StoreOp::Remove, Flag::Deleted) => write!(f, "undelete email {}", self.uid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_literals() {
        assert_eq!("\\SEEN", Flag::Seen.to_string());
        assert_eq!("\\DELETED", Flag::Deleted.to_string());
        assert_eq!("+FLAGS", StoreOp::Add.to_string());
        assert_eq!("-FLAGS", StoreOp::Remove.to_string());
    }

    #[test]
    fn change_description() {
        assert_eq!(
            "remove seen flag from 7",
            FlagChange::remove(7, Flag::Seen).to_string()
        );
        assert_eq!("delete email 7", FlagChange::add(7, Flag::Deleted).to_string());
    }
}
