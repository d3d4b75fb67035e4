//! Settings for connecting to a mailbox and streaming from it.

/// How many retrieved messages may wait, undelivered, between the worker and the caller.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Connection and retrieval settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Connect over TLS rather than plaintext.
    pub tls: bool,
    /// The mailbox to select after logging in.
    pub folder: String,
    /// Open the mailbox with `EXAMINE` instead of `SELECT`.
    ///
    /// Servers refuse flag changes in a read-only mailbox, so retrieval should then be done with
    /// `mark_as_read` set and `delete` unset.
    pub read_only: bool,
    /// Bound on undelivered responses per retrieval call; a full queue blocks the worker.
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tls: false,
            folder: "INBOX".to_string(),
            read_only: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    /// Connect over TLS, or not.
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Select `folder` instead of `INBOX`.
    pub fn with_folder<F: Into<String>>(mut self, folder: F) -> Self {
        self.folder = folder.into();
        self
    }

    /// Open the folder read-only.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Change the per-call queue bound. Zero makes every response a hand-off: the worker waits
    /// for the caller on every message.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}
