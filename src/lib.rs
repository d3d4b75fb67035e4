//! Streaming mailbox ingestion on top of IMAP.
//!
//! This crate turns an IMAP mailbox into a stream of parsed emails. A retrieval call searches
//! the selected folder, fetches every match in a single batch, parses each message and hands it
//! to the caller through a bounded queue, while a worker thread keeps the server-side flags in
//! order: `\Seen` is cleared again unless the caller asked to mark messages as read, and
//! `\Deleted` is set when the caller asked for deletion. A separate extractor pulls the
//! human-visible text out of HTML bodies.
//!
//! # Usage
//!
//! ```no_run
//! use imap_ingest::{ClientBuilder, Config};
//!
//! fn main() -> imap_ingest::Result<()> {
//!     let client = ClientBuilder::new("imap.example.com", 993)
//!         .config(Config::default().with_tls(true))
//!         .connect("username", "password")?;
//!
//!     // everything unread, left unread and in place
//!     for response in client.generate_unread(false, false)? {
//!         let email = response?;
//!         println!("{:?}", email.message().subject());
//!         for fragment in email.message().visible_text()? {
//!             println!("  {}", String::from_utf8_lossy(&fragment));
//!         }
//!     }
//!
//!     client.with_session(|session| session.logout())??;
//!     Ok(())
//! }
//! ```
//!
//! Any type implementing [`Session`] can stand in for the IMAP connection; enable the
//! `test_helpers` feature for an in-memory one in [`testing`].

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod client_builder;
mod parse;
mod types;
mod utils;

pub mod client;
pub mod config;
pub mod error;
pub mod flags;
pub mod html;
pub mod pipeline;
pub mod search;
pub mod session;
pub mod visible_text;

#[cfg(any(test, feature = "test_helpers"))]
pub mod testing;

pub use crate::client::Client;
pub use crate::client_builder::ClientBuilder;
pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::parse::{new_email, parse_message};
pub use crate::pipeline::{FetchOptions, Response, Responses};
pub use crate::search::RetrievalMode;
pub use crate::session::Session;
pub use crate::types::*;
pub use crate::visible_text::{visible_text, Suppression, VisibleText};

#[cfg(test)]
mod mock_stream;
