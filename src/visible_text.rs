//! Extract the text a reader would actually see from an HTML mail body.

use std::io::{self, Read};

use tracing::trace;

use crate::error::ExtractionError;
use crate::html::{Token, Tokenizer};
use crate::utils::trim_space;

/// Tag names whose content is never shown to the reader.
///
/// `doctype` and `!` are listed for completeness; doctypes and comments are separate tokens and
/// never open a hidden region on their own.
pub const NON_VISIBLE_TAGS: [&str; 8] = [
    "style",
    "script",
    "head",
    "meta",
    "doctype",
    "v:shape",
    "v:imagedata",
    "!",
];

/// How hidden regions are tracked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Suppression {
    /// A single switch: any start tag from [`NON_VISIBLE_TAGS`] hides text and any end tag from
    /// that list shows it again. In `<head><style></style>title</head>` the text `title` is
    /// therefore visible, as is everything after an unclosed `<meta>` until the next listed end
    /// tag.
    #[default]
    Flat,
    /// One depth counter per tag name; text is hidden while any counter is non-zero. `meta` is a
    /// void element and never opens a region.
    Nested,
}

/// An iterator over the visible text fragments of an HTML document.
///
/// Each fragment is a trimmed, non-empty run of text from outside any hidden region. The
/// iterator ends at the end of the stream; a read error is yielded once and ends it too.
pub struct VisibleText<R> {
    tokenizer: Tokenizer<R>,
    suppression: Suppression,
    suppressed: bool,
    depth: [usize; NON_VISIBLE_TAGS.len()],
    done: bool,
}

impl<R: Read> VisibleText<R> {
    /// Extract from `body` using [`Suppression::Flat`].
    pub fn new(body: R) -> Self {
        VisibleText {
            tokenizer: Tokenizer::new(body),
            suppression: Suppression::default(),
            suppressed: false,
            depth: [0; NON_VISIBLE_TAGS.len()],
            done: false,
        }
    }

    /// Choose how hidden regions are tracked.
    pub fn with_suppression(mut self, suppression: Suppression) -> Self {
        self.suppression = suppression;
        self
    }

    fn is_suppressed(&self) -> bool {
        match self.suppression {
            Suppression::Flat => self.suppressed,
            Suppression::Nested => self.depth.iter().any(|&d| d > 0),
        }
    }

    fn toggle(&mut self, name: &[u8], opening: bool) {
        let Some(i) = NON_VISIBLE_TAGS.iter().position(|t| t.as_bytes() == name) else {
            return;
        };
        match self.suppression {
            Suppression::Flat => self.suppressed = opening,
            Suppression::Nested if opening => {
                if name != b"meta" {
                    self.depth[i] += 1;
                }
            }
            Suppression::Nested => self.depth[i] = self.depth[i].saturating_sub(1),
        }
    }
}

impl<R: Read> Iterator for VisibleText<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.tokenizer.next_token() {
                Ok(Some(Token::Text(text))) => {
                    if self.is_suppressed() {
                        continue;
                    }
                    let text = trim_space(&text);
                    if !text.is_empty() {
                        return Some(Ok(text.to_vec()));
                    }
                }
                Ok(Some(Token::StartTag(name))) => self.toggle(&name, true),
                Ok(Some(Token::EndTag(name))) => self.toggle(&name, false),
                Ok(Some(_)) => {}
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Collect the visible text fragments of `body`, in document order.
///
/// The end of the stream, even in the middle of a tag, is not an error. Any other read failure
/// is returned together with the fragments collected before it.
pub fn visible_text<R: Read>(body: R) -> Result<Vec<Vec<u8>>, ExtractionError> {
    let mut fragments = Vec::new();
    for fragment in VisibleText::new(body) {
        match fragment {
            Ok(fragment) => fragments.push(fragment),
            Err(source) => {
                trace!(fragments = fragments.len(), "visible text extraction failed: {}", source);
                return Err(ExtractionError { fragments, source });
            }
        }
    }
    Ok(fragments)
}
