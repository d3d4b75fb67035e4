//! A small, streaming HTML tokenizer.
//!
//! This is not an HTML5 parser: it recognizes just enough structure (tags, comments,
//! declarations, raw-text elements and character references) to tell markup apart from the text
//! a reader would see. Input is pulled from an [`io::Read`] in chunks, and only the markup that
//! is still open is buffered, so memory is bounded by the largest single tag or comment rather
//! than by the body.
//!
//! Named character references are resolved against the full HTML5 table.

use std::io::{self, Read};
use std::mem;

use nom::{
    branch::alt,
    bytes::complete::take_till1,
    bytes::streaming::{tag, take, take_till, take_until, take_while, take_while1},
    combinator::{map, peek, recognize, verify},
    multi::many0_count,
    sequence::{delimited, pair, terminated, tuple},
    IResult,
};

const READ_CHUNK: usize = 4096;

/// `&` + the longest named reference (`CounterClockwiseContourIntegral`) + `;`.
const MAX_REFERENCE_LEN: usize = 33;

/// Elements whose content is not markup: everything up to the matching end tag is text.
const RAW_TEXT_ELEMENTS: [&str; 10] = [
    "script",
    "style",
    "textarea",
    "title",
    "xmp",
    "iframe",
    "noembed",
    "noframes",
    "noscript",
    "plaintext",
];

/// Has no end tag: once open, the rest of the document is text.
const PLAINTEXT: &[u8] = b"plaintext";

/// Raw-text elements whose content still has character references decoded.
const ESCAPABLE_RAW_TEXT_ELEMENTS: [&str; 2] = ["textarea", "title"];

/// A lexical unit of an HTML document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// A run of text, with character references decoded.
    Text(Vec<u8>),
    /// `<name ...>`; the name is lower-cased.
    StartTag(Vec<u8>),
    /// `</name ...>`; the name is lower-cased.
    EndTag(Vec<u8>),
    /// `<name ... />`; the name is lower-cased.
    SelfClosingTag(Vec<u8>),
    /// `<!-- ... -->`, or a bogus declaration such as `<?xml ...>`.
    Comment,
    /// `<!DOCTYPE ...>`.
    Doctype,
}

enum Piece {
    Text { raw: Vec<u8>, decode: bool },
    Markup(Token),
}

enum Lexed {
    Piece(usize, Piece),
    EndOfRawText,
    NeedMore,
}

/// Splits an HTML byte stream into [`Token`]s.
///
/// Adjacent text is always coalesced into a single [`Token::Text`], however it was split across
/// reads.
pub struct Tokenizer<R> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
    /// Lower-cased name of the raw-text element currently open.
    raw_text: Option<Vec<u8>>,
    pending: Vec<u8>,
    pending_decode: bool,
    queued: Option<Token>,
    failed: Option<io::Error>,
    /// A read error hit after some bytes of the same fill had already arrived.
    read_error: Option<io::Error>,
}

impl<R: Read> Tokenizer<R> {
    /// Tokenize the markup produced by `reader`.
    pub fn new(reader: R) -> Self {
        Tokenizer {
            reader,
            buf: Vec::new(),
            pos: 0,
            eof: false,
            raw_text: None,
            pending: Vec::new(),
            pending_decode: true,
            queued: None,
            failed: None,
            read_error: None,
        }
    }

    /// Produce the next token, or `None` once the reader is exhausted.
    ///
    /// A read error is returned as soon as any text read before it has been handed out. Markup
    /// left unterminated at the end of the stream is dropped.
    pub fn next_token(&mut self) -> io::Result<Option<Token>> {
        if let Some(token) = self.queued.take() {
            return Ok(Some(token));
        }
        if let Some(err) = self.failed.take() {
            return Err(err);
        }

        loop {
            match self.step() {
                Ok(Some(Piece::Text { raw, decode })) => {
                    if self.pending.is_empty() {
                        self.pending_decode = decode;
                    }
                    self.pending.extend_from_slice(&raw);
                }
                Ok(Some(Piece::Markup(token))) => {
                    if self.pending.is_empty() {
                        return Ok(Some(token));
                    }
                    self.queued = Some(token);
                    return Ok(self.flush());
                }
                Ok(None) => return Ok(self.flush()),
                Err(err) => {
                    if self.pending.is_empty() {
                        return Err(err);
                    }
                    self.failed = Some(err);
                    return Ok(self.flush());
                }
            }
        }
    }

    fn flush(&mut self) -> Option<Token> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = mem::take(&mut self.pending);
        if self.pending_decode {
            Some(Token::Text(decode_entities(&raw)))
        } else {
            Some(Token::Text(raw))
        }
    }

    fn step(&mut self) -> io::Result<Option<Piece>> {
        loop {
            let input = &self.buf[self.pos..];
            let lexed = match &self.raw_text {
                Some(name) => raw_text(input, name),
                None => markup(input),
            };

            match lexed {
                Lexed::Piece(len, piece) => {
                    self.pos += len;
                    if let Piece::Markup(Token::StartTag(name)) = &piece {
                        if RAW_TEXT_ELEMENTS.iter().any(|e| e.as_bytes() == &name[..]) {
                            self.raw_text = Some(name.clone());
                        }
                    }
                    return Ok(Some(piece));
                }
                Lexed::EndOfRawText => self.raw_text = None,
                Lexed::NeedMore if self.eof => return Ok(self.finish()),
                Lexed::NeedMore => self.fill()?,
            }
        }
    }

    /// Deal with whatever is left once the reader is exhausted.
    fn finish(&mut self) -> Option<Piece> {
        let rest = &self.buf[self.pos..];
        if rest.is_empty() {
            return None;
        }

        let piece = match &self.raw_text {
            Some(name) => Some(Piece::Text {
                raw: rest.to_vec(),
                decode: is_escapable(name),
            }),
            None if rest == b"<" || rest == b"</" => Some(Piece::Text {
                raw: rest.to_vec(),
                decode: true,
            }),
            None => None,
        };
        self.pos = self.buf.len();
        piece
    }

    /// Read more input. Whatever is left in the buffer is an unfinished piece of markup that
    /// will be lexed again from its start, so at least as many bytes as it holds are read
    /// first; the buffer doubles on every retry and the total work stays linear.
    fn fill(&mut self) -> io::Result<()> {
        if let Some(err) = self.read_error.take() {
            return Err(err);
        }
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }

        let want = self.buf.len().max(1);
        let mut got = 0;
        let mut chunk = [0u8; READ_CHUNK];
        while got < want {
            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    got += n;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if got == 0 => return Err(e),
                Err(e) => {
                    // lex what did arrive before reporting it
                    self.read_error = Some(e);
                    break;
                }
            }
        }
        Ok(())
    }
}

fn is_escapable(name: &[u8]) -> bool {
    ESCAPABLE_RAW_TEXT_ELEMENTS
        .iter()
        .any(|e| e.as_bytes() == name)
}

fn markup(input: &[u8]) -> Lexed {
    if input.is_empty() {
        return Lexed::NeedMore;
    }

    match alt((
        comment,
        declaration,
        end_tag,
        bogus_end_tag,
        start_tag,
        stray_lt,
        text,
    ))(input)
    {
        Ok((rest, piece)) => Lexed::Piece(input.len() - rest.len(), piece),
        Err(nom::Err::Incomplete(_)) => Lexed::NeedMore,
        Err(_) => Lexed::Piece(
            1,
            Piece::Text {
                raw: input[..1].to_vec(),
                decode: true,
            },
        ),
    }
}

/// Text inside a raw-text element, up to (not including) its end tag.
fn raw_text(input: &[u8], name: &[u8]) -> Lexed {
    let text = |end: usize| {
        Lexed::Piece(
            end,
            Piece::Text {
                raw: input[..end].to_vec(),
                decode: is_escapable(name),
            },
        )
    };

    if name == PLAINTEXT {
        return match input.len() {
            0 => Lexed::NeedMore,
            end => text(end),
        };
    }

    match raw_text_end(input, name) {
        Some(0) => Lexed::EndOfRawText,
        Some(end) => text(end),
        // hold back from the last `<`, which may be the start of a split end tag
        None => match input.iter().rposition(|&c| c == b'<') {
            Some(0) => Lexed::NeedMore,
            Some(end) => text(end),
            None if input.is_empty() => Lexed::NeedMore,
            None => text(input.len()),
        },
    }
}

/// Offset of the `</name` that closes the raw-text element `name`, if it is in `input`.
fn raw_text_end(input: &[u8], name: &[u8]) -> Option<usize> {
    let closing = name.len() + 2;
    input
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c == b'<')
        .map(|(i, _)| i)
        .find(|&i| {
            let rest = &input[i..];
            rest.len() > closing
                && rest[1] == b'/'
                && rest[2..closing].eq_ignore_ascii_case(name)
                && is_name_end(rest[closing])
        })
}

fn is_name_end(c: u8) -> bool {
    c.is_ascii_whitespace() || c == b'/' || c == b'>'
}

fn is_markup_opener(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'/' || c == b'!' || c == b'?'
}

fn tag_name(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(pair(
        verify(take(1usize), |c: &[u8]| c[0].is_ascii_alphabetic()),
        take_till(is_name_end),
    ))(i)
}

fn comment(i: &[u8]) -> IResult<&[u8], Piece> {
    map(delimited(tag("<!--"), take_until("-->"), tag("-->")), |_| {
        Piece::Markup(Token::Comment)
    })(i)
}

fn declaration(i: &[u8]) -> IResult<&[u8], Piece> {
    let (i, open) = alt((tag("<!"), tag("<?")))(i)?;
    let (i, body) = take_till(|c| c == b'>')(i)?;
    let (i, _) = tag(">")(i)?;

    let doctype = open == b"<!" && body.len() >= 7 && body[..7].eq_ignore_ascii_case(b"doctype");
    let token = if doctype { Token::Doctype } else { Token::Comment };
    Ok((i, Piece::Markup(token)))
}

fn end_tag(i: &[u8]) -> IResult<&[u8], Piece> {
    let (i, _) = tag("</")(i)?;
    let (i, name) = tag_name(i)?;
    let (i, _) = take_till(|c| c == b'>')(i)?;
    let (i, _) = tag(">")(i)?;
    Ok((i, Piece::Markup(Token::EndTag(name.to_ascii_lowercase()))))
}

/// `</` not followed by a name, such as `</ >` or `</3>`.
fn bogus_end_tag(i: &[u8]) -> IResult<&[u8], Piece> {
    map(
        delimited(tag("</"), take_till(|c| c == b'>'), tag(">")),
        |_| Piece::Markup(Token::Comment),
    )(i)
}

fn double_quoted(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(delimited(tag("\""), take_till(|c| c == b'"'), tag("\"")))(i)
}

fn single_quoted(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(delimited(tag("'"), take_till(|c| c == b'\''), tag("'")))(i)
}

/// `= "value"`; quotes only delimit a value directly after the `=`.
fn quoted_value(i: &[u8]) -> IResult<&[u8], &[u8]> {
    recognize(tuple((
        tag("="),
        take_while(|c: u8| c.is_ascii_whitespace()),
        alt((double_quoted, single_quoted)),
    )))(i)
}

fn start_tag(i: &[u8]) -> IResult<&[u8], Piece> {
    let (i, _) = tag("<")(i)?;
    let (i, name) = tag_name(i)?;
    let (i, attrs) = recognize(many0_count(alt((
        quoted_value,
        tag("="),
        take_while1(|c| c != b'>' && c != b'='),
    ))))(i)?;
    let (i, _) = tag(">")(i)?;

    let name = name.to_ascii_lowercase();
    let token = if attrs.last() == Some(&b'/') {
        Token::SelfClosingTag(name)
    } else {
        Token::StartTag(name)
    };
    Ok((i, Piece::Markup(token)))
}

/// A `<` that cannot open markup, as in `a < b`.
fn stray_lt(i: &[u8]) -> IResult<&[u8], Piece> {
    map(
        terminated(
            tag("<"),
            peek(verify(take(1usize), |c: &[u8]| !is_markup_opener(c[0]))),
        ),
        |lt: &[u8]| Piece::Text {
            raw: lt.to_vec(),
            decode: true,
        },
    )(i)
}

/// Text up to the next `<` or the end of what has been read so far.
fn text(i: &[u8]) -> IResult<&[u8], Piece> {
    map(take_till1(|c| c == b'<'), |t: &[u8]| Piece::Text {
        raw: t.to_vec(),
        decode: true,
    })(i)
}

/// Replace character references with the characters they stand for. Unknown named references
/// are left as they are; numeric references to invalid code points become U+FFFD.
fn decode_entities(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'&' {
            if let Some(len) = entity(&raw[i..], &mut out) {
                i += len;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    out
}

/// Decode the `&...;` reference at the start of `input` onto `out`, returning its length.
fn entity(input: &[u8], out: &mut Vec<u8>) -> Option<usize> {
    let end = input
        .iter()
        .take(MAX_REFERENCE_LEN)
        .position(|&c| c == b';')?;
    let c = match &input[1..end] {
        [b'#', b'x' | b'X', hex @ ..] => numeric(hex, 16)?,
        [b'#', dec @ ..] => numeric(dec, 10)?,
        name if !name.is_empty() && name.iter().all(u8::is_ascii_alphanumeric) => {
            // some references expand to more than one code point
            let reference = std::str::from_utf8(&input[..=end]).ok()?;
            let decoded = html_escape::decode_html_entities(reference);
            if decoded == reference {
                return None;
            }
            out.extend_from_slice(decoded.as_bytes());
            return Some(end + 1);
        }
        _ => return None,
    };
    let mut utf8 = [0; 4];
    out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    Some(end + 1)
}

fn numeric(digits: &[u8], radix: u32) -> Option<char> {
    if digits.is_empty() || !digits.iter().all(|&c| (c as char).is_digit(radix)) {
        return None;
    }
    let c = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| u32::from_str_radix(s, radix).ok())
        .and_then(char::from_u32)
        .filter(|&c| c != '\0')
        .unwrap_or(char::REPLACEMENT_CHARACTER);
    Some(c)
}
