//! Turn fetched header and body bytes into an [`Email`].

use chrono::{DateTime, FixedOffset};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while1},
    combinator::{opt, verify},
    multi::many0,
    sequence::terminated,
    IResult,
};

use super::error::ParseError;
use super::types::{Email, Headers, Message, Uid};

/// Separates the `RFC822.HEADER` bytes from the `BODY[]` bytes when the two are glued back into
/// a single message.
const HEADER_BODY_SEPARATOR: &[u8] = b"\n\n";

/// Build an [`Email`] from the pieces of a `UID FETCH` response.
///
/// The header block, an empty line and then the body are concatenated and parsed as one
/// message, so the parsed body is everything that follows the end of the header block.
pub fn new_email(
    uid: Uid,
    internal_date: Option<DateTime<FixedOffset>>,
    header: &[u8],
    body: &[u8],
) -> Result<Email, ParseError> {
    let mut raw = Vec::with_capacity(header.len() + HEADER_BODY_SEPARATOR.len() + body.len());
    raw.extend_from_slice(header);
    raw.extend_from_slice(HEADER_BODY_SEPARATOR);
    raw.extend_from_slice(body);

    Ok(Email {
        uid,
        internal_date,
        message: parse_message(&raw)?,
    })
}

/// Parse a message into its header fields and its body.
///
/// The header block ends at the first empty line; everything after that line is the body. If
/// the input ends before an empty line is seen, the fields read so far make up the header and
/// the body is empty.
pub fn parse_message(raw: &[u8]) -> Result<Message, ParseError> {
    let mut headers = Headers::default();
    let mut input = raw;
    loop {
        if input.is_empty() {
            if headers.is_empty() {
                return Err(ParseError::Empty);
            }
            return Ok(Message {
                headers,
                body: Vec::new(),
            });
        }

        if let Ok((body, _)) = blank_line(input) {
            return Ok(Message {
                headers,
                body: body.to_vec(),
            });
        }

        if headers.is_empty() && is_wsp(input[0]) {
            return Err(ParseError::InitialLine(first_line(input)));
        }

        match field(input) {
            Ok((rest, (name, value))) => {
                headers.append(canonical_key(&String::from_utf8_lossy(name)), value);
                input = rest;
            }
            Err(_) => return Err(ParseError::HeaderLine(first_line(input))),
        }
    }
}

/// Canonicalize a header field name: the first letter and any letter following a hyphen are
/// upper-cased, the rest lower-cased (`content-type` becomes `Content-Type`).
///
/// Names containing bytes that are not valid in a field name are returned unchanged.
pub(crate) fn canonical_key(name: &str) -> String {
    if !name.bytes().all(is_token) {
        return name.to_string();
    }

    let mut upper = true;
    name.chars()
        .map(|c| {
            let c = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            c
        })
        .collect()
}

/// `tchar` from [RFC 7230](https://tools.ietf.org/html/rfc7230#section-3.2.6).
fn is_token(c: u8) -> bool {
    c.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&c)
}

fn is_wsp(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

fn trim_wsp(mut s: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = s {
        if first.is_ascii_whitespace() {
            s = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = s {
        if last.is_ascii_whitespace() {
            s = rest;
        } else {
            break;
        }
    }
    s
}

fn first_line(input: &[u8]) -> String {
    let line = input.split(|&c| c == b'\n').next().unwrap_or(input);
    String::from_utf8_lossy(line.strip_suffix(b"\r").unwrap_or(line)).into_owned()
}

fn blank_line(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((tag("\r\n"), tag("\n")))(i)
}

/// One physical line, without its LF. The LF may be missing at the very end of the input.
fn line(i: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_till(|c| c == b'\n'), opt(tag("\n")))(i)
}

fn continuation(i: &[u8]) -> IResult<&[u8], &[u8]> {
    verify(line, |l: &[u8]| l.first().copied().is_some_and(is_wsp))(i)
}

/// A header field, with any folded continuation lines joined onto its value.
fn field(i: &[u8]) -> IResult<&[u8], (&[u8], String)> {
    let (i, name) = take_while1(is_token)(i)?;
    let (i, _) = tag(":")(i)?;
    let (i, first) = line(i)?;
    let (i, folded) = many0(continuation)(i)?;

    let mut value = trim_wsp(first).to_vec();
    for part in folded {
        let part = trim_wsp(part);
        if part.is_empty() {
            continue;
        }
        if !value.is_empty() {
            value.push(b' ');
        }
        value.extend_from_slice(part);
    }
    Ok((i, (name, String::from_utf8_lossy(&value).into_owned())))
}
