//! Framing and tolerant parsing of HTTP/1.x messages.
//!
//! [`request_length`] finds the end of a header block; [`parse`] tokenizes
//! the framed prefix into a [`Message`] view without copying. Both accept the
//! loose framing real-world peers produce: a bare `\n\n` terminates a header
//! block just like `\r\n\r\n`.

use crate::message::{Header, Message, UNTIL_CLOSE};
use crate::util::{is_print, to_i64};
use crate::MAX_HEADERS;
use nom::bytes::complete::{take_till, take_while};
use nom::sequence::tuple;
use nom::IResult;

/// Outcome of scanning a buffer for the end of a header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// The buffer contains a byte that cannot appear in a header block.
    Invalid,
    /// No terminator yet; more data is needed.
    Partial,
    /// Offset just past the end-of-headers terminator.
    Complete(usize),
}

/// Outcome of a parse attempt over a receive buffer.
#[derive(Debug)]
pub enum Parsed<'a> {
    Invalid,
    Partial,
    Complete(Message<'a>),
}

/// Scans for the end-of-headers terminator: a `\n` preceded by `\n`, or by
/// `\r` preceded by `\n`. Control bytes other than CR and LF are rejected;
/// bytes >= 128 are tolerated.
pub fn request_length(buf: &[u8]) -> Framing {
    for (i, &c) in buf.iter().enumerate() {
        if !is_print(c) && c != b'\r' && c != b'\n' && c < 128 {
            return Framing::Invalid;
        }
        if c == b'\n' {
            if i > 0 && buf[i - 1] == b'\n' {
                return Framing::Complete(i + 1);
            }
            if i > 3 && buf[i - 1] == b'\r' && buf[i - 2] == b'\n' {
                return Framing::Complete(i + 1);
            }
        }
    }
    Framing::Partial
}

/// Splits off the token running up to the first byte in `delims`, then
/// consumes the delimiter run that follows it.
fn token<'a>(input: &'a [u8], delims: &'static [u8]) -> (&'a [u8], &'a [u8]) {
    let is_delim = move |c: u8| delims.contains(&c);
    let parsed: IResult<&[u8], (&[u8], &[u8])> =
        tuple((take_till(is_delim), take_while(is_delim)))(input);
    match parsed {
        Ok((rest, (tok, _))) => (tok, rest),
        // take_till/take_while over complete input cannot fail.
        Err(_) => (input, &input[input.len()..]),
    }
}

/// Tokenizes header lines until a blank line, a malformed terminator, or the
/// header cap. A line without `:` before its CR occupies a slot with an empty
/// name, hiding everything after it from lookup.
fn parse_headers<'a>(mut s: &'a [u8], headers: &mut Vec<Header<'a>>) {
    for _ in 0..MAX_HEADERS {
        if s.is_empty() {
            break;
        }
        let (line_body, rest) = token(s, b"\n");
        let line = &s[..s.len() - rest.len()];
        s = rest;
        let (name, after_name) = token(line, b": \r\n");
        let (mut value, _) = token(after_name, b"\r\n");
        if name.len() == line_body.len() {
            // No separator at all on this line; the slot is burned.
            headers.push(Header {
                name: b"",
                value: b"",
            });
            continue;
        }
        while let [head @ .., b' '] = value {
            value = head;
        }
        if name.is_empty() {
            break;
        }
        headers.push(Header { name, value });
    }
}

/// Parses one HTTP request or response out of `buf`.
///
/// On [`Parsed::Complete`] the returned [`Message`] aliases `buf`; its
/// `head` spans exactly the framed prefix. Body length comes from
/// `Content-Length` when present, defaults to zero for requests whose method
/// is neither `PUT` nor `POST` and for `204` responses, and is otherwise
/// [`UNTIL_CLOSE`].
pub fn parse(buf: &[u8]) -> Parsed<'_> {
    let req_len = match request_length(buf) {
        Framing::Invalid => return Parsed::Invalid,
        Framing::Partial => return Parsed::Partial,
        Framing::Complete(n) => n,
    };
    let head = &buf[..req_len];
    let base = head.as_ptr() as usize;
    let offset = |t: &[u8]| t.as_ptr() as usize - base;

    let (method, rest) = token(head, b" ");
    let (mut uri, rest) = token(rest, b" ");
    let (proto, rest) = token(rest, b"\r\n");
    if offset(uri) <= offset(method) || offset(proto) <= offset(uri) {
        return Parsed::Invalid;
    }

    let mut query: &[u8] = b"";
    if let Some(q) = uri.iter().position(|&c| c == b'?') {
        query = &uri[q + 1..];
        uri = &uri[..q];
    }

    let mut headers = Vec::new();
    parse_headers(rest, &mut headers);

    let mut hm = Message {
        method,
        uri,
        query,
        proto,
        head,
        body: &buf[req_len..],
        body_len: UNTIL_CLOSE,
        message_len: UNTIL_CLOSE,
        headers,
    };

    if let Some(cl) = hm.header("Content-Length") {
        hm.body_len = to_i64(cl) as u64;
        hm.message_len = (req_len as u64).saturating_add(hm.body_len);
    }

    // Requests without a Content-Length have a body only for PUT and POST;
    // responses default to read-until-close, except 204 which has none.
    if hm.body_len == UNTIL_CLOSE && !hm.is_response() {
        if !hm.method.eq_ignore_ascii_case(b"PUT") && !hm.method.eq_ignore_ascii_case(b"POST") {
            hm.body_len = 0;
            hm.message_len = req_len as u64;
        }
    }
    if hm.body_len == UNTIL_CLOSE && hm.is_response() && hm.uri.eq_ignore_ascii_case(b"204") {
        hm.body_len = 0;
        hm.message_len = req_len as u64;
    }

    let avail = (buf.len() - req_len) as u64;
    hm.body = &buf[req_len..req_len + hm.body_len.min(avail) as usize];
    Parsed::Complete(hm)
}
