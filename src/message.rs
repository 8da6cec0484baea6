//! Zero-copy views over one framed HTTP message.
//!
//! Every field of a [`Message`] borrows from the receive buffer it was parsed
//! out of; the borrow ends before the multiplexer consumes the framed prefix,
//! so a view can never dangle. Anything that must outlive the dispatch has to
//! be copied out.

use crate::util::globmatch;
use bstr::ByteSlice;
use std::fmt;

/// Declared body length when the peer did not say: read until close.
pub const UNTIL_CLOSE: u64 = u64::MAX;

/// One indexed header line. A colon-less LF-terminated line occupies a slot
/// with an empty name, which also terminates lookup.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub name: &'a [u8],
    pub value: &'a [u8],
}

impl fmt::Debug for Header<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("name", &self.name.as_bstr())
            .field("value", &self.value.as_bstr())
            .finish()
    }
}

/// A parsed request or response. For responses, `method` holds the
/// `HTTP/x.y` token and `uri` the status digits.
pub struct Message<'a> {
    pub method: &'a [u8],
    pub uri: &'a [u8],
    pub query: &'a [u8],
    pub proto: &'a [u8],
    /// Start of the message through the end-of-headers terminator, inclusive.
    pub head: &'a [u8],
    /// Body bytes available in the buffer, clamped to `body_len`.
    pub body: &'a [u8],
    /// Declared body length; [`UNTIL_CLOSE`] when unknown.
    pub body_len: u64,
    /// `head.len() + body_len`, saturating at [`UNTIL_CLOSE`].
    pub message_len: u64,
    pub headers: Vec<Header<'a>>,
}

impl<'a> Message<'a> {
    /// Case-insensitive header lookup. Scans in order and stops at the first
    /// empty name, so headers past a malformed line are not visible.
    pub fn header(&self, name: &str) -> Option<&'a [u8]> {
        for h in &self.headers {
            if h.name.is_empty() {
                return None;
            }
            if h.name.eq_ignore_ascii_case(name.as_bytes()) {
                return Some(h.value);
            }
        }
        None
    }

    /// True when this message is a response (the method slot carries the
    /// protocol token).
    pub fn is_response(&self) -> bool {
        self.method.len() >= 5 && self.method[..5].eq_ignore_ascii_case(b"HTTP/")
    }

    /// Matches the request URI against a glob pattern (`*` within a path
    /// segment, `#` across segments, `?` for one byte).
    pub fn match_uri(&self, pattern: &str) -> bool {
        globmatch(pattern.as_bytes(), self.uri)
    }
}

impl fmt::Debug for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("method", &self.method.as_bstr())
            .field("uri", &self.uri.as_bstr())
            .field("query", &self.query.as_bstr())
            .field("proto", &self.proto.as_bstr())
            .field("head_len", &self.head.len())
            .field("body_len", &self.body_len)
            .field("message_len", &self.message_len)
            .field("headers", &self.headers)
            .finish()
    }
}
