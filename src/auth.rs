//! Basic-auth emission and request credential extraction.

use crate::connection::Connection;
use crate::message::Message;
use crate::urlencoded::get_var;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bstr::{BString, ByteSlice};

/// Appends an `Authorization: Basic` header for `user`/`pass` to the send
/// buffer. The `:` separator is omitted when the password is empty.
pub fn basic_auth(conn: &mut Connection, user: &str, pass: &str) {
    let mut plain = Vec::from(user.as_bytes());
    if !pass.is_empty() {
        plain.push(b':');
        plain.extend_from_slice(pass.as_bytes());
    }
    let line = format!("Authorization: Basic {}\r\n", STANDARD.encode(&plain));
    conn.send.add(line.as_bytes());
}

/// Extracts credentials from a request, in priority order:
///
/// 1. `Authorization: Basic`, decoded and split at the first `:`;
/// 2. `Authorization: Bearer`, with the token returned as the password;
/// 3. a `Cookie` header's `access_token` value (terminated by `;`, space or
///    end of value), checked whenever the `Authorization` header is absent
///    or unrecognized;
/// 4. an `access_token` query variable, only when no `Cookie` header exists.
///
/// Absent or undecodable credentials yield empty strings.
pub fn creds(hm: &Message<'_>) -> (BString, BString) {
    let mut user = BString::from("");
    let mut pass = BString::from("");
    let auth = hm.header("Authorization");
    if let Some(v) = auth.filter(|v| v.len() > 6 && v.starts_with(b"Basic ")) {
        if let Ok(plain) = STANDARD.decode(&v[6..]) {
            if let Some(colon) = plain.find_byte(b':') {
                user = BString::from(&plain[..colon]);
                pass = BString::from(&plain[colon + 1..]);
            }
        }
    } else if let Some(v) = auth.filter(|v| v.len() > 7 && v.starts_with(b"Bearer ")) {
        pass = BString::from(&v[7..]);
    } else if let Some(v) = hm.header("Cookie") {
        const TOKEN: &[u8] = b"access_token=";
        if v.len() >= TOKEN.len() {
            if let Some(at) = v.find(TOKEN) {
                let value = &v[at + TOKEN.len()..];
                let end = value
                    .iter()
                    .position(|&c| c == b';' || c == b' ')
                    .unwrap_or(value.len());
                pass = BString::from(&value[..end]);
            }
        }
    } else {
        let mut buf = [0u8; 256];
        if let Ok(n) = get_var(hm.query, "access_token", &mut buf) {
            pass = BString::from(&buf[..n]);
        }
    }
    (user, pass)
}
