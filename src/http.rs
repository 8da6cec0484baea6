//! The HTTP event multiplexer and the entry points that install it.

use crate::connection::{Connection, Event, EventHandler, Proto};
use crate::manager::{ConnId, Manager};
use crate::parser::{parse, Parsed};
use std::cell::RefCell;
use std::rc::Rc;

#[cfg(feature = "debug-endpoint")]
use crate::output::{printf_chunk, write_chunk};
#[cfg(feature = "debug-endpoint")]
use bstr::ByteSlice;

/// Creates a listening connection with the multiplexer installed. Accepted
/// connections ([`Manager::accept`]) share `handler` and receive
/// [`Event::HttpMsg`] per complete request.
pub fn listen(
    mgr: &mut Manager,
    url: &str,
    handler: impl FnMut(&mut Connection, Event<'_>) + 'static,
) -> ConnId {
    let handler: EventHandler = Rc::new(RefCell::new(handler));
    let id = mgr.add(Proto::Http, Some(handler));
    if let Some(conn) = mgr.conn_mut(id) {
        conn.is_listening = true;
        #[cfg(feature = "debug-endpoint")]
        {
            conn.label = "<-LSN".to_string();
        }
    }
    let _ = url;
    id
}

/// Creates an outbound connection with the multiplexer installed. The user
/// handler receives each complete response as [`Event::HttpMsg`].
pub fn connect(
    mgr: &mut Manager,
    url: &str,
    handler: impl FnMut(&mut Connection, Event<'_>) + 'static,
) -> ConnId {
    let handler: EventHandler = Rc::new(RefCell::new(handler));
    let id = mgr.add(Proto::Http, Some(handler));
    if let Some(conn) = mgr.conn_mut(id) {
        conn.is_client = true;
        #[cfg(feature = "debug-endpoint")]
        {
            conn.label = format!("->{}", url);
        }
    }
    let _ = url;
    id
}

/// Frames and dispatches HTTP messages out of `recv`.
///
/// On `Read` the loop drains every complete pipelined message, invoking the
/// user handler once per message and deleting the consumed prefix afterwards,
/// so views never survive consumption. On `Close` whatever bytes remain are
/// forced into the current message's body and handed over as-is; the peer has
/// half-closed and nothing more is coming.
pub(crate) fn multiplexer(conn: &mut Connection, mgr: &Manager, ev: Event<'_>) {
    let closing = match ev {
        Event::Read => false,
        Event::Close => true,
        _ => return,
    };
    let mut buf = std::mem::take(&mut conn.recv);
    loop {
        let consumed = match parse(buf.as_slice()) {
            Parsed::Invalid => {
                if !closing {
                    error!("{} http parse error", conn.id);
                    conn.is_closing = true;
                }
                None
            }
            Parsed::Partial => None,
            Parsed::Complete(mut hm) => {
                if closing {
                    hm.message_len = buf.len() as u64;
                    hm.body_len = hm.message_len - hm.head.len() as u64;
                    hm.body = &buf.as_slice()[hm.head.len()..];
                }
                if (buf.len() as u64) < hm.message_len {
                    None
                } else {
                    let n = hm.message_len as usize;
                    // The debug endpoint is answered by the multiplexer
                    // itself; the user handler never sees that message.
                    if !maybe_debug_endpoint(conn, mgr, &hm) {
                        conn.call(Event::HttpMsg(&hm));
                    }
                    Some(n)
                }
            }
        };
        match consumed {
            Some(n) => buf.delete(n),
            None => break,
        }
    }
    conn.recv = buf;
}

#[cfg(feature = "debug-endpoint")]
fn maybe_debug_endpoint(
    conn: &mut Connection,
    mgr: &Manager,
    hm: &crate::message::Message<'_>,
) -> bool {
    conn.label = format!("<-[{}]", hm.uri.as_bstr());
    if hm.match_uri("/debug/info") {
        debug_info(conn, mgr);
        true
    } else {
        false
    }
}

#[cfg(not(feature = "debug-endpoint"))]
fn maybe_debug_endpoint(
    _conn: &mut Connection,
    _mgr: &Manager,
    _hm: &crate::message::Message<'_>,
) -> bool {
    false
}

/// Answers `GET /debug/info` with a chunked listing of every connection's
/// buffer fill levels and status flags.
#[cfg(feature = "debug-endpoint")]
fn debug_info(conn: &mut Connection, mgr: &Manager) {
    conn.send
        .add(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n");
    let own = debug_line(conn);
    printf_chunk(conn, format_args!("{}", own));
    let lines: Vec<String> = mgr.iter().map(debug_line).collect();
    for line in lines {
        printf_chunk(conn, format_args!("{}", line));
    }
    write_chunk(conn, b"");
}

#[cfg(feature = "debug-endpoint")]
fn debug_line(c: &Connection) -> String {
    format!(
        "{:<4} {:<12} {:04}.{:04}/{:04}.{:04} {}{}{}{}{}\n",
        c.id,
        c.label,
        c.recv.len(),
        c.recv.size(),
        c.send.len(),
        c.send.size(),
        c.is_listening as u8,
        c.is_client as u8,
        c.is_accepted as u8,
        c.is_draining as u8,
        c.is_closing as u8,
    )
}
