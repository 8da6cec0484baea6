//! Response emission helpers.

use crate::connection::Connection;
use std::fmt;

/// Appends a complete simple response. The reason phrase is the literal `OK`
/// for every status code; `headers` is emitted verbatim between the status
/// line and `Content-Length`, so each entry must carry its own `\r\n`.
pub fn reply(conn: &mut Connection, code: u16, headers: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} OK\r\n{}Content-Length: {}\r\n\r\n",
        code,
        headers,
        body.len()
    );
    conn.send.add(head.as_bytes());
    conn.send.add(body);
}

/// Appends one chunk of a `Transfer-Encoding: chunked` body. An empty `buf`
/// produces the terminating chunk.
pub fn write_chunk(conn: &mut Connection, buf: &[u8]) {
    let frame = format!("{:X}\r\n", buf.len());
    conn.send.add(frame.as_bytes());
    conn.send.add(buf);
    conn.send.add(b"\r\n");
}

/// Formats `args` and emits the result as one chunk.
///
/// ```no_run
/// # let mut mgr = evhttp::Manager::new();
/// # let id = evhttp::listen(&mut mgr, "http://0.0.0.0:80", |_, _| {});
/// # let conn = mgr.conn_mut(id).unwrap();
/// evhttp::printf_chunk(conn, format_args!("{} items\n", 3));
/// ```
pub fn printf_chunk(conn: &mut Connection, args: fmt::Arguments<'_>) {
    let body = fmt::format(args);
    write_chunk(conn, body.as_bytes());
}
