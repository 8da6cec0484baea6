//! End-to-end tests driving the engine the way a host event loop would: bytes
//! pushed into `recv`, events raised through the manager, and the send buffer
//! drained like a socket.

use evhttp::{connect, listen, reply, serve_dir, upload, Event, Manager, ServeDirOpts, IO_SIZE};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

mod common;
use common::{body_of, drain, header_value, TempTree};

#[derive(Default)]
struct Seen {
    messages: Vec<(Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>)>,
}

/// Listener whose handler records each dispatched message and answers 200.
fn echo_server(mgr: &mut Manager) -> (evhttp::ConnId, Rc<RefCell<Seen>>) {
    let seen = Rc::new(RefCell::new(Seen::default()));
    let sink = seen.clone();
    let lsn = listen(mgr, "http://0.0.0.0:8000", move |conn, ev| {
        if let Event::HttpMsg(hm) = ev {
            sink.borrow_mut().messages.push((
                hm.method.to_vec(),
                hm.uri.to_vec(),
                hm.query.to_vec(),
                hm.body.to_vec(),
            ));
            reply(conn, 200, "", b"ok\n");
        }
    });
    (lsn, seen)
}

#[test]
fn request_dispatch_and_reply() {
    let mut mgr = Manager::new();
    let (lsn, seen) = echo_server(&mut mgr);
    let conn = mgr.accept(lsn);

    mgr.conn_mut(conn)
        .unwrap()
        .recv
        .add(b"GET /a?x=1 HTTP/1.1\r\nHost: h\r\n\r\n");
    mgr.event(conn, Event::Read);

    let out = drain(mgr.conn_mut(conn).unwrap());
    assert_eq!(out, b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nok\n");
    let seen = seen.borrow();
    assert_eq!(seen.messages.len(), 1);
    let (method, uri, query, body) = &seen.messages[0];
    assert_eq!(method, b"GET");
    assert_eq!(uri, b"/a");
    assert_eq!(query, b"x=1");
    assert!(body.is_empty());
}

#[test]
fn pipelined_requests_dispatch_in_order() {
    let mut mgr = Manager::new();
    let (lsn, seen) = echo_server(&mut mgr);
    let conn = mgr.accept(lsn);

    mgr.conn_mut(conn).unwrap().recv.add(
        b"GET /first HTTP/1.1\r\n\r\nPOST /second HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc",
    );
    mgr.event(conn, Event::Read);

    let seen = seen.borrow();
    assert_eq!(seen.messages.len(), 2);
    assert_eq!(seen.messages[0].1, b"/first");
    assert_eq!(seen.messages[1].1, b"/second");
    assert_eq!(seen.messages[1].3, b"abc");
    assert!(mgr.conn(conn).unwrap().recv.is_empty());
    // Two complete replies, in request order.
    let out = drain(mgr.conn_mut(conn).unwrap());
    let replies = out
        .windows(15)
        .filter(|w| w.starts_with(b"HTTP/1.1 200 OK"))
        .count();
    assert_eq!(replies, 2);
}

#[test]
fn partial_message_waits_for_more_data() {
    let mut mgr = Manager::new();
    let (lsn, seen) = echo_server(&mut mgr);
    let conn = mgr.accept(lsn);

    mgr.conn_mut(conn).unwrap().recv.add(b"GET /slow HTTP/1.1\r\nHost:");
    mgr.event(conn, Event::Read);
    assert!(seen.borrow().messages.is_empty());

    mgr.conn_mut(conn).unwrap().recv.add(b" h\r\n\r\n");
    mgr.event(conn, Event::Read);
    assert_eq!(seen.borrow().messages.len(), 1);
}

#[test]
fn parse_error_flags_connection_closing() {
    let mut mgr = Manager::new();
    let (lsn, seen) = echo_server(&mut mgr);
    let conn = mgr.accept(lsn);

    mgr.conn_mut(conn).unwrap().recv.add(b"GET /\x01 HTTP/1.1\r\n\r\n");
    mgr.event(conn, Event::Read);

    assert!(mgr.conn(conn).unwrap().is_closing);
    assert!(seen.borrow().messages.is_empty());
    assert!(mgr.conn(conn).unwrap().send.is_empty());
}

#[test]
fn close_hands_over_partial_body() {
    let mut mgr = Manager::new();
    let (lsn, seen) = echo_server(&mut mgr);
    let conn = mgr.accept(lsn);

    mgr.conn_mut(conn)
        .unwrap()
        .recv
        .add(b"POST /u HTTP/1.1\r\nContent-Length: 100\r\n\r\npartial");
    mgr.event(conn, Event::Read);
    assert!(seen.borrow().messages.is_empty());

    mgr.close(conn);
    let seen = seen.borrow();
    assert_eq!(seen.messages.len(), 1);
    assert_eq!(seen.messages[0].3, b"partial");
}

/// Accepted connection whose handler serves `root`.
fn file_server(mgr: &mut Manager, root: String) -> evhttp::ConnId {
    let lsn = listen(mgr, "http://0.0.0.0:8000", move |conn, ev| {
        if let Event::HttpMsg(hm) = ev {
            let opts = ServeDirOpts::new(&root);
            serve_dir(conn, hm, &opts);
        }
    });
    mgr.accept(lsn)
}

/// Runs writable events until the pump finishes, draining after each one,
/// and checks the buffer bound along the way.
fn pump_to_end(mgr: &mut Manager, conn: evhttp::ConnId, out: &mut Vec<u8>) -> usize {
    let mut refills = 0;
    let mut idle = 0;
    while idle < 2 {
        mgr.event(conn, Event::Write);
        let c = mgr.conn_mut(conn).unwrap();
        assert!(c.send.len() <= c.send.size());
        let chunk = drain(c);
        if chunk.is_empty() {
            idle += 1;
        } else {
            out.extend_from_slice(&chunk);
            idle = 0;
            refills += 1;
        }
        assert!(refills < 1000, "pump never finished");
    }
    refills
}

#[test]
fn static_file_streams_with_back_pressure() {
    let tree = TempTree::new("stream");
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    tree.file("big.bin", &payload);

    let mut mgr = Manager::new();
    let conn = file_server(&mut mgr, tree.root_str());

    mgr.conn_mut(conn).unwrap().recv.add(b"GET /big.bin HTTP/1.1\r\n\r\n");
    mgr.event(conn, Event::Read);

    let mut out = drain(mgr.conn_mut(conn).unwrap());
    assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(
        header_value(&out, "Content-Length").as_deref(),
        Some("10000")
    );
    assert_eq!(
        header_value(&out, "Content-Type").as_deref(),
        Some("application/octet-stream")
    );
    // The body arrives through subsequent writable events, one refill of at
    // most the send buffer per event.
    pump_to_end(&mut mgr, conn, &mut out);
    let body = body_of(&out);
    assert_eq!(body.len(), payload.len());
    assert_eq!(body, &payload[..]);

    // The multiplexer is back in place: the connection answers again.
    mgr.conn_mut(conn).unwrap().recv.add(b"GET /missing HTTP/1.1\r\n\r\n");
    mgr.event(conn, Event::Read);
    let next = drain(mgr.conn_mut(conn).unwrap());
    assert!(next.starts_with(b"HTTP/1.1 404 OK\r\n"));
}

#[test]
fn pump_respects_full_send_buffer() {
    let tree = TempTree::new("fullbuf");
    let payload = vec![7u8; 6 * IO_SIZE];
    tree.file("big.bin", &payload);

    let mut mgr = Manager::new();
    let conn = file_server(&mut mgr, tree.root_str());
    mgr.conn_mut(conn).unwrap().recv.add(b"GET /big.bin HTTP/1.1\r\n\r\n");
    mgr.event(conn, Event::Read);
    drain(mgr.conn_mut(conn).unwrap());

    // First writable event fills the buffer to capacity.
    mgr.event(conn, Event::Write);
    let filled = mgr.conn(conn).unwrap().send.len();
    assert_eq!(filled, mgr.conn(conn).unwrap().send.size());

    // Without draining, further events must not grow it.
    mgr.event(conn, Event::Write);
    mgr.event(conn, Event::Poll);
    assert_eq!(mgr.conn(conn).unwrap().send.len(), filled);
}

#[test]
fn etag_revalidation_round_trip() {
    let tree = TempTree::new("etag");
    tree.file("page.html", b"<h1>cached</h1>");

    let mut mgr = Manager::new();
    let conn = file_server(&mut mgr, tree.root_str());
    mgr.conn_mut(conn).unwrap().recv.add(b"GET /page.html HTTP/1.1\r\n\r\n");
    mgr.event(conn, Event::Read);

    let mut out = drain(mgr.conn_mut(conn).unwrap());
    let etag = header_value(&out, "Etag").expect("etag on 200");
    assert!(etag.starts_with('"') && etag.ends_with('"'));
    pump_to_end(&mut mgr, conn, &mut out);

    let request = format!("GET /page.html HTTP/1.1\r\nIf-None-Match: {}\r\n\r\n", etag);
    mgr.conn_mut(conn).unwrap().recv.add(request.as_bytes());
    mgr.event(conn, Event::Read);
    let out = drain(mgr.conn_mut(conn).unwrap());
    assert!(out.starts_with(b"HTTP/1.1 304 Not Modified\r\n"));
    assert_eq!(header_value(&out, "Content-Length").as_deref(), Some("0"));
    assert!(body_of(&out).is_empty());

    // No body follows a 304 even if the host keeps signaling writability.
    mgr.event(conn, Event::Write);
    assert!(mgr.conn(conn).unwrap().send.is_empty());
}

#[test]
fn head_sends_headers_without_body() {
    let tree = TempTree::new("head");
    tree.file("page.html", b"<h1>body</h1>");

    let mut mgr = Manager::new();
    let conn = file_server(&mut mgr, tree.root_str());
    mgr.conn_mut(conn).unwrap().recv.add(b"HEAD /page.html HTTP/1.1\r\n\r\n");
    mgr.event(conn, Event::Read);

    let out = drain(mgr.conn_mut(conn).unwrap());
    assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(header_value(&out, "Content-Length").as_deref(), Some("13"));
    assert!(body_of(&out).is_empty());
    mgr.event(conn, Event::Write);
    assert!(mgr.conn(conn).unwrap().send.is_empty());
}

#[test]
fn serve_dir_falls_back_to_index() {
    let tree = TempTree::new("index");
    tree.file("index.html", b"<h1>home</h1>");

    let mut mgr = Manager::new();
    let conn = file_server(&mut mgr, tree.root_str());
    mgr.conn_mut(conn).unwrap().recv.add(b"GET / HTTP/1.1\r\n\r\n");
    mgr.event(conn, Event::Read);

    let mut out = drain(mgr.conn_mut(conn).unwrap());
    assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(
        header_value(&out, "Content-Type").as_deref(),
        Some("text/html; charset=utf-8")
    );
    pump_to_end(&mut mgr, conn, &mut out);
    assert_eq!(body_of(&out), b"<h1>home</h1>");
}

#[test]
fn traversal_outside_root_is_not_found() {
    let base = TempTree::new("escape");
    base.file("secret.txt", b"keep out");
    let root = base.dir("www");
    std::fs::write(root.join("ok.txt"), b"fine").unwrap();

    let mut mgr = Manager::new();
    let conn = file_server(&mut mgr, root.to_str().unwrap().to_string());

    mgr.conn_mut(conn).unwrap().recv.add(b"GET /../secret.txt HTTP/1.1\r\n\r\n");
    mgr.event(conn, Event::Read);
    let out = drain(mgr.conn_mut(conn).unwrap());
    assert!(out.starts_with(b"HTTP/1.1 404 OK\r\n"));
    assert_eq!(body_of(&out), b"Not found /../secret.txt\n");

    // Percent-encoded traversal is decoded before resolution and caught too.
    mgr.conn_mut(conn).unwrap().recv.add(b"GET /%2e%2e/secret.txt HTTP/1.1\r\n\r\n");
    mgr.event(conn, Event::Read);
    let out = drain(mgr.conn_mut(conn).unwrap());
    assert!(out.starts_with(b"HTTP/1.1 404 OK\r\n"));
}

#[test]
fn bad_web_root_is_rejected() {
    let mut mgr = Manager::new();
    let conn = file_server(&mut mgr, "/definitely/not/a/dir".to_string());
    mgr.conn_mut(conn).unwrap().recv.add(b"GET / HTTP/1.1\r\n\r\n");
    mgr.event(conn, Event::Read);
    let out = drain(mgr.conn_mut(conn).unwrap());
    assert!(out.starts_with(b"HTTP/1.1 400 OK\r\n"));
    assert!(body_of(&out).starts_with(b"Bad web root"));
}

#[cfg(feature = "dir-listing")]
#[test]
fn directory_listing_renders_entries() {
    let tree = TempTree::new("listing");
    tree.file("a.txt", b"aaa");
    tree.dir("sub");

    let mut mgr = Manager::new();
    let conn = file_server(&mut mgr, tree.root_str());
    mgr.conn_mut(conn).unwrap().recv.add(b"GET / HTTP/1.1\r\n\r\n");
    mgr.event(conn, Event::Read);

    let out = drain(mgr.conn_mut(conn).unwrap());
    assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
    let body = body_of(&out);
    let text = std::str::from_utf8(body).unwrap();
    assert!(text.contains("Index of /"));
    assert!(text.contains("<a href=\"a.txt\">a.txt</a>"));
    assert!(text.contains("<a href=\"sub/\">sub/</a>"));
    assert!(text.contains("[DIR]"));
    // The reserved Content-Length field was patched with the real body size.
    let declared: usize = header_value(&out, "Content-Length")
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(declared, body.len());
}

#[test]
fn upload_truncates_then_appends() {
    let tree = TempTree::new("upload");
    let dir = tree.root.clone();
    let uploads: Rc<RefCell<Vec<evhttp::Result<usize>>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = uploads.clone();

    let mut mgr = Manager::new();
    let lsn = listen(&mut mgr, "http://0.0.0.0:8000", move |conn, ev| {
        if let Event::HttpMsg(hm) = ev {
            sink.borrow_mut().push(upload(conn, hm, &dir));
        }
    });
    let conn = mgr.accept(lsn);

    mgr.conn_mut(conn).unwrap().recv.add(
        b"POST /up?name=data.txt&offset=0 HTTP/1.1\r\nContent-Length: 5\r\n\r\npart1",
    );
    mgr.event(conn, Event::Read);
    mgr.conn_mut(conn).unwrap().recv.add(
        b"POST /up?name=data.txt&offset=5 HTTP/1.1\r\nContent-Length: 5\r\n\r\npart2",
    );
    mgr.event(conn, Event::Read);

    assert_eq!(
        std::fs::read(tree.root.join("data.txt")).unwrap(),
        b"part1part2"
    );
    assert!(matches!(uploads.borrow()[0], Ok(5)));
    assert!(matches!(uploads.borrow()[1], Ok(5)));

    // Re-uploading at offset 0 truncates.
    mgr.conn_mut(conn).unwrap().recv.add(
        b"POST /up?name=data.txt&offset=0 HTTP/1.1\r\nContent-Length: 3\r\n\r\nnew",
    );
    mgr.event(conn, Event::Read);
    assert_eq!(std::fs::read(tree.root.join("data.txt")).unwrap(), b"new");
}

#[test]
fn upload_requires_name() {
    let tree = TempTree::new("upload-noname");
    let dir: PathBuf = tree.root.clone();

    let mut mgr = Manager::new();
    let lsn = listen(&mut mgr, "http://0.0.0.0:8000", move |conn, ev| {
        if let Event::HttpMsg(hm) = ev {
            let _ = upload(conn, hm, &dir);
        }
    });
    let conn = mgr.accept(lsn);
    mgr.conn_mut(conn)
        .unwrap()
        .recv
        .add(b"POST /up?offset=0 HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi");
    mgr.event(conn, Event::Read);

    let out = drain(mgr.conn_mut(conn).unwrap());
    assert!(out.starts_with(b"HTTP/1.1 400 OK\r\n"));
    assert_eq!(body_of(&out), b"name required");
}

#[test]
fn client_side_parses_responses() {
    let seen: Rc<RefCell<Vec<(Vec<u8>, Vec<u8>, u64)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();

    let mut mgr = Manager::new();
    let conn = connect(&mut mgr, "http://example.test", move |_conn, ev| {
        if let Event::HttpMsg(hm) = ev {
            sink.borrow_mut()
                .push((hm.uri.to_vec(), hm.body.to_vec(), hm.body_len));
        }
    });
    assert!(mgr.conn(conn).unwrap().is_client);

    mgr.conn_mut(conn)
        .unwrap()
        .recv
        .add(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");
    mgr.event(conn, Event::Read);
    mgr.conn_mut(conn).unwrap().recv.add(b"HTTP/1.1 204 No Content\r\n\r\n");
    mgr.event(conn, Event::Read);

    {
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (b"200".to_vec(), b"hi".to_vec(), 2));
        assert_eq!(seen[1], (b"204".to_vec(), b"".to_vec(), 0));
    }

    // A response without Content-Length is delivered when the peer closes.
    mgr.conn_mut(conn).unwrap().recv.add(b"HTTP/1.1 200 OK\r\n\r\nstreamed");
    mgr.event(conn, Event::Read);
    assert_eq!(seen.borrow().len(), 2);
    mgr.close(conn);
    let seen = seen.borrow();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2].1, b"streamed");
}

#[cfg(feature = "debug-endpoint")]
#[test]
fn debug_endpoint_lists_connections() {
    let mut mgr = Manager::new();
    let (lsn, seen) = echo_server(&mut mgr);
    let conn = mgr.accept(lsn);
    let _other = mgr.accept(lsn);

    mgr.conn_mut(conn).unwrap().recv.add(b"GET /debug/info HTTP/1.1\r\n\r\n");
    mgr.event(conn, Event::Read);

    // Handled inside the multiplexer; the user handler never saw it.
    assert!(seen.borrow().messages.is_empty());
    let out = drain(mgr.conn_mut(conn).unwrap());
    assert!(out.starts_with(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n"));
    assert!(out.ends_with(b"0\r\n\r\n"));
    let text = String::from_utf8_lossy(&out);
    assert!(text.contains("<-LSN"));
    assert!(text.contains("<-[/debug/info]"));
}
