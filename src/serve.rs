//! Static filesystem serving: single files with ETag revalidation, rooted
//! directory trees with containment checks, and the streaming file pump.

use crate::connection::{Connection, Event, Proto};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::mime::guess_content_type;
use crate::output::reply;
use crate::urlencoded::{get_var, url_decode};
use crate::util::to_i64;
use crate::IO_SIZE;
use bstr::ByteSlice;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[cfg(feature = "ssi")]
use crate::util::globmatch;

/// Hook invoked for files matching the SSI pattern; receives the resolved
/// web root and the file path. Expansion itself lives with the host.
#[cfg(feature = "ssi")]
pub type SsiHandler = fn(&mut Connection, &Path, &Path);

/// Options for [`serve_dir`].
pub struct ServeDirOpts<'a> {
    /// Filesystem root served; resolved before use.
    pub root_dir: &'a str,
    /// Glob selecting files handed to the SSI hook instead of being served
    /// verbatim.
    #[cfg(feature = "ssi")]
    pub ssi_pattern: Option<&'a str>,
    #[cfg(feature = "ssi")]
    pub ssi: Option<SsiHandler>,
}

impl<'a> ServeDirOpts<'a> {
    pub fn new(root_dir: &'a str) -> Self {
        ServeDirOpts {
            root_dir,
            #[cfg(feature = "ssi")]
            ssi_pattern: None,
            #[cfg(feature = "ssi")]
            ssi: None,
        }
    }
}

/// State of a streaming 200 response; owns the open file. Dropping it (on
/// restore or connection teardown) closes the file.
pub(crate) struct FilePump {
    file: File,
}

/// Opaque validator derived from a file's mtime and size.
fn file_etag(md: &Metadata) -> String {
    let mtime = md
        .modified()
        .ok()
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("\"{:x}.{}\"", mtime, md.len())
}

/// Reads until `buf` is full or EOF, so a legitimately short `read(2)` is
/// not mistaken for end of file.
fn read_full(file: &mut File, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("file read error: {}", e);
                break;
            }
        }
    }
    filled
}

/// Serves one file: 404 when it cannot be opened, 304 on an `If-None-Match`
/// hit, otherwise a 200 header block followed by the streamed body. For
/// methods other than `HEAD` the connection switches to the file pump until
/// the body has been handed to the send buffer.
pub fn serve_file(conn: &mut Connection, hm: &Message<'_>, path: &Path, mime: &str, extra: Option<&str>) {
    let opened = File::open(path).and_then(|f| f.metadata().map(|md| (f, md)));
    let (file, md) = match opened {
        Ok(pair) => pair,
        Err(e) => {
            debug!("404 [{}] [{}]: {}", hm.uri.as_bstr(), path.display(), e);
            reply(conn, 404, "", b"Not found\n");
            return;
        }
    };
    let etag = file_etag(&md);
    let revalidated = hm
        .header("If-None-Match")
        .map_or(false, |inm| inm.eq_ignore_ascii_case(etag.as_bytes()));
    if revalidated {
        conn.send
            .add(b"HTTP/1.1 304 Not Modified\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nEtag: {}\r\nContent-Length: {}\r\n{}\r\n",
        mime,
        etag,
        md.len(),
        extra.unwrap_or("")
    );
    conn.send.add(head.as_bytes());
    if hm.method.eq_ignore_ascii_case(b"HEAD") {
        return;
    }
    conn.proto = Proto::Static(FilePump { file });
}

/// Drives one [`FilePump`] step. On writable events the pump tops the send
/// buffer up from the file, at most `send.size - send.len` bytes, skipping
/// entirely while the buffer is full; the host draining `send` is what paces
/// the file reads. A short refill means EOF and restores the multiplexer.
/// `Close` restores unconditionally.
pub(crate) fn pump_event(conn: &mut Connection, ev: Event<'_>) {
    match ev {
        Event::Write | Event::Poll => {
            if conn.send.size() < 2 * IO_SIZE {
                conn.send.resize(2 * IO_SIZE);
            }
            if conn.send.len() >= conn.send.size() {
                return;
            }
            let Connection { proto, send, .. } = &mut *conn;
            let pump = match proto {
                Proto::Static(pump) => pump,
                _ => return,
            };
            let n = read_full(&mut pump.file, send.spare_mut());
            send.extend_used(n);
            if conn.send.len() < conn.send.size() {
                conn.proto = Proto::Http;
            }
        }
        Event::Close => {
            conn.proto = Proto::Http;
        }
        _ => {}
    }
}

/// Canonicalizes `path`, tolerating a missing final component the way
/// `realpath(3)` callers traditionally do: the parent is resolved and the
/// final name re-attached. Falls back to the lexical path when nothing
/// resolves.
fn resolve(path: &Path) -> PathBuf {
    match fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(_) => match (path.parent(), path.file_name()) {
            (Some(dir), Some(name)) => match fs::canonicalize(dir) {
                Ok(resolved) => resolved.join(name),
                Err(e) => {
                    error!("realpath({}): {}", path.display(), e);
                    path.to_path_buf()
                }
            },
            _ => path.to_path_buf(),
        },
    }
}

/// Maps the request URI into `opts.root_dir` and serves the result: a file,
/// an index, a directory listing, or an SSI dispatch. Resolution
/// canonicalizes both the root and the target and refuses (as 404) any
/// target that does not remain under the root.
pub fn serve_dir(conn: &mut Connection, hm: &Message<'_>, opts: &ServeDirOpts<'_>) {
    let root = match fs::canonicalize(opts.root_dir) {
        Ok(root) => root,
        Err(e) => {
            error!("realpath({}): {}", opts.root_dir, e);
            PathBuf::from(opts.root_dir)
        }
    };
    if !root.is_dir() {
        let body = format!("Bad web root [{}]\n", root.display());
        reply(conn, 400, "", body.as_bytes());
        return;
    }

    let mut decoded = vec![0u8; hm.uri.len() + 1];
    let decoded = match url_decode(hm.uri, &mut decoded, false) {
        Some(n) => {
            decoded.truncate(n);
            decoded
        }
        None => {
            debug!("undecodable uri [{}]", hm.uri.as_bstr());
            let body = format!("Not found {}\n", hm.uri.as_bstr());
            reply(conn, 404, "", body.as_bytes());
            return;
        }
    };
    let mut joined = root.as_os_str().as_bytes().to_vec();
    joined.extend_from_slice(&decoded);
    while joined.last() == Some(&b'/') {
        joined.pop();
    }
    let lexical = PathBuf::from(std::ffi::OsString::from_vec(joined));

    let mut target = resolve(&lexical);
    let mut is_index = false;
    if target.is_dir() {
        target.push("index.html");
        is_index = true;
    }
    if !target.starts_with(&root) {
        // Escaped the root; answer exactly like a missing file.
        let body = format!("Not found {}\n", hm.uri.as_bstr());
        reply(conn, 404, "", body.as_bytes());
        return;
    }

    #[allow(unused_mut)]
    let mut exists = target.is_file();
    #[cfg(feature = "ssi")]
    {
        if is_index && !exists && opts.ssi_pattern.is_some() {
            let retry = target.with_file_name("index.shtml");
            if retry.is_file() {
                target = retry;
                exists = true;
            }
        }
    }
    #[cfg(feature = "debug-endpoint")]
    {
        conn.label = format!("<-F {}", target.display());
    }

    if is_index && !exists {
        #[cfg(feature = "dir-listing")]
        crate::listing::list_dir(conn, hm, target.parent().unwrap_or(&root));
        #[cfg(not(feature = "dir-listing"))]
        reply(conn, 403, "", b"Directory listing not supported");
        return;
    }
    #[cfg(feature = "ssi")]
    {
        if let (Some(pattern), Some(ssi)) = (opts.ssi_pattern, opts.ssi) {
            if globmatch(pattern.as_bytes(), target.as_os_str().as_bytes()) {
                ssi(conn, &root, &target);
                return;
            }
        }
    }
    serve_file(conn, hm, &target, guess_content_type(&target), None);
}

/// Writes the request body to `<dir>/<name>` at the `offset` given in the
/// query: offset 0 truncates, anything else appends. Replies 400 (and
/// returns the error) when the name is missing or the file cannot be opened,
/// 200 with the byte count otherwise.
pub fn upload(conn: &mut Connection, hm: &Message<'_>, dir: &Path) -> Result<usize> {
    let mut offset_buf = [0u8; 40];
    let offset = get_var(hm.query, "offset", &mut offset_buf)
        .map(|n| to_i64(&offset_buf[..n]).max(0) as u64)
        .unwrap_or(0);
    let mut name_buf = [0u8; 200];
    let name = match get_var(hm.query, "name", &mut name_buf) {
        Ok(n) if n > 0 => &name_buf[..n],
        _ => {
            reply(conn, 400, "", b"name required");
            return Err(Error::MissingName);
        }
    };
    let path = dir.join(std::ffi::OsStr::from_bytes(name));
    debug!(
        "{} {} bytes @ {} [{}]",
        conn.id,
        hm.body.len(),
        offset,
        name.as_bstr()
    );
    let mut options = OpenOptions::new();
    if offset == 0 {
        options.write(true).create(true).truncate(true);
    } else {
        options.create(true).append(true);
    }
    let written = options
        .open(&path)
        .and_then(|mut file| file.write_all(hm.body).map(|_| hm.body.len()));
    match written {
        Ok(n) => {
            reply(conn, 200, "", b"");
            Ok(n)
        }
        Err(e) => {
            let body = format!(
                "fopen({}): {}",
                name.as_bstr(),
                e.raw_os_error().unwrap_or(0)
            );
            reply(conn, 400, "", body.as_bytes());
            Err(e.into())
        }
    }
}
