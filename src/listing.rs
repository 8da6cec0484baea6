//! HTML directory listings with client-side sorting.
//!
//! The `Content-Length` header is emitted with a ten-space reservation and
//! back-patched once the body has been written and measured, so the listing
//! streams into the send buffer without an intermediate copy.

use crate::connection::Connection;
use crate::message::Message;
use crate::output::reply;
use crate::urlencoded::url_encode;
use bstr::ByteSlice;
use lazy_static::lazy_static;
use std::fs::{self, Metadata};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::SystemTime;
use time::format_description::FormatItem;
use time::{format_description, OffsetDateTime, UtcOffset};

// Ten spaces between the colon and the CR, patched in list_dir.
const LIST_HEAD: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length:          \r\n\r\n";

const SORT_JS: &str = "<script>function srt(tb, sc, so, d) {\
var tr = Array.prototype.slice.call(tb.rows, 0),\
tr = tr.sort(function (a, b) { var c1 = a.cells[sc], c2 = b.cells[sc],\
n1 = c1.getAttribute('name'), n2 = c2.getAttribute('name'), \
t1 = a.cells[2].getAttribute('name'), \
t2 = b.cells[2].getAttribute('name'); \
return so * (t1 < 0 && t2 >= 0 ? -1 : t2 < 0 && t1 >= 0 ? 1 : \
n1 ? parseInt(n2) - parseInt(n1) : \
c1.textContent.trim().localeCompare(c2.textContent.trim())); });";

const SORT_JS2: &str = "for (var i = 0; i < tr.length; i++) tb.appendChild(tr[i]); \
if (!d) window.location.hash = ('sc=' + sc + '&so=' + so); \
};\
window.onload = function() {\
var tb = document.getElementById('tb');\
var m = /sc=([012]).so=(1|-1)/.exec(window.location.hash) || [0, 2, 1];\
var sc = m[1], so = m[2]; document.onclick = function(ev) { \
var c = ev.target.rel; if (c) {if (c == sc) so *= -1; srt(tb, c, so); \
sc = c; ev.preventDefault();}};\
srt(tb, sc, so, true);\
}\
</script>";

lazy_static! {
    static ref MOD_TIME_FORMAT: Vec<FormatItem<'static>> =
        format_description::parse("[day]-[month repr:short]-[year] [hour]:[minute]")
            .expect("static format description");
}

fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}", bytes)
    } else if bytes < 0x100000 {
        format!("{:.1}k", bytes as f64 / 1024.0)
    } else if bytes < 0x40000000 {
        format!("{:.1}M", bytes as f64 / 1048576.0)
    } else {
        format!("{:.1}G", bytes as f64 / 1073741824.0)
    }
}

fn mod_time(md: &Metadata) -> String {
    let when = md.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let mut stamp = OffsetDateTime::from(when);
    if let Ok(local) = UtcOffset::current_local_offset() {
        stamp = stamp.to_offset(local);
    }
    stamp.format(MOD_TIME_FORMAT.as_slice()).unwrap_or_default()
}

fn print_dir_entry(conn: &mut Connection, name: &[u8], md: &Metadata) {
    let slash = if md.is_dir() { "/" } else { "" };
    let size = if md.is_dir() {
        "[DIR]".to_string()
    } else {
        human_size(md.len())
    };
    let row = format!(
        "  <tr><td><a href=\"{}{}\">{}{}</a></td><td>{}</td><td>{}</td></tr>\n",
        url_encode(name),
        slash,
        name.as_bstr(),
        slash,
        mod_time(md),
        size
    );
    conn.send.add(row.as_bytes());
}

/// Renders the listing for `dir`. Entries that fail to stat are logged and
/// skipped; a directory that cannot be read at all is answered with 400.
pub(crate) fn list_dir(conn: &mut Connection, hm: &Message<'_>, dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            reply(conn, 400, "", b"Cannot open dir");
            error!("{} opendir({}): {}", conn.id, dir.display(), e);
            return;
        }
    };
    conn.send.add(LIST_HEAD);
    let patch_at = conn.send.len() - 14;
    let body_start = conn.send.len();

    let uri = hm.uri.as_bstr();
    let page_head = format!(
        "<!DOCTYPE html><html><head><title>Index of {uri}</title>{js1}{js2}\
<style>th,td {{text-align: left; padding-right: 1em; \
font-family: monospace; }}</style></head>\
<body><h1>Index of {uri}</h1><table cellpadding=\"0\"><thead>\
<tr><th><a href=\"#\" rel=\"0\">Name</a></th><th>\
<a href=\"#\" rel=\"1\">Modified</a></th>\
<th><a href=\"#\" rel=\"2\">Size</a></th></tr>\
<tr><td colspan=\"3\"><hr></td></tr>\
</thead>\
<tbody id=\"tb\">\n",
        uri = uri,
        js1 = SORT_JS,
        js2 = SORT_JS2
    );
    conn.send.add(page_head.as_bytes());

    for entry in entries.flatten() {
        let name = entry.file_name();
        match fs::metadata(entry.path()) {
            Ok(md) => print_dir_entry(conn, name.as_bytes(), &md),
            Err(e) => error!("{} stat({}): {}", conn.id, entry.path().display(), e),
        }
    }

    let tail = format!(
        "</tbody><tfoot><tr><td colspan=\"3\"><hr></td></tr></tfoot>\
</table><address>evhttp v.{}</address></body></html>\n",
        env!("CARGO_PKG_VERSION")
    );
    conn.send.add(tail.as_bytes());

    let body_len = (conn.send.len() - body_start).to_string();
    let patch = &mut conn.send.as_mut_slice()[patch_at..patch_at + body_len.len()];
    patch.copy_from_slice(body_len.as_bytes());
}
