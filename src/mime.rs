//! Extension to content-type mapping for the static file path.

use std::os::unix::ffi::OsStrExt;
use std::path::Path;

const DEFAULT: &str = "text/plain; charset=utf-8";

static TYPES: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("shtml", "text/html; charset=utf-8"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("mjs", "text/javascript"),
    ("json", "application/json"),
    ("ico", "image/x-icon"),
    ("gif", "image/gif"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("txt", "text/plain; charset=utf-8"),
    ("wav", "audio/wav"),
    ("mp3", "audio/mpeg"),
    ("mid", "audio/mid"),
    ("ogg", "application/ogg"),
    ("xml", "application/xml"),
    ("ttf", "font/ttf"),
    ("xsl", "application/xml"),
    ("doc", "application/msword"),
    ("exe", "application/octet-stream"),
    ("zip", "application/zip"),
    ("xls", "application/excel"),
    ("tgz", "application/tar-gz"),
    ("tar", "application/tar"),
    ("gz", "application/gzip"),
    ("rar", "application/rar"),
    ("rtf", "application/rtf"),
    ("pdf", "application/pdf"),
    ("mpg", "video/mpeg"),
    ("webm", "video/webm"),
    ("mpeg", "video/mpeg"),
    ("mov", "video/quicktime"),
    ("mp4", "video/mp4"),
    ("avi", "video/x-msvideo"),
    ("csv", "text/csv"),
    ("bmp", "image/bmp"),
    ("bin", "application/octet-stream"),
    ("wasm", "application/wasm"),
];

/// Guesses a content type from the filename's `.<ext>` suffix, ignoring
/// ASCII case. Unknown or missing extensions fall back to plain text.
pub fn guess_content_type(path: &Path) -> &'static str {
    let name = path.as_os_str().as_bytes();
    for &(ext, mime) in TYPES {
        let ext = ext.as_bytes();
        if name.len() < ext.len() + 2 {
            continue;
        }
        let dot = name.len() - ext.len() - 1;
        if name[dot] == b'.' && name[dot + 1..].eq_ignore_ascii_case(ext) {
            return mime;
        }
    }
    DEFAULT
}
