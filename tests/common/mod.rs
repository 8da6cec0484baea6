#![allow(dead_code)]

use evhttp::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Disposable directory tree for filesystem-serving tests.
pub struct TempTree {
    pub root: PathBuf,
}

impl TempTree {
    pub fn new(tag: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "evhttp-{}-{}-{}",
            tag,
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        fs::create_dir_all(&root).unwrap();
        TempTree { root }
    }

    pub fn file(&self, rel: &str, contents: &[u8]) -> PathBuf {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn dir(&self, rel: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(&path).unwrap();
        path
    }

    pub fn root_str(&self) -> String {
        self.root.to_str().unwrap().to_string()
    }
}

impl Drop for TempTree {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// Pulls everything queued for transmission off a connection, as a draining
/// peer would.
pub fn drain(conn: &mut Connection) -> Vec<u8> {
    let bytes = conn.send.as_slice().to_vec();
    let n = bytes.len();
    conn.send.delete(n);
    bytes
}

/// Case-insensitive header lookup inside a raw response byte stream.
pub fn header_value(response: &[u8], name: &str) -> Option<String> {
    let head_end = response.windows(4).position(|w| w == b"\r\n\r\n")?;
    for line in response[..head_end].split(|&c| c == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if let Some(colon) = line.iter().position(|&c| c == b':') {
            if line[..colon].eq_ignore_ascii_case(name.as_bytes()) {
                let value = &line[colon + 1..];
                let value = std::str::from_utf8(value).ok()?.trim();
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Body bytes after the first blank line.
pub fn body_of(response: &[u8]) -> &[u8] {
    match response.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(at) => &response[at + 4..],
        None => &[],
    }
}

pub fn read_file(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap()
}
