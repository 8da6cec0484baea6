//! # evhttp
//!
//! An embeddable, event-driven HTTP/1.1 server and client protocol engine.
//!
//! The engine owns no sockets. A host event loop copies received bytes into a
//! connection's `recv` buffer, raises [`Event`]s through a [`Manager`], and
//! drains the `send` buffer back to the wire. The engine frames complete HTTP
//! messages out of `recv`, exposes each as a zero-copy [`Message`] view, and
//! dispatches the user handler installed by [`listen`] or [`connect`] with
//! [`Event::HttpMsg`]. Handlers respond via [`reply`], chunked output, or the
//! static filesystem helpers in [`serve`], which stream files back under the
//! host's natural write back-pressure.
//!
//! ```no_run
//! use evhttp::{listen, reply, Event, Manager};
//!
//! let mut mgr = Manager::new();
//! let lsn = listen(&mut mgr, "http://0.0.0.0:8000", |conn, ev| {
//!     if let Event::HttpMsg(hm) = ev {
//!         if hm.match_uri("/hello") {
//!             reply(conn, 200, "", b"hello\n");
//!         } else {
//!             reply(conn, 404, "", b"Not found\n");
//!         }
//!     }
//! });
//! let conn = mgr.accept(lsn);
//! // host loop: push bytes into recv, then
//! mgr.event(conn, Event::Read);
//! // ...and write out whatever accumulated in the send buffer.
//! ```

#[macro_use]
extern crate log;

pub mod auth;
pub mod connection;
pub mod error;
pub mod http;
pub mod iobuf;
pub mod manager;
pub mod message;
#[cfg(feature = "fs")]
pub mod mime;
pub mod output;
pub mod parser;
#[cfg(feature = "fs")]
pub mod serve;
pub mod urlencoded;
pub mod util;

#[cfg(feature = "dir-listing")]
mod listing;

pub use crate::auth::{basic_auth, creds};
pub use crate::connection::{Connection, Event};
pub use crate::error::{Error, Result};
pub use crate::http::{connect, listen};
pub use crate::iobuf::IoBuf;
pub use crate::manager::{ConnId, Manager};
pub use crate::message::{Header, Message, UNTIL_CLOSE};
pub use crate::output::{printf_chunk, reply, write_chunk};
pub use crate::parser::{parse, request_length, Framing, Parsed};
#[cfg(feature = "fs")]
pub use crate::serve::{serve_dir, serve_file, upload, ServeDirOpts};
pub use crate::urlencoded::{get_var, url_decode, url_encode, VarError};

/// Granularity of buffer growth and the unit of file-pump refills. The pump
/// keeps the send buffer at twice this size.
pub const IO_SIZE: usize = 2048;

/// Upper bound on indexed headers per message; lines past it are ignored.
pub const MAX_HEADERS: usize = 40;
