//! Per-connection state and the event vocabulary.

use crate::iobuf::IoBuf;
use crate::message::Message;
use std::cell::RefCell;
use std::rc::Rc;

/// Events delivered to a connection. `Read`, `Write`, `Poll` and `Close` are
/// raised by the host loop; `HttpMsg` is synthesized by the multiplexer and
/// `Error` by [`Connection::error`].
#[derive(Clone, Copy, Debug)]
pub enum Event<'a> {
    /// The connection was accepted off a listener.
    Accept,
    /// New bytes were appended to `recv`.
    Read,
    /// The transport drained some of `send`; more can be written.
    Write,
    /// Periodic tick.
    Poll,
    /// The peer closed; the connection is going away after this event.
    Close,
    /// A fatal condition was signaled on the connection.
    Error(&'a str),
    /// One complete HTTP message, valid only for the duration of the call.
    HttpMsg(&'a Message<'a>),
}

/// User callback shared between a listener and the connections accepted off
/// it.
pub type EventHandler = Rc<RefCell<dyn FnMut(&mut Connection, Event<'_>)>>;

/// Protocol layer installed on a connection. `serve_file` swaps `Http` for
/// `Static` while a file body is streaming and the pump swaps back on EOF or
/// close, which replaces the original per-connection handler juggling with a
/// plain state machine.
pub(crate) enum Proto {
    /// HTTP multiplexer: frames `recv` and dispatches `HttpMsg`.
    Http,
    /// Static file pump refilling `send` from an open file.
    #[cfg(feature = "fs")]
    Static(crate::serve::FilePump),
}

pub struct Connection {
    pub id: u64,
    /// Bytes received from the peer, appended by the host loop.
    pub recv: IoBuf,
    /// Bytes queued for transmission, drained by the host loop.
    pub send: IoBuf,
    pub is_listening: bool,
    pub is_client: bool,
    pub is_accepted: bool,
    /// Close once `send` has drained.
    pub is_draining: bool,
    /// Close as soon as possible, without flushing.
    pub is_closing: bool,
    #[cfg(feature = "debug-endpoint")]
    pub label: String,
    pub(crate) proto: Proto,
    pub(crate) handler: Option<EventHandler>,
}

impl Connection {
    pub(crate) fn new(id: u64, proto: Proto, handler: Option<EventHandler>) -> Self {
        Connection {
            id,
            recv: IoBuf::new(),
            send: IoBuf::new(),
            is_listening: false,
            is_client: false,
            is_accepted: false,
            is_draining: false,
            is_closing: false,
            #[cfg(feature = "debug-endpoint")]
            label: String::new(),
            proto,
            handler,
        }
    }

    /// Invokes the user handler with `ev`. Nested invocations on the same
    /// handler (a handler signaling an error on its own connection) are
    /// dropped rather than re-entered.
    pub(crate) fn call(&mut self, ev: Event<'_>) {
        if let Some(handler) = self.handler.clone() {
            if let Ok(mut f) = handler.try_borrow_mut() {
                f(self, ev);
            }
        }
    }

    /// Signals a fatal per-connection condition: logs, flags the connection
    /// closing and dispatches [`Event::Error`] to the user handler.
    pub fn error(&mut self, msg: &str) {
        error!("{} error: {}", self.id, msg);
        self.is_closing = true;
        self.call(Event::Error(msg));
    }
}
