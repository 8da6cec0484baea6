//! Minimal connection registry standing in for the host event loop at the
//! API seam.
//!
//! The manager owns no sockets. A host loop creates connections through
//! [`listen`](crate::listen) / [`connect`](crate::connect) /
//! [`Manager::accept`], copies wire bytes into `conn.recv`, raises events
//! with [`Manager::event`] and writes out whatever accumulates in
//! `conn.send`. Dispatch runs the protocol layer first and forwards the raw
//! event to the user handler afterwards, so handlers observe the same event
//! stream the protocol saw.

use crate::connection::{Connection, Event, EventHandler, Proto};

/// Slot handle for a connection owned by a [`Manager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnId(pub(crate) usize);

pub struct Manager {
    conns: Vec<Option<Connection>>,
    next_id: u64,
}

impl Manager {
    pub fn new() -> Self {
        Manager {
            conns: Vec::new(),
            next_id: 1,
        }
    }

    pub(crate) fn add(&mut self, proto: Proto, handler: Option<EventHandler>) -> ConnId {
        let id = self.next_id;
        self.next_id += 1;
        let conn = Connection::new(id, proto, handler);
        match self.conns.iter().position(Option::is_none) {
            Some(slot) => {
                self.conns[slot] = Some(conn);
                ConnId(slot)
            }
            None => {
                self.conns.push(Some(conn));
                ConnId(self.conns.len() - 1)
            }
        }
    }

    pub fn conn(&self, id: ConnId) -> Option<&Connection> {
        self.conns.get(id.0).and_then(Option::as_ref)
    }

    pub fn conn_mut(&mut self, id: ConnId) -> Option<&mut Connection> {
        self.conns.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Spawns a connection accepted off `listener`, sharing its handler, and
    /// delivers [`Event::Accept`] to it.
    pub fn accept(&mut self, listener: ConnId) -> ConnId {
        let handler = self.conn(listener).and_then(|c| c.handler.clone());
        let id = self.add(Proto::Http, handler);
        if let Some(conn) = self.conn_mut(id) {
            conn.is_accepted = true;
        }
        self.event(id, Event::Accept);
        id
    }

    /// Delivers one event: protocol layer first, then the user handler.
    pub fn event(&mut self, id: ConnId, ev: Event<'_>) {
        let mut conn = match self.conns.get_mut(id.0).and_then(Option::take) {
            Some(conn) => conn,
            None => return,
        };
        match conn.proto {
            Proto::Http => crate::http::multiplexer(&mut conn, self, ev),
            #[cfg(feature = "fs")]
            Proto::Static(_) => crate::serve::pump_event(&mut conn, ev),
        }
        conn.call(ev);
        if let Some(slot) = self.conns.get_mut(id.0) {
            *slot = Some(conn);
        }
    }

    /// Raises [`Event::Poll`] on every live connection.
    pub fn poll(&mut self) {
        let mut i = 0;
        while i < self.conns.len() {
            if self.conns[i].is_some() {
                self.event(ConnId(i), Event::Poll);
            }
            i += 1;
        }
    }

    /// Delivers [`Event::Close`] and removes the connection.
    pub fn close(&mut self, id: ConnId) {
        self.event(id, Event::Close);
        if let Some(slot) = self.conns.get_mut(id.0) {
            *slot = None;
        }
    }

    /// Live connections, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.conns.iter().filter_map(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
