//! Handles to downstream bouncer connections.
//!
//! A `ClientHandle` is a cheap, clonable reference to a connection that the
//! downstream component owns. The session only ever keeps relations to it
//! (lookup by [`ConnId`]); it never controls the connection's lifetime.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::message::IrcMessage;
use crate::protocol::ClientEvent;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one downstream connection
pub type ConnId = u64;

#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ConnId,
    /// Client identifier used to look up the Backlog
    name: String,
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ClientHandle {
    /// Create a handle for a new downstream connection.
    ///
    /// The receiver is for the downstream side, which writes forwarded
    /// messages to its socket and closes it on `ClientEvent::Error`.
    pub fn new(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            tx,
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn send_msg(&self, msg: IrcMessage) {
        // A closed receiver means the connection is already gone
        let _ = self.tx.send(ClientEvent::Message(msg));
    }

    /// Force the downstream connection to terminate
    pub fn error(&self, reason: &str) {
        let _ = self.tx.send(ClientEvent::Error(reason.to_string()));
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl PartialEq for ClientHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClientHandle {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_have_distinct_identity() {
        let (a, _ra) = ClientHandle::new("laptop");
        let (b, _rb) = ClientHandle::new("laptop");
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn test_send_and_error_reach_receiver() {
        let (conn, mut rx) = ClientHandle::new("phone");
        let msg = IrcMessage::parse("PRIVMSG #a :hi").unwrap();
        conn.send_msg(msg.clone());
        conn.error("client disconnected");

        assert_eq!(rx.try_recv().unwrap(), ClientEvent::Message(msg));
        assert_eq!(
            rx.try_recv().unwrap(),
            ClientEvent::Error("client disconnected".into())
        );
    }

    #[test]
    fn test_send_after_close_is_ignored() {
        let (conn, rx) = ClientHandle::new("gone");
        drop(rx);
        assert!(conn.is_closed());
        conn.send_msg(IrcMessage::new("PING", vec![]));
    }
}
