use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::{ClientHandle, ConnId};
use crate::message::IrcMessage;

/// Messages kept for a detached client when no explicit limit is configured
pub const DEFAULT_MAX_BACKLOG: usize = 2000;

/// Backlog shared between the session and the downstream connections
pub type SharedBacklog = Arc<Mutex<Backlog>>;

/// Per-client message history and fan-out target.
///
/// While at least one downstream connection is attached, every message is
/// forwarded to all of them. While none are attached, messages are kept
/// (bounded by `max_backlog`) until the next connection flushes them.
#[derive(Debug)]
pub struct Backlog {
    name: String,
    max_backlog: Option<usize>,
    messages: VecDeque<IrcMessage>,
    active_conns: Vec<ClientHandle>,
}

impl Backlog {
    pub fn new(name: impl Into<String>, max_backlog: Option<usize>) -> Self {
        Self {
            name: name.into(),
            max_backlog,
            messages: VecDeque::new(),
            active_conns: Vec::new(),
        }
    }

    pub fn shared(name: impl Into<String>, max_backlog: Option<usize>) -> SharedBacklog {
        Arc::new(Mutex::new(Self::new(name, max_backlog)))
    }

    /// Lock a shared backlog, recovering from a poisoned mutex
    pub fn lock(backlog: &SharedBacklog) -> MutexGuard<'_, Backlog> {
        backlog.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_backlog(&self) -> Option<usize> {
        self.max_backlog
    }

    pub fn set_max_backlog(&mut self, max_backlog: Option<usize>) {
        self.max_backlog = max_backlog;
        self.trim();
    }

    pub fn handle_message(&mut self, msg: &IrcMessage) {
        if self.active_conns.is_empty() {
            self.messages.push_back(msg.clone());
            self.trim();
        } else {
            for conn in &self.active_conns {
                conn.send_msg(msg.clone());
            }
        }
    }

    pub fn add_conn(&mut self, conn: ClientHandle) {
        if !self.active_conns.contains(&conn) {
            self.active_conns.push(conn);
        }
    }

    pub fn remove_conn(&mut self, id: ConnId) {
        self.active_conns.retain(|c| c.id() != id);
    }

    pub fn active_conns(&self) -> &[ClientHandle] {
        &self.active_conns
    }

    /// Messages currently held for a detached client
    pub fn pending(&self) -> usize {
        self.messages.len()
    }

    /// Flush everything held while the client was away to `conn`
    pub fn send_backlog(&mut self, conn: &ClientHandle) {
        for msg in self.messages.drain(..) {
            conn.send_msg(msg);
        }
    }

    fn trim(&mut self) {
        let max = self.max_backlog.unwrap_or(DEFAULT_MAX_BACKLOG);
        while self.messages.len() > max {
            self.messages.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ClientEvent;

    fn privmsg(text: &str) -> IrcMessage {
        IrcMessage::parse(&format!(":bob!b@h PRIVMSG #rust :{}", text)).unwrap()
    }

    #[test]
    fn test_buffers_while_detached_and_trims_oldest() {
        let mut backlog = Backlog::new("laptop", Some(3));
        for i in 0..5 {
            backlog.handle_message(&privmsg(&format!("msg{}", i)));
        }
        assert_eq!(backlog.pending(), 3);

        let (conn, mut rx) = ClientHandle::new("laptop");
        backlog.send_backlog(&conn);
        assert_eq!(backlog.pending(), 0);

        let first = rx.try_recv().unwrap();
        assert_eq!(first, ClientEvent::Message(privmsg("msg2")));
    }

    #[test]
    fn test_forwards_to_every_active_conn() {
        let mut backlog = Backlog::new("laptop", None);
        let (a, mut ra) = ClientHandle::new("laptop");
        let (b, mut rb) = ClientHandle::new("laptop");
        backlog.add_conn(a.clone());
        backlog.add_conn(b);
        backlog.add_conn(a);
        assert_eq!(backlog.active_conns().len(), 2);

        backlog.handle_message(&privmsg("hello"));
        assert_eq!(backlog.pending(), 0);
        assert_eq!(ra.try_recv().unwrap(), ClientEvent::Message(privmsg("hello")));
        assert_eq!(rb.try_recv().unwrap(), ClientEvent::Message(privmsg("hello")));
    }

    #[test]
    fn test_remove_conn_by_identity() {
        let mut backlog = Backlog::new("laptop", None);
        let (a, _ra) = ClientHandle::new("laptop");
        let (b, _rb) = ClientHandle::new("laptop");
        backlog.add_conn(a.clone());
        backlog.add_conn(b.clone());
        backlog.remove_conn(a.id());
        assert_eq!(backlog.active_conns(), &[b]);
    }

    #[test]
    fn test_lowering_max_backlog_trims_immediately() {
        let mut backlog = Backlog::new("phone", None);
        for i in 0..10 {
            backlog.handle_message(&privmsg(&format!("m{}", i)));
        }
        backlog.set_max_backlog(Some(4));
        assert_eq!(backlog.max_backlog(), Some(4));
        assert_eq!(backlog.pending(), 4);
    }
}
