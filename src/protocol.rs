//! Channel protocol between the transport, the session and its clients.

use tokio::sync::oneshot;

use crate::backlog::SharedBacklog;
use crate::client::ClientHandle;
use crate::message::IrcMessage;
use crate::session::Host;

/// Identifies one transport adapter instance within a session
pub type LinkId = u64;

/// Events delivered to a session's event loop
#[derive(Debug)]
pub enum SessionEvent {
    /// The transport is usable (TLS handshake done, if any)
    Established(LinkId),
    /// One CRLF-delimited line from the server
    Line(LinkId, String),
    /// The transport terminated; sent exactly once per link
    Disconnected(LinkId),
    /// A throttled connect attempt is due
    Reconnect,
}

/// Requests sent to a running session through its handle
#[derive(Debug)]
pub enum SessionCommand {
    AddHost(Host),
    AddClient(String),
    SetMaxBacklog(Option<usize>),
    JoinRoom(String),
    ChangeNick(String),
    /// Write a raw line upstream
    Send(String),
    Attach {
        conn: ClientHandle,
        reply: oneshot::Sender<Option<SharedBacklog>>,
    },
    Detach(ClientHandle),
    /// Away report from a downstream connection; `None` means present
    Away {
        conn: ClientHandle,
        message: Option<String>,
    },
    /// Replay the welcome transcript to a downstream connection
    SendWelcome(ClientHandle),
    Push {
        conn: ClientHandle,
        msg: IrcMessage,
        reply: oneshot::Sender<Option<String>>,
    },
}

/// Events delivered to a downstream connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Forward a message to the client
    Message(IrcMessage),
    /// Terminate the downstream connection with a reason
    Error(String),
}
