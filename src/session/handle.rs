//! Async façade for a session running on its own task.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{Host, Session};
use crate::backlog::SharedBacklog;
use crate::client::ClientHandle;
use crate::message::IrcMessage;
use crate::protocol::SessionCommand;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} is no longer running")]
    Closed(String),
}

/// Clonable handle that forwards requests to a spawned [`Session`]
#[derive(Debug, Clone)]
pub struct SessionHandle {
    name: String,
    commands: mpsc::UnboundedSender<SessionCommand>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    /// Spawn `session`'s event loop and return a handle to it
    pub fn spawn(session: Session) -> (Self, JoinHandle<()>) {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let handle = Self {
            name: session.name().to_string(),
            commands,
            shutdown: session.shutdown_token(),
        };
        let span = tracing::info_span!("session", account = %session.name());
        let task = tokio::spawn(session.run(commands_rx).instrument(span));
        (handle, task)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::Closed(self.name.clone()))
    }

    pub fn add_host(&self, host: Host) -> Result<(), SessionError> {
        self.send(SessionCommand::AddHost(host))
    }

    pub fn add_client(&self, name: &str) -> Result<(), SessionError> {
        self.send(SessionCommand::AddClient(name.to_string()))
    }

    pub fn set_max_backlog(&self, max_backlog: Option<usize>) -> Result<(), SessionError> {
        self.send(SessionCommand::SetMaxBacklog(max_backlog))
    }

    pub fn join_room(&self, room: &str) -> Result<(), SessionError> {
        self.send(SessionCommand::JoinRoom(room.to_string()))
    }

    pub fn change_nick(&self, nick: &str) -> Result<(), SessionError> {
        self.send(SessionCommand::ChangeNick(nick.to_string()))
    }

    pub fn send_raw(&self, line: &str) -> Result<(), SessionError> {
        self.send(SessionCommand::Send(line.to_string()))
    }

    /// Attach a downstream connection; `Ok(None)` means unknown client
    pub async fn attach(&self, conn: ClientHandle) -> Result<Option<SharedBacklog>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Attach { conn, reply })?;
        rx.await.map_err(|_| SessionError::Closed(self.name.clone()))
    }

    pub fn detach(&self, conn: ClientHandle) -> Result<(), SessionError> {
        self.send(SessionCommand::Detach(conn))
    }

    pub fn set_away(&self, conn: ClientHandle, message: Option<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::Away { conn, message })
    }

    pub fn send_welcome(&self, conn: ClientHandle) -> Result<(), SessionError> {
        self.send(SessionCommand::SendWelcome(conn))
    }

    /// Register a push device; returns its token when accepted
    pub async fn push(
        &self,
        conn: ClientHandle,
        msg: IrcMessage,
    ) -> Result<Option<String>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Push { conn, msg, reply })?;
        rx.await.map_err(|_| SessionError::Closed(self.name.clone()))
    }

    /// Stop the session, cancelling any pending reconnect
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
