//! Upstream session multiplexer.
//!
//! A `Session` owns the single upstream connection of one account and all
//! state shared by the downstream connections attached to it. All mutation
//! happens synchronously in the session's own event loop ([`Session::run`]);
//! the transport and the reconnect timer only post [`SessionEvent`]s.
//!
//! - `handlers`: handshake and inbound dispatch
//! - `clients`: attach/detach, away arbitration, eviction, push registration
//! - `handle`: the async command façade for a spawned session
//! - `state`: hosts, away entries and protocol constants

mod clients;
mod handle;
mod handlers;
mod state;

pub use handle::{SessionError, SessionHandle};
pub use state::{
    away_command, is_greeting_numeric, AwayEntry, Host, CLIENT_DISCONNECTED,
    DEFAULT_AWAY_MESSAGE, END_OF_GREETING, RECONNECT_FLOOR,
};

use std::collections::{BTreeSet, HashMap};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::backend::{Connector, Link};
use crate::backlog::SharedBacklog;
use crate::client::ClientHandle;
use crate::message::IrcMessage;
use crate::protocol::{LinkId, SessionCommand, SessionEvent};
use crate::push::{PushNotification, PushService};

pub struct Session {
    name: String,
    nick: String,
    hosts: Vec<Host>,
    /// Index of the host used by the latest attempt; `None` before the first
    cur_host: Option<usize>,
    connected: bool,
    last_connect: Option<Instant>,
    max_backlog: Option<usize>,
    backlogs: HashMap<String, SharedBacklog>,
    push_services: HashMap<String, PushService>,
    push_sink: Option<mpsc::UnboundedSender<PushNotification>>,
    welcomes: Vec<IrcMessage>,
    rooms: BTreeSet<String>,
    /// Set by the first end-of-greeting and never cleared
    joined_rooms: bool,
    active_conns: Vec<ClientHandle>,
    /// Away reports in attachment order
    away: Vec<AwayEntry>,
    link: Option<Link>,
    last_link_id: LinkId,
    connector: Box<dyn Connector + Send>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("nick", &self.nick)
            .field("hosts", &self.hosts)
            .field("connected", &self.connected)
            .field("rooms", &self.rooms)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session with no hosts; nothing connects until a host is added
    pub fn new(
        name: impl Into<String>,
        nick: impl Into<String>,
        connector: impl Connector + Send + 'static,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            nick: nick.into(),
            hosts: Vec::new(),
            cur_host: None,
            connected: false,
            last_connect: None,
            max_backlog: None,
            backlogs: HashMap::new(),
            push_services: HashMap::new(),
            push_sink: None,
            welcomes: Vec::new(),
            rooms: BTreeSet::new(),
            joined_rooms: false,
            active_conns: Vec::new(),
            away: Vec::new(),
            link: None,
            last_link_id: 0,
            connector: Box::new(connector),
            events_tx,
            events_rx: Some(events_rx),
            shutdown: CancellationToken::new(),
        }
    }

    /// Route notifications produced by registered push services to `sink`
    pub fn with_push_sink(mut self, sink: mpsc::UnboundedSender<PushNotification>) -> Self {
        self.push_sink = Some(sink);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Host targeted by the most recent connect attempt
    pub fn current_host(&self) -> Option<&Host> {
        self.cur_host.map(|i| &self.hosts[i])
    }

    pub fn rooms(&self) -> &BTreeSet<String> {
        &self.rooms
    }

    pub fn welcomes(&self) -> &[IrcMessage] {
        &self.welcomes
    }

    pub fn max_backlog(&self) -> Option<usize> {
        self.max_backlog
    }

    pub fn push_sink(&self) -> Option<mpsc::UnboundedSender<PushNotification>> {
        self.push_sink.clone()
    }

    /// Receiver for the session's own events, for driving it without `run`
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events_rx.take()
    }

    pub fn add_host(&mut self, host: Host) {
        debug!(session = %self.name, %host, "adding host");
        self.hosts.push(host);
        if self.hosts.len() == 1 {
            self.connect();
        }
    }

    /// Add a room to the wanted set, joining right away when connected
    pub fn join_room(&mut self, room: &str) {
        self.rooms.insert(room.to_string());
        if self.connected {
            self.send_msg(&format!("JOIN {}", room));
        }
    }

    /// Write one line upstream, appending the line terminator
    pub fn send_msg(&self, msg: &str) {
        trace!(session = %self.name, line = %msg, "to server");
        match &self.link {
            Some(link) => {
                if !link.send_data(format!("{}\r\n", msg)) {
                    debug!(session = %self.name, "upstream writer gone, dropping line");
                }
            }
            None => debug!(session = %self.name, line = %msg, "no upstream link, dropping line"),
        }
    }

    /// Start a throttled connect attempt against the next host.
    ///
    /// Attempts closer than [`RECONNECT_FLOOR`] to the previous one are
    /// deferred by a timer instead. Every attempt advances the host cursor,
    /// so retries rotate through the host list forever.
    fn connect(&mut self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        if self.hosts.is_empty() {
            warn!(session = %self.name, "connect requested with no hosts configured");
            return;
        }

        let now = Instant::now();
        if let Some(last) = self.last_connect {
            if now.duration_since(last) < RECONNECT_FLOOR {
                debug!(session = %self.name, "connect throttled, retrying in {:?}", RECONNECT_FLOOR);
                self.schedule_reconnect();
                return;
            }
        }

        self.last_connect = Some(now);
        let next = self.cur_host.map_or(0, |i| (i + 1) % self.hosts.len());
        self.cur_host = Some(next);
        self.last_link_id += 1;

        let host = &self.hosts[next];
        info!(session = %self.name, %host, link = self.last_link_id, "connecting");
        let link = self
            .connector
            .connect(self.last_link_id, host, self.events_tx.clone());
        self.link = Some(link);
    }

    fn schedule_reconnect(&self) {
        let events = self.events_tx.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(RECONNECT_FLOOR) => {
                    let _ = events.send(SessionEvent::Reconnect);
                }
            }
        });
    }

    /// The upstream link went away: evict every client and reconnect
    fn disconnected(&mut self) {
        info!(session = %self.name, "disconnected from upstream");
        self.link = None;
        self.connected = false;
        let names: Vec<String> = self.backlogs.keys().cloned().collect();
        for name in names {
            self.remove_client(&name);
        }
        self.connect();
    }

    fn is_current_link(&self, id: LinkId) -> bool {
        self.link.as_ref().is_some_and(|l| l.id() == id)
    }

    /// Apply one event from the transport or the reconnect timer
    pub fn handle_event(&mut self, event: SessionEvent) {
        if self.shutdown.is_cancelled() {
            return;
        }
        match event {
            SessionEvent::Established(id) if self.is_current_link(id) => {
                self.connection_established()
            }
            SessionEvent::Line(id, line) if self.is_current_link(id) => self.receive_line(&line),
            SessionEvent::Disconnected(id) if self.is_current_link(id) => self.disconnected(),
            SessionEvent::Reconnect if self.link.is_none() => self.connect(),
            SessionEvent::Reconnect => debug!(session = %self.name, "already connected, skipping reconnect"),
            stale => trace!(session = %self.name, ?stale, "ignoring event from stale link"),
        }
    }

    /// Apply one request from a [`SessionHandle`]
    pub fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::AddHost(host) => self.add_host(host),
            SessionCommand::AddClient(name) => self.add_client(&name),
            SessionCommand::SetMaxBacklog(max) => self.set_max_backlog(max),
            SessionCommand::JoinRoom(room) => self.join_room(&room),
            SessionCommand::ChangeNick(nick) => self.change_nick(&nick, false),
            SessionCommand::Send(line) => self.send_msg(&line),
            SessionCommand::Attach { conn, reply } => {
                let _ = reply.send(self.bouncer_connect(&conn));
            }
            SessionCommand::Detach(conn) => self.bouncer_disconnect(&conn),
            SessionCommand::Away { conn, message } => self.got_away(&conn, message),
            SessionCommand::SendWelcome(conn) => self.send_welcome(&conn),
            SessionCommand::Push { conn, msg, reply } => {
                let token = self
                    .got_push(&conn, &msg)
                    .map(|service| service.device_token().to_string());
                let _ = reply.send(token);
            }
        }
    }

    /// Stop the session: cancel pending reconnects and drop the link
    pub fn shutdown(&mut self) {
        info!(session = %self.name, "shutting down");
        self.shutdown.cancel();
        self.link = None;
        self.connected = false;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Drive the session until shutdown or until every handle is dropped
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        let Some(mut events) = self.events_rx.take() else {
            warn!(session = %self.name, "event receiver already taken, not running");
            return;
        };
        let shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(event) = events.recv() => self.handle_event(event),
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }

        self.shutdown();
    }
}
