//! Downstream clients: provisioning, attach/detach, away status and push.

use tracing::{debug, info, warn};

use super::state::{away_command, AwayEntry, CLIENT_DISCONNECTED};
use super::Session;
use crate::backlog::{Backlog, SharedBacklog};
use crate::client::ClientHandle;
use crate::message::IrcMessage;
use crate::push::PushService;

impl Session {
    /// Provision a backlog for a client identifier; existing ones are kept
    pub fn add_client(&mut self, name: &str) {
        if self.backlogs.contains_key(name) {
            return;
        }
        debug!(session = %self.name, client = %name, "provisioning backlog");
        self.backlogs
            .insert(name.to_string(), Backlog::shared(name, self.max_backlog));
    }

    pub fn backlog(&self, name: &str) -> Option<SharedBacklog> {
        self.backlogs.get(name).cloned()
    }

    pub fn set_max_backlog(&mut self, max_backlog: Option<usize>) {
        self.max_backlog = max_backlog;
        for backlog in self.backlogs.values() {
            Backlog::lock(backlog).set_max_backlog(max_backlog);
        }
    }

    pub fn active_conns(&self) -> &[ClientHandle] {
        &self.active_conns
    }

    pub fn away_entries(&self) -> &[AwayEntry] {
        &self.away
    }

    /// Attach a downstream connection to its client's backlog.
    ///
    /// Returns `None` when no backlog was provisioned for the client.
    pub fn bouncer_connect(&mut self, conn: &ClientHandle) -> Option<SharedBacklog> {
        let Some(backlog) = self.backlogs.get(conn.name()).cloned() else {
            warn!(session = %self.name, client = %conn.name(), "attach from unknown client");
            return None;
        };

        match self.away.iter_mut().find(|e| e.conn == conn.id()) {
            // Re-attach of a live connection: back to present, no new entries
            Some(entry) => {
                debug!(session = %self.name, conn = conn.id(), "connection already attached");
                entry.message = None;
            }
            None => {
                info!(session = %self.name, client = %conn.name(), conn = conn.id(), "client attached");
                self.active_conns.push(conn.clone());
                Backlog::lock(&backlog).add_conn(conn.clone());
                self.away.push(AwayEntry {
                    conn: conn.id(),
                    message: None,
                });
            }
        }
        self.check_away_status();
        Some(backlog)
    }

    pub fn bouncer_disconnect(&mut self, conn: &ClientHandle) {
        let Some(backlog) = self.backlogs.get(conn.name()) else {
            return;
        };

        info!(session = %self.name, client = %conn.name(), conn = conn.id(), "client detached");
        Backlog::lock(backlog).remove_conn(conn.id());
        self.away.retain(|e| e.conn != conn.id());
        self.check_away_status();
        self.active_conns.retain(|c| c != conn);
    }

    /// Record an away report; `None` means the client is present
    pub fn got_away(&mut self, conn: &ClientHandle, message: Option<String>) {
        match self.away.iter_mut().find(|e| e.conn == conn.id()) {
            Some(entry) => entry.message = message,
            None => {
                debug!(session = %self.name, conn = conn.id(), "away report from detached connection");
                return;
            }
        }
        self.check_away_status();
    }

    pub fn check_away_status(&self) {
        self.send_msg(&away_command(&self.away));
    }

    /// Replay the greeting transcript to one connection, in order
    pub fn send_welcome(&self, conn: &ClientHandle) {
        for msg in &self.welcomes {
            conn.send_msg(msg.clone());
        }
    }

    /// Terminate every active connection of a client; its backlog stays
    pub fn remove_client(&mut self, name: &str) {
        let Some(backlog) = self.backlogs.get(name) else {
            return;
        };
        let conns = Backlog::lock(backlog).active_conns().to_vec();
        for conn in conns {
            debug!(session = %self.name, client = %name, conn = conn.id(), "evicting connection");
            conn.error(CLIENT_DISCONNECTED);
        }
    }

    /// Handle a PUSH registration; only `add-device` is supported
    pub fn got_push(&mut self, conn: &ClientHandle, msg: &IrcMessage) -> Option<&PushService> {
        let service = match PushService::new(self, msg) {
            Ok(service) => service,
            Err(e) => {
                info!(session = %self.name, client = %conn.name(), error = %e, "rejecting PUSH");
                return None;
            }
        };

        let token = service.device_token().to_string();
        info!(session = %self.name, client = %conn.name(), device = %token, "registered push device");
        self.push_services.insert(token.clone(), service);
        self.push_services.get(&token)
    }

    pub fn push_service(&self, device_token: &str) -> Option<&PushService> {
        self.push_services.get(device_token)
    }
}
