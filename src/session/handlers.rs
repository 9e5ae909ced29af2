//! Handshake and inbound message dispatch.

use tracing::{debug, trace, warn};

use super::state::{is_greeting_numeric, END_OF_GREETING};
use super::Session;
use crate::backlog::Backlog;
use crate::message::IrcMessage;

impl Session {
    /// Register with the server on a fresh link.
    ///
    /// The nick is always re-sent, even though it has not changed.
    pub(super) fn connection_established(&mut self) {
        debug!(session = %self.name, "upstream link established, registering");
        let nick = self.nick.clone();
        self.send_msg(&format!("USER {} localhost blah :{}", nick, nick));
        self.change_nick(&nick, true);
    }

    pub fn change_nick(&mut self, new_nick: &str, force: bool) {
        if !force && new_nick == self.nick {
            return;
        }
        self.nick = new_nick.to_string();
        self.send_msg(&format!("NICK {}", new_nick));
    }

    /// Classify one line from the server, then fan it out to every
    /// backlog and push service
    pub fn receive_line(&mut self, line: &str) {
        let msg = match IrcMessage::parse(line) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(session = %self.name, error = %e, "dropping unparseable line");
                return;
            }
        };

        if let Some(code) = msg.numeric().filter(|c| is_greeting_numeric(*c)) {
            if !self.joined_rooms {
                self.welcomes.push(msg.clone());
            }
            if code == END_OF_GREETING {
                self.got_welcome();
            }
        } else if msg.is_command("JOIN") {
            let user = msg.target_user().unwrap_or_default();
            let room = msg.first_arg();
            debug!(session = %self.name, %user, room = ?room, "join");
            if user == self.nick {
                if let Some(room) = room {
                    self.rooms.insert(room.to_string());
                }
            }
        } else if msg.is_command("PART") {
            let user = msg.target_user().unwrap_or_default();
            let room = msg.first_arg();
            debug!(session = %self.name, %user, room = ?room, "part");
            if user == self.nick {
                if let Some(room) = room {
                    self.rooms.remove(room);
                }
            }
        } else if msg.is_command("PING") {
            let payload = msg.last_arg().unwrap_or_default();
            self.send_msg(&format!("PONG {}!tkellem :{}", self.nick, payload));
        } else if msg.is_command("PONG") {
            // Client keepalives are answered downstream
            trace!(session = %self.name, "swallowing PONG");
        }

        for backlog in self.backlogs.values() {
            Backlog::lock(backlog).handle_message(&msg);
        }
        for service in self.push_services.values_mut() {
            service.handle_message(&msg);
        }
    }

    /// End of the greeting: rejoin rooms and open up for clients.
    ///
    /// Runs once per session lifetime. The flag is never reset, so later
    /// reconnects neither rejoin nor mark the session connected again.
    pub(super) fn got_welcome(&mut self) {
        if self.joined_rooms {
            debug!(session = %self.name, "greeting already handled once, skipping room joins");
            return;
        }
        self.joined_rooms = true;

        for room in &self.rooms {
            self.send_msg(&format!("JOIN {}", room));
        }

        self.connected = true;
        self.check_away_status();
    }
}
