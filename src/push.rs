//! Device push registration and highlight notifications.
//!
//! Delivery to the actual push gateway happens elsewhere; a `PushService`
//! only decides which upstream messages deserve a notification and hands
//! them to the session's notification sink.

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::message::IrcMessage;
use crate::session::Session;

/// The only recognised PUSH sub-command
pub const ADD_DEVICE: &str = "add-device";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("unsupported PUSH sub-command: {0:?}")]
    Unsupported(Option<String>),
    #[error("add-device without a device token")]
    MissingDeviceToken,
}

/// A notification ready for delivery to one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushNotification {
    pub device_token: String,
    pub account: String,
    pub sender: String,
    pub target: String,
    pub text: String,
}

#[derive(Debug)]
pub struct PushService {
    device_token: String,
    /// Extra registration arguments after the token, e.g. a gateway name
    options: Vec<String>,
    account: String,
    nick: String,
    sink: Option<mpsc::UnboundedSender<PushNotification>>,
}

impl PushService {
    /// Build a service from an `add-device <token> [options...]` registration
    pub fn new(session: &Session, msg: &IrcMessage) -> Result<Self, PushError> {
        match msg.first_arg() {
            Some(ADD_DEVICE) => {}
            other => return Err(PushError::Unsupported(other.map(str::to_string))),
        }
        let device_token = msg
            .args
            .get(1)
            .filter(|t| !t.is_empty())
            .ok_or(PushError::MissingDeviceToken)?
            .clone();

        Ok(Self {
            device_token,
            options: msg.args.iter().skip(2).cloned().collect(),
            account: session.name().to_string(),
            nick: session.nick().to_string(),
            sink: session.push_sink(),
        })
    }

    pub fn device_token(&self) -> &str {
        &self.device_token
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn handle_message(&mut self, msg: &IrcMessage) {
        if msg.is_command("NICK") {
            if msg.target_user() == Some(self.nick.as_str()) {
                if let Some(new_nick) = msg.last_arg() {
                    debug!(old = %self.nick, new = %new_nick, "push service following nick change");
                    self.nick = new_nick.to_string();
                }
            }
            return;
        }

        if !(msg.is_command("PRIVMSG") || msg.is_command("NOTICE")) || msg.args.len() < 2 {
            return;
        }
        let target = &msg.args[0];
        let text = &msg.args[1];
        if !self.is_highlight(target, text) {
            return;
        }

        let notification = PushNotification {
            device_token: self.device_token.clone(),
            account: self.account.clone(),
            sender: msg.target_user().unwrap_or_default().to_string(),
            target: target.clone(),
            text: text.clone(),
        };
        match &self.sink {
            Some(sink) => {
                let _ = sink.send(notification);
            }
            None => trace!(device = %self.device_token, "no push sink, dropping notification"),
        }
    }

    fn is_highlight(&self, target: &str, text: &str) -> bool {
        let nick = self.nick.to_ascii_lowercase();
        target.eq_ignore_ascii_case(&self.nick) || text.to_ascii_lowercase().contains(&nick)
    }
}
