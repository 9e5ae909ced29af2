//! Value types held by a session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::client::ConnId;

/// Minimum spacing between two upstream connect attempts
pub const RECONNECT_FLOOR: Duration = Duration::from_secs(5);

/// Away text used when every attached client is away without a message
pub const DEFAULT_AWAY_MESSAGE: &str = "Away";

/// Numeric that closes the server greeting (RPL_ENDOFMOTD)
pub const END_OF_GREETING: u16 = 376;

/// Reason given to downstream connections evicted on upstream loss
pub const CLIENT_DISCONNECTED: &str = "client disconnected";

/// One candidate upstream server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    /// Check the server certificate against the webpki roots
    #[serde(default)]
    pub verify_tls: bool,
}

impl Host {
    pub fn new(host: impl Into<String>, port: u16, tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
            verify_tls: false,
        }
    }

    pub fn with_verification(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)?;
        if self.tls {
            f.write_str(" (tls)")?;
        }
        Ok(())
    }
}

/// Away report of one attached connection; `None` means present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwayEntry {
    pub conn: ConnId,
    pub message: Option<String>,
}

/// Whether a numeric reply belongs to the greeting transcript.
///
/// Includes 250-269 so the user-count replies (265 RPL_LOCALUSERS, 266
/// RPL_GLOBALUSERS) are replayed along with the LUSERS block and MOTD.
pub fn is_greeting_numeric(code: u16) -> bool {
    matches!(code, 0..=99 | 250..=269 | 372 | 375 | 376)
}

/// Collapse every client's away state into the one upstream AWAY command.
///
/// A single present client clears away status. Otherwise the first
/// non-empty message in attachment order wins.
pub fn away_command(entries: &[AwayEntry]) -> String {
    if entries.iter().any(|e| e.message.is_none()) {
        return "AWAY".to_string();
    }
    let message = entries
        .iter()
        .filter_map(|e| e.message.as_deref())
        .find(|m| !m.is_empty())
        .unwrap_or(DEFAULT_AWAY_MESSAGE);
    format!("AWAY :{}", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(conn: ConnId, message: Option<&str>) -> AwayEntry {
        AwayEntry {
            conn,
            message: message.map(str::to_string),
        }
    }

    #[test]
    fn test_presence_wins_over_any_away() {
        let entries = [entry(1, Some("lunch")), entry(2, None), entry(3, Some("zzz"))];
        assert_eq!(away_command(&entries), "AWAY");
    }

    #[test]
    fn test_first_non_empty_message_in_attachment_order() {
        let entries = [entry(1, Some("")), entry(2, Some("lunch")), entry(3, Some("zzz"))];
        assert_eq!(away_command(&entries), "AWAY :lunch");
    }

    #[test]
    fn test_default_message_when_all_empty() {
        assert_eq!(away_command(&[entry(1, Some("")), entry(2, Some(""))]), "AWAY :Away");
        assert_eq!(away_command(&[]), "AWAY :Away");
    }

    #[test]
    fn test_greeting_numerics() {
        for code in [1, 2, 3, 4, 5, 42, 99, 250, 251, 255, 265, 266, 372, 375, 376] {
            assert!(is_greeting_numeric(code), "{} should be greeting", code);
        }
        for code in [100, 249, 270, 301, 332, 353, 371, 373, 374, 377, 433] {
            assert!(!is_greeting_numeric(code), "{} should not be greeting", code);
        }
    }

    #[test]
    fn test_host_display() {
        assert_eq!(Host::new("irc.example", 6667, false).to_string(), "irc.example:6667");
        assert_eq!(
            Host::new("irc.example", 6697, true).to_string(),
            "irc.example:6697 (tls)"
        );
    }
}
