use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::session::Host;
use crate::validation;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine a configuration directory")]
    NoConfigDir,
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("account {account}: {reason}")]
    Invalid { account: String, reason: String },
}

/// One upstream account served by a single session
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Account {
    pub name: String,
    pub nick: String,
    pub hosts: Vec<Host>,
    /// Rooms joined once the first greeting completes
    #[serde(default)]
    pub rooms: Vec<String>,
    /// Client identifiers provisioned with a backlog at startup
    #[serde(default)]
    pub clients: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub max_backlog: Option<usize>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl Settings {
    pub fn from_json(path: &Path, content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check every account; an account without hosts can never connect
    pub fn validate(&self) -> Result<(), ConfigError> {
        for account in &self.accounts {
            let invalid = |reason: String| ConfigError::Invalid {
                account: account.name.clone(),
                reason,
            };

            if account.name.trim().is_empty() {
                return Err(invalid("account name cannot be empty".into()));
            }
            validation::validate_nickname(&account.nick).map_err(invalid)?;
            if account.hosts.is_empty() {
                return Err(invalid("at least one host is required".into()));
            }
            for host in &account.hosts {
                validation::validate_host(&host.host, host.port).map_err(invalid)?;
            }
            for room in &account.rooms {
                validation::validate_channel_name(room).map_err(invalid)?;
            }
            for client in &account.clients {
                validation::validate_client_name(client).map_err(invalid)?;
            }
        }
        Ok(())
    }
}

pub fn settings_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "sid3xyz", "slirc-bouncer")
        .map(|proj| proj.config_dir().join("settings.json"))
}

/// Load and validate settings from `path`, or from the default location
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => settings_path().ok_or(ConfigError::NoConfigDir)?,
    };
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let settings = Settings::from_json(&path, &content)?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "max_backlog": 500,
        "accounts": [{
            "name": "libera",
            "nick": "ferris",
            "hosts": [
                { "host": "irc.libera.chat", "port": 6697, "tls": true },
                { "host": "irc.eu.libera.chat", "port": 6667 }
            ],
            "rooms": ["#rust"],
            "clients": ["laptop", "phone"]
        }]
    }"##;

    #[test]
    fn test_parse_sample_settings() {
        let settings = Settings::from_json(Path::new("sample.json"), SAMPLE).unwrap();
        assert_eq!(settings.max_backlog, Some(500));
        let account = &settings.accounts[0];
        assert_eq!(account.hosts[0], Host::new("irc.libera.chat", 6697, true));
        assert!(!account.hosts[1].tls);
        assert!(!account.hosts[1].verify_tls);
        assert_eq!(account.clients, vec!["laptop", "phone"]);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_account_without_hosts() {
        let mut settings = Settings::from_json(Path::new("sample.json"), SAMPLE).unwrap();
        settings.accounts[0].hosts.clear();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_nick_and_room() {
        let mut settings = Settings::from_json(Path::new("sample.json"), SAMPLE).unwrap();
        settings.accounts[0].nick = "9lives".into();
        assert!(settings.validate().is_err());

        let mut settings = Settings::from_json(Path::new("sample.json"), SAMPLE).unwrap();
        settings.accounts[0].rooms.push("rust".into());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = Settings::from_json(Path::new("broken.json"), "{ nope").unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load_settings(Some(Path::new("/nonexistent/slirc/settings.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
