//! Input validation for IRC protocol compliance


/// Validates an IRC channel name according to RFC 2812
pub fn validate_channel_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Channel name cannot be empty".to_string());
    }

    // Channel must start with # or &
    if !name.starts_with('#') && !name.starts_with('&') {
        return Err(format!("Channel name must start with # or &: {}", name));
    }

    // Maximum length per RFC 2812 is 50 characters
    if name.len() > 50 {
        return Err("Channel name too long (max 50 characters)".to_string());
    }

    // Channel names cannot contain spaces, commas, or control characters
    if name.contains(|c: char| c.is_control() || c == ' ' || c == ',') {
        return Err(format!("Channel name contains invalid characters: {}", name));
    }

    Ok(())
}

/// Validate IRC nickname according to RFC 2812
pub fn validate_nickname(nick: &str) -> Result<(), String> {
    let first_char = nick.chars().next()
        .ok_or_else(|| "Nickname cannot be empty".to_string())?;

    // Servers commonly allow more than the RFC's 9 characters
    if nick.len() > 30 {
        return Err("Nickname too long (max 30 characters)".to_string());
    }

    if !first_char.is_alphabetic() && !"[]{}\\|_^`".contains(first_char) {
        return Err(format!("Nickname must start with a letter or special character: {}", nick));
    }

    for c in nick.chars() {
        if !c.is_alphanumeric() && !"-[]{}\\|_^`".contains(c) {
            return Err(format!("Invalid character '{}' in nickname", c));
        }
    }

    Ok(())
}

/// Validates an upstream host entry
pub fn validate_host(host: &str, port: u16) -> Result<(), String> {
    if host.is_empty() {
        return Err("Hostname cannot be empty".to_string());
    }

    if host.contains(|c: char| c.is_whitespace() || c == ':' || c == '/') {
        return Err(format!("Invalid hostname: {}", host));
    }

    if port == 0 {
        return Err("Port number must be greater than 0".to_string());
    }

    Ok(())
}

/// Validates a client identifier used to provision a backlog
pub fn validate_client_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Client name cannot be empty".to_string());
    }

    if !name.chars().all(|c| c.is_alphanumeric() || "-_.".contains(c)) {
        return Err(format!("Invalid client name: {}", name));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert!(validate_channel_name("#general").is_ok());
        assert!(validate_channel_name("&local").is_ok());
        assert!(validate_channel_name("#rust-lang").is_ok());

        assert!(validate_channel_name("").is_err());
        assert!(validate_channel_name("notachannel").is_err());
        assert!(validate_channel_name("#test channel").is_err());
        assert!(validate_channel_name("#a,#b").is_err());
        assert!(validate_channel_name(&"#".repeat(51)).is_err());
    }

    #[test]
    fn test_nicknames() {
        assert!(validate_nickname("alice").is_ok());
        assert!(validate_nickname("Bob123").is_ok());
        assert!(validate_nickname("[guest]").is_ok());
        assert!(validate_nickname("`tilde").is_ok());

        assert!(validate_nickname("").is_err());
        assert!(validate_nickname("123user").is_err());
        assert!(validate_nickname("with space").is_err());
        assert!(validate_nickname(&"a".repeat(31)).is_err());
    }

    #[test]
    fn test_hosts() {
        assert!(validate_host("irc.libera.chat", 6697).is_ok());
        assert!(validate_host("127.0.0.1", 6667).is_ok());

        assert!(validate_host("", 6667).is_err());
        assert!(validate_host("irc.libera.chat:6667", 6667).is_err());
        assert!(validate_host("irc.libera.chat", 0).is_err());
    }

    #[test]
    fn test_client_names() {
        assert!(validate_client_name("laptop").is_ok());
        assert!(validate_client_name("phone-2").is_ok());

        assert!(validate_client_name("").is_err());
        assert!(validate_client_name("my phone").is_err());
    }
}
