//! Diagnostic logging setup
//!
//! Everything in the crate logs through `tracing`. Every upstream line in
//! either direction is emitted at `trace` level, so `RUST_LOG=slirc_bouncer=trace`
//! yields a full wire transcript per session.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor the CLI sets one
pub const DEFAULT_FILTER: &str = "info";

/// Build the filter; `RUST_LOG` wins over the level passed on the command line
pub fn build_filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global fmt subscriber. Safe to call more than once.
pub fn init(level: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init(Some("debug"));
        init(None);
    }

    #[test]
    fn test_invalid_level_falls_back() {
        // An unparsable directive must not panic
        let _filter = build_filter(Some("=[not a filter"));
    }
}
