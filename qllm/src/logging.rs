//! Opt-in `tracing` subscriber for binaries and examples.
//!
//! The library crates only emit events; nothing is printed unless an application
//! installs a subscriber, either its own or the one built here.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs a compact formatter filtered by `RUST_LOG`, defaulting to `info`.
///
/// Returns `false` when a global subscriber is already set.
pub fn init_tracing() -> bool {
    init_tracing_with(DEFAULT_LOG_FILTER)
}

pub fn init_tracing_with(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_installation_is_refused() {
        let _ = init_tracing_with("debug");
        assert!(!init_tracing());
    }
}
