//! Tracing initialization

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directives, e.g. `LODESTAR_LOG=lodestar_knowledge=debug,info`
pub const LOG_ENV: &str = "LODESTAR_LOG";
/// `json` switches to structured output
pub const LOG_FORMAT_ENV: &str = "LODESTAR_LOG_FORMAT";

/// Install the global subscriber
///
/// Reads `LODESTAR_LOG`, falling back to `default_filter` when unset or
/// invalid. Returns `false` if a subscriber was already installed, so
/// repeated calls are harmless.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json().with_target(true)))
        .with((!json).then(|| fmt::layer().with_target(true)))
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        let _ = init_tracing("lodestar=info");
        assert!(!init_tracing("debug"));
        tracing::info!("still logging");
    }
}
