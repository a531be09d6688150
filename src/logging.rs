//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "kanban=debug,info" } else { "info" }
}

fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Install the global subscriber. `RUST_LOG` wins over `verbose`;
/// `KANBAN_LOG_JSON=1` switches to JSON lines. Logs go to stderr so command
/// output on stdout stays machine-readable.
///
/// Calling this twice is harmless: the second install is ignored.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = if env_bool("KANBAN_LOG_JSON") {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_raises_crate_level() {
        assert_eq!(default_directive(false), "info");
        assert!(default_directive(true).contains("kanban=debug"));
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_tracing(false);
        init_tracing(true);
    }
}
