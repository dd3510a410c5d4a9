//! Structured logging through `tracing-subscriber`.

use timekeep_domain::LoggingConfig;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level`. Returns `false` when a subscriber
/// was already installed, so calling this twice is harmless.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = build_filter(&config.level);

    let installed = if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true);
        tracing_subscriber::registry().with(filter).with(layer).try_init().is_ok()
    } else {
        let layer = tracing_subscriber::fmt::layer().with_target(true);
        tracing_subscriber::registry().with(filter).with(layer).try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "Tracing initialized");
    }
    installed
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
