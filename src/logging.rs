//! # Structured Logging
//!
//! Environment-aware `tracing` subscriber setup for binaries and tests that use
//! the mapper. The library itself only emits events.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter directive override, takes precedence over `RUST_LOG`.
pub const LOG_FILTER_ENV: &str = "RUST_SQLITE_MAPPER_LOG";

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install a console subscriber once; later calls are no-ops.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = std::env::var(LOG_FILTER_ENV)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| default_level(&environment).to_string());

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(EnvFilter::new(&filter)),
        );

        // Another subscriber may already own the global slot (e.g. the host binary)
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already installed");
            return;
        }

        tracing::info!(environment = %environment, filter = %filter, "logging initialized");
    });
}

fn get_environment() -> String {
    std::env::var("RUNAR_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn default_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}
