//! Tracing subscriber setup for the binary.
//!
//! Filter priority: `TRIGREP_LOG`, then `RUST_LOG`, then the `-v` flag
//! (debug for this crate), defaulting to warnings only.

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "TRIGREP_LOG";

/// Install the global stderr subscriber. Call once, early in `main`.
pub fn init_subscriber(verbose: bool) {
    let filter = build_env_filter(verbose);
    let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_target(verbose);

    // a subscriber may already be installed when embedded
    let _ = if verbose {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_timer(fmt::time::uptime()))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.without_time().compact())
            .try_init()
    };
}

fn build_env_filter(verbose: bool) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV)
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let directive = if verbose {
        format!("{},trigrep=debug", Level::INFO)
    } else {
        Level::WARN.to_string()
    };
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"))
}
