//! Logging and tracing configuration for imgpager
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the binary (or to whatever application embeds the crate).
//!
//! # Log Levels
//!
//! - `warn`  - Reported read errors, skipped directory entries, experimental part matching
//! - `info`  - Images opened
//! - `debug` - Backend selection, segment and part discovery
//! - `trace` - Handle pool hits and evictions, section walks, chunk inflation
//!
//! # Environment Variable Control
//!
//! ```bash
//! RUST_LOG=debug imgpager walk disk.E01
//! RUST_LOG=imgpager::codec=trace imgpager info disk.E01
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new("imgpager=debug")
        } else {
            EnvFilter::new("imgpager=info")
        }
    })
}

/// Initialize the logging/tracing system
///
/// Call this once at startup. Output goes to stderr so page data or JSON on
/// stdout stays clean.
pub fn init() {
    let subscriber = tracing_subscriber::registry().with(default_filter()).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    // Ignore error if already set
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize logging with verbose output (file:line, thread IDs)
pub fn init_verbose() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("imgpager=trace"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .pretty(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
