//! Progress and diagnostic logging.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: what each stage is about to do, what it found,
//!   every tool command line and every failure. Goes to stderr, filtered by
//!   `RUST_LOG`.
//!
//! - **Stage reports (`report`)**: the final per-stage summary on stdout,
//!   optionally as JSON. Unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `apkpipe=info` so stage progress is
/// visible without configuration.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=apkpipe=debug apkpipe --dir com.example.app build
/// ```
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("apkpipe=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
