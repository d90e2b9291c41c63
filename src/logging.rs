//! Console logging setup
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the program. [`init`] is a convenience for binaries and worker programs.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter` when set. Calling this
/// more than once, or after another subscriber was installed, is a no-op.
/// Output goes to stderr so worker programs keep stdout for replies.
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
