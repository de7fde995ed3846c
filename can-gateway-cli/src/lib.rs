//! Shared plumbing for the gateway command line tools.

use std::io::BufRead;

/// Default blocking-receive deadline; bounds how long a routing loop needs
/// to notice a stop request.
pub const RECEIVE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(3);

/// Installs the tracing subscriber, filtered through `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("can_gateway=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Blocks the calling thread until the operator presses enter.
pub fn wait_for_enter() {
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}
