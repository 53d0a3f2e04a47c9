//! Process-wide tracing setup shared by the ForgeShip binaries.

/// Subscriber configuration (filter, output format).
pub mod subscriber;

pub use subscriber::LogFormat;

/// Initialize process-wide tracing: JSON lines, `RUST_LOG` filter, `info` by
/// default. `FORGESHIP_LOG_FORMAT=pretty` switches to human-readable output.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    let format = std::env::var(subscriber::LOG_FORMAT_VAR)
        .ok()
        .and_then(|value| LogFormat::parse(&value))
        .unwrap_or_default();
    subscriber::init_with(format, "info");
}
