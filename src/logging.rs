//! Diagnostic output for the `switchboard` binary.
//!
//! Library code logs through the `log` facade. The subscriber installed here
//! bridges those records, filters them with `RUST_LOG` (default `warn`) and
//! writes compact lines to stderr so stdout stays reserved for the ledger.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Call once, before any run is configured.
///
/// ```bash
/// RUST_LOG=switchboard=debug switchboard run scenarios/relay.toml
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
