// Development-time tracing for the CLI.
//
// Reads `RUST_LOG` and defaults to `warn`. Output goes to stderr in
// compact format so stdout stays clean for the build report — the report
// and the narrative event stream are product output, tracing is not.
//
// Example:
//   RUST_LOG=gantry_core=debug gantry build --shape house

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
