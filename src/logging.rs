use std::sync::Once;

use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static INIT_ONCE: Once = Once::new();

/// Filter used when `RUST_LOG` is not set.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "apkmend=info",
        1 => "apkmend=debug",
        _ => "apkmend=trace",
    }
}

/// Installs the global subscriber writing human-readable lines to stderr.
/// Calls after the first one are ignored.
pub fn init(verbosity: u8) {
    INIT_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity))),
            )
            .with_writer(std::io::stderr)
            .with_target(false)
            .finish()
            .init();
    });
}
