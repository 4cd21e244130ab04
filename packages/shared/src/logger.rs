//! Logging setup utilities for the relay-chat packages.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// Every target listed in `targets` gets `default_log_level`. The filter can be
/// overridden entirely with the `RUST_LOG` environment variable.
///
/// Log lines are written to stderr so they never interleave with an
/// interactive prompt on stdout.
///
/// # Arguments
///
/// * `targets` - Crate or binary names to enable (e.g. `["relay_chat_client", "relay_chat"]`)
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use relay_chat_shared::logger::setup_logger;
///
/// setup_logger(&["relay_chat_client", "relay_chat"], "info");
/// ```
pub fn setup_logger(targets: &[&str], default_log_level: &str) {
    let default_filter = build_default_filter(targets, default_log_level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build an `EnvFilter` directive string such as `a=info,b=info`.
///
/// Hyphens are replaced with underscores because tracing targets use the
/// module path of the crate.
fn build_default_filter(targets: &[&str], default_log_level: &str) -> String {
    targets
        .iter()
        .map(|target| format!("{}={}", target.replace('-', "_"), default_log_level))
        .collect::<Vec<_>>()
        .join(",")
}
