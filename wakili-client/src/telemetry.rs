//! Logging setup for the `wakili` binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the config sets a valid one.
pub const DEFAULT_LOG_FILTER: &str = "wakili_client=info,wakili=info,warn";

/// Pick the filter directives: `RUST_LOG` wins over the configured filter,
/// which wins over [`DEFAULT_LOG_FILTER`]. Unparseable directives are skipped.
pub fn resolve_filter<'a>(env: Option<&'a str>, configured: Option<&'a str>) -> &'a str {
    [env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .find(|d| EnvFilter::try_new(d).is_ok())
        .unwrap_or(DEFAULT_LOG_FILTER)
}

/// Install the global subscriber. Logs go to stderr so stdout stays the page.
///
/// Call once at startup, before any command runs.
pub fn init_logging(configured: Option<&str>) -> Result<(), String> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = resolve_filter(env.as_deref(), configured);

    tracing_subscriber::registry()
        .with(EnvFilter::new(directives))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| format!("Failed to init subscriber: {}", e))?;

    tracing::debug!(directives, "logging initialized");
    Ok(())
}
