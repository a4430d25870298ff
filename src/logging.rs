use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter, e.g. `framegraph=trace`.
pub const LOG_ENV: &str = "FRAMEGRAPH_LOG";

/// Install a global `tracing` subscriber that prints to stderr.
///
/// The filter is read from [`LOG_ENV`] and defaults to `info`. Fails if a
/// global subscriber is already installed.
pub fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}
