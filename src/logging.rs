use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber: human readable events on stderr, filtered
/// by `filter` (an `EnvFilter` directive such as `monthledger=debug`).
pub fn init(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter)
        .with_context(|| format!("Invalid log filter \"{filter}\""))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init()
        .context("Failed to install log subscriber")?;
    Ok(())
}
