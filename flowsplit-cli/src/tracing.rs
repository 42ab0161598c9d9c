use anyhow::{Context, Result};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

const CRATES: [&str; 3] = ["flowsplit_core", "flowsplit_schema", "flowsplit"];

pub fn setup_tracing(debug: bool) -> Result<()> {
    // Layer to output to stdout
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    let level = if debug { "debug" } else { "info" };

    let mut filter = EnvFilter::from_default_env();
    for krate in CRATES {
        filter = filter.add_directive(format!("{krate}={level}").parse()?);
    }

    let subscriber = Registry::default().with(stdout_layer).with(filter);
    tracing::subscriber::set_global_default(subscriber).context("Failed to set global tracing subscriber")?;

    Ok(())
}
