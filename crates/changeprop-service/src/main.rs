//! The change-propagation engine's service entry point: loads
//! configuration, wires the rule registry, guaranteed producer, and
//! consumer workers, then runs until signaled to stop.

mod bootstrap;
mod logging;
mod metrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    if let Err(err) = metrics::install() {
        tracing::warn!(error = %err, "failed to install prometheus exporter, continuing without metrics");
    }

    let (kafka_config, rules) = changeprop_config::load_config()?;
    tracing::info!(
        consume_dc = %kafka_config.consume_dc(),
        produce_dc = %kafka_config.produce_dc(),
        topics = rules.topics().count(),
        "starting change-propagation engine"
    );

    let service = bootstrap::start(&kafka_config, rules).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, draining workers");
    service.shutdown().await;

    Ok(())
}
