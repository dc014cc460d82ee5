use metrics_exporter_prometheus::PrometheusBuilder;

/// Binds the Prometheus exporter to `CHANGEPROP_METRICS_ADDR` (default
/// `0.0.0.0:9090`) so the counters recorded in `changeprop-executor`
/// (`changeprop_exec_success_total`, `changeprop_retry_scheduled_total`,
/// `changeprop_error_total`, `changeprop_loop_detected_total`,
/// `changeprop_rule_noop_total`) are scrapable.
pub fn install() -> anyhow::Result<()> {
    let addr = std::env::var("CHANGEPROP_METRICS_ADDR").unwrap_or_else(|_| "0.0.0.0:9090".to_string());
    let socket_addr: std::net::SocketAddr = addr.parse()?;
    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .install()?;
    Ok(())
}
