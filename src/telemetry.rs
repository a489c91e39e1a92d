use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over the configured filter when set.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

#[cfg(feature = "metrics-exporter")]
pub fn init_metrics(addr: Option<SocketAddr>) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(addr) = addr else {
        return Ok(());
    };
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    tracing::info!(%addr, "prometheus exporter listening");
    metrics::gauge!("book_recorder_up").set(1.0);
    Ok(())
}

#[cfg(not(feature = "metrics-exporter"))]
pub fn init_metrics(addr: Option<SocketAddr>) -> anyhow::Result<()> {
    if let Some(addr) = addr {
        tracing::warn!(%addr, "metrics_addr set but built without the metrics-exporter feature");
    }
    Ok(())
}
