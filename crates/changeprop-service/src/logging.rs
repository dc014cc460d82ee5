use tracing_subscriber::{fmt, EnvFilter};

/// `CHANGEPROP_LOG` selects the filter directive (default `info`),
/// following `knhk-cli`'s environment-driven tracing setup but without the
/// OTLP exporter pipeline. This service emits structured logs only.
pub fn init() {
    let filter = EnvFilter::try_from_env("CHANGEPROP_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).json().init();
}
