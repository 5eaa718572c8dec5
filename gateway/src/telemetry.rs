use crate::config::{CommonConfig, LoggingConfig};
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const METRICS_PREFIX: &str = "gateway";

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("could not install tracing subscriber: {0}")]
    Subscriber(String),
    #[error("could not build statsd recorder: {0}")]
    Statsd(String),
    #[error("a metrics recorder is already installed")]
    RecorderInstalled,
}

/// Keeps the Sentry client alive; events are flushed when dropped.
pub struct TelemetryGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Installs logging (fmt + optional Sentry) and the statsd metrics recorder.
/// Must run before the async runtime is started.
pub fn init(config: &CommonConfig) -> Result<TelemetryGuard, TelemetryError> {
    let logging = config.logging.clone().unwrap_or_default();

    let sentry_guard = logging.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter(&logging))
        .with(tracing_subscriber::fmt::layer())
        .with(
            sentry_guard
                .as_ref()
                .map(|_| sentry::integrations::tracing::layer()),
        )
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

    if let Some(metrics_config) = &config.metrics {
        let recorder =
            StatsdBuilder::from(metrics_config.statsd_host.clone(), metrics_config.statsd_port)
                .build(Some(METRICS_PREFIX))
                .map_err(|e| TelemetryError::Statsd(e.to_string()))?;
        metrics::set_global_recorder(recorder).map_err(|_| TelemetryError::RecorderInstalled)?;
        shared::metrics_defs::describe_all(catalog::metrics_defs::ALL_METRICS);

        tracing::info!(
            host = %metrics_config.statsd_host,
            port = metrics_config.statsd_port,
            "Sending metrics to statsd"
        );
    }

    Ok(TelemetryGuard {
        _sentry: sentry_guard,
    })
}

fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}
