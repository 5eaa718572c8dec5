use catalog::config::{ClientConfig, Config as FacadeConfig, ValidationError};
use serde::Deserialize;
use std::fs::File;

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
    pub sentry_dsn: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
            sentry_dsn: None,
        }
    }
}

fn default_level() -> String {
    "info".into()
}

#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub gateway: Option<FacadeConfig>,
    pub client: Option<ClientConfig>,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(gateway) = &self.gateway {
            gateway.validate()?;
        }
        if let Some(client) = &self.client {
            client.validate()?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    ValidationError(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn full_config() {
        let yaml = r#"
            gateway:
                listener:
                    host: 0.0.0.0
                    port: 8080
                upstream:
                    base_url: https://rickandmortyapi.com/api
                batch_limit: 20
            client:
                facade_url: http://127.0.0.1:8080
                cache_capacity: 1000
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                level: debug
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");
        config.validate().expect("valid config");

        let gateway = config.gateway.expect("gateway config");
        assert_eq!(gateway.listener.port, 8080);
        assert_eq!(gateway.batch_limit, 20);

        let client = config.client.expect("client config");
        assert_eq!(client.cache_capacity, Some(1000));

        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);

        let logging = config.common.logging.expect("logging config");
        assert_eq!(logging.level, "debug");
        assert!(logging.sentry_dsn.is_none());
    }

    #[test]
    fn invalid_config() {
        let tmp = write_tmp_file(
            r#"
            gateway:
                batch_limit: 0
            "#,
        );
        let config = Config::from_file(tmp.path()).expect("load config");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(ValidationError::InvalidBatchLimit))
        ));
    }

    #[test]
    fn missing_file() {
        let result = Config::from_file(std::path::Path::new("/nonexistent/gateway.yaml"));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
