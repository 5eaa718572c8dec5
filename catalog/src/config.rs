use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BATCH_LIMIT: usize = 20;
const DEFAULT_UPSTREAM_URL: &str = "https://rickandmortyapi.com/api";
const DEFAULT_CHARACTER_BASE_URL: &str = "https://rickandmortyapi.com/api/character";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Batch limit cannot be 0")]
    InvalidBatchLimit,

    #[error("Request timeout cannot be 0")]
    InvalidTimeout,

    #[error("URL cannot be used as a base: {0}")]
    InvalidBaseUrl(Url),

    #[error("URL has no usable origin: {0}")]
    InvalidOrigin(Url),
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Upstream catalog API.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Upstream {
    pub base_url: Url,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Upstream {
    fn default() -> Self {
        Upstream {
            base_url: default_url(DEFAULT_UPSTREAM_URL),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Facade server configuration.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    #[serde(default)]
    pub upstream: Upstream,
    /// Maximum number of IDs accepted by one batch request.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Browser origins allowed to call the facade cross-origin, such as
    /// `http://localhost:4200`. Empty allows none.
    #[serde(default)]
    pub allowed_origins: Vec<Url>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        for origin in &self.allowed_origins {
            if !origin.origin().is_tuple() {
                return Err(ValidationError::InvalidOrigin(origin.clone()));
            }
        }
        validate_base(&self.upstream.base_url)?;

        if self.upstream.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.batch_limit == 0 {
            return Err(ValidationError::InvalidBatchLimit);
        }
        Ok(())
    }
}

/// Configuration of the cache-first client talking to the facade.
#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct ClientConfig {
    pub facade_url: Url,
    /// Prefix of canonical character URLs, used to key the cache.
    #[serde(default = "default_character_base_url")]
    pub character_base_url: Url,
    /// Must not exceed the batch limit of the facade.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Optional bound on cached characters. Unbounded when absent.
    #[serde(default)]
    pub cache_capacity: Option<u64>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(facade_url: Url) -> Self {
        ClientConfig {
            facade_url,
            character_base_url: default_character_base_url(),
            batch_limit: DEFAULT_BATCH_LIMIT,
            cache_capacity: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_base(&self.facade_url)?;
        validate_base(&self.character_base_url)?;

        if self.batch_limit == 0 {
            return Err(ValidationError::InvalidBatchLimit);
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

fn validate_base(url: &Url) -> Result<(), ValidationError> {
    if url.cannot_be_a_base() {
        return Err(ValidationError::InvalidBaseUrl(url.clone()));
    }
    Ok(())
}

fn default_url(raw: &str) -> Url {
    Url::parse(raw).expect("default URL is valid")
}

fn default_character_base_url() -> Url {
    default_url(DEFAULT_CHARACTER_BASE_URL)
}

fn default_batch_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}

fn default_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.listener, Listener::default());
        assert_eq!(config.upstream.base_url.as_str(), "https://rickandmortyapi.com/api");
        assert_eq!(config.batch_limit, 20);
        assert!(config.allowed_origins.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
listener:
    host: "0.0.0.0"
    port: 8080
upstream:
    base_url: "http://127.0.0.1:9000/api"
    timeout_secs: 3
batch_limit: 5
allowed_origins:
    - "http://localhost:4200"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.allowed_origins[0].origin().ascii_serialization(), "http://localhost:4200");
        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.upstream.timeout_secs, 3);
        assert_eq!(config.batch_limit, 5);
    }

    #[test]
    fn test_validation() {
        let mut config: Config = serde_yaml::from_str("{}").unwrap();
        config.listener.port = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));

        config.listener.port = 5000;
        config.batch_limit = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidBatchLimit));

        config.batch_limit = 20;
        config.upstream.base_url = Url::parse("mailto:rick@citadel").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidBaseUrl(_))
        ));

        config.upstream = Upstream::default();
        config.allowed_origins = vec![Url::parse("file:///srv/ui").unwrap()];
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidOrigin(_))
        ));
    }

    #[test]
    fn test_client_config() {
        let yaml = r#"
facade_url: "http://127.0.0.1:5000"
cache_capacity: 500
"#;
        let config: ClientConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.batch_limit, DEFAULT_BATCH_LIMIT);
        assert_eq!(config.cache_capacity, Some(500));
        assert_eq!(
            config.character_base_url.as_str(),
            "https://rickandmortyapi.com/api/character"
        );
        assert!(config.validate().is_ok());

        // URL fields are checked while parsing
        assert!(serde_yaml::from_str::<ClientConfig>("facade_url: not-a-url").is_err());
    }
}
