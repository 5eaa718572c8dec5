use crate::config::Upstream as UpstreamConfig;
use crate::errors::CatalogError;
use crate::metrics_defs::{UPSTREAM_ERRORS, UPSTREAM_REQUEST_DURATION};
use crate::types::{Character, CharacterId, Endpoint, Episode, EpisodeId, EpisodePage};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use shared::{counter, histogram};
use std::time::{Duration, Instant};

/// The catalog fetch capability: single entities by ID and episode listings by page.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn episodes(&self, page: u32) -> Result<EpisodePage, CatalogError>;

    async fn episode(&self, id: EpisodeId) -> Result<Episode, CatalogError>;

    async fn character(&self, id: CharacterId) -> Result<Character, CatalogError>;
}

/// Catalog backed by the public REST API.
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(config: &UpstreamConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(HttpCatalog {
            client,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, CatalogError> {
        let full_url = format!("{}/{}", self.base_url, path);
        Url::parse(&full_url).map_err(|e| CatalogError::InvalidUrl(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        url: Url,
        not_found: CatalogError,
    ) -> Result<T, CatalogError> {
        let start = Instant::now();
        let result = self.send(endpoint, url, not_found).await;

        histogram!(UPSTREAM_REQUEST_DURATION, "endpoint" => endpoint.as_str())
            .record(start.elapsed().as_secs_f64());
        if result.is_err() {
            counter!(UPSTREAM_ERRORS, "endpoint" => endpoint.as_str()).increment(1);
        }

        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        url: Url,
        not_found: CatalogError,
    ) -> Result<T, CatalogError> {
        tracing::debug!(%url, "Requesting upstream catalog");
        let response = self.client.get(url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response.json::<T>().await?),
            StatusCode::NOT_FOUND => Err(not_found),
            status => Err(CatalogError::Status { endpoint, status }),
        }
    }
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn episodes(&self, page: u32) -> Result<EpisodePage, CatalogError> {
        let mut url = self.url(Endpoint::Episode.as_str())?;
        url.query_pairs_mut().append_pair("page", &page.to_string());

        self.get(Endpoint::Episode, url, CatalogError::PageNotFound(page))
            .await
    }

    async fn episode(&self, id: EpisodeId) -> Result<Episode, CatalogError> {
        let url = self.url(&format!("{}/{id}", Endpoint::Episode))?;
        let not_found = CatalogError::NotFound {
            endpoint: Endpoint::Episode,
            id,
        };

        self.get(Endpoint::Episode, url, not_found).await
    }

    async fn character(&self, id: CharacterId) -> Result<Character, CatalogError> {
        let url = self.url(&format!("{}/{id}", Endpoint::Character))?;
        let not_found = CatalogError::NotFound {
            endpoint: Endpoint::Character,
            id,
        };

        self.get(Endpoint::Character, url, not_found).await
    }
}
