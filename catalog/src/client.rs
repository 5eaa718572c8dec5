//! Client side of character resolution.
//!
//! `CharacterClient` answers what it can from its own cache and sends the rest,
//! deduplicated and split into chunks no larger than the batch limit, to a
//! `BatchFetch` transport. The transport is either the facade over HTTP
//! (`FacadeClient`) or a `BatchResolver` running in the same process.

use crate::api::ApiErrorBody;
use crate::cache::CharacterCache;
use crate::config::ClientConfig;
use crate::errors::ResolveError;
use crate::reference::{CharacterRef, ReferenceBase};
use crate::resolver::BatchResolver;
use crate::types::{Character, CharacterId, Episode, EpisodeId, EpisodePage};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("facade returned {status}: {message}")]
    Facade { status: StatusCode, message: String },
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolves one batch of character IDs, aligned with the input.
#[async_trait]
pub trait BatchFetch: Send + Sync {
    async fn fetch_batch(&self, ids: &[CharacterId]) -> Result<Vec<Character>, ResolveError>;
}

#[async_trait]
impl BatchFetch for BatchResolver {
    async fn fetch_batch(&self, ids: &[CharacterId]) -> Result<Vec<Character>, ResolveError> {
        self.resolve_characters(ids).await
    }
}

/// HTTP client for the facade API.
#[derive(Clone)]
pub struct FacadeClient {
    client: reqwest::Client,
    base_url: String,
}

impl FacadeClient {
    pub fn new(facade_url: &Url, timeout_secs: u64) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(FacadeClient {
            client,
            base_url: facade_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))
    }

    pub async fn episodes(&self, page: u32) -> Result<EpisodePage, ClientError> {
        let mut url = self.url("api/episodes")?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        self.get_json(url).await
    }

    pub async fn episode(&self, id: EpisodeId) -> Result<Episode, ClientError> {
        self.get_json(self.url(&format!("api/episodes/{id}"))?).await
    }

    pub async fn character(&self, id: CharacterId) -> Result<Character, ClientError> {
        self.get_json(self.url(&format!("api/characters/{id}"))?)
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = read_error_body(response).await;
        Err(ClientError::Facade {
            status,
            message: body.error_message,
        })
    }
}

#[async_trait]
impl BatchFetch for FacadeClient {
    async fn fetch_batch(&self, ids: &[CharacterId]) -> Result<Vec<Character>, ResolveError> {
        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut url = self
            .url("api/characters/batch")
            .map_err(|e| ResolveError::UpstreamFailure(e.to_string()))?;
        url.query_pairs_mut().append_pair("ids", &joined);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResolveError::UpstreamFailure(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::OK {
            return response
                .json::<Vec<Character>>()
                .await
                .map_err(|e| ResolveError::UpstreamFailure(e.to_string()));
        }

        let body = read_error_body(response).await;
        Err(match (status, body.id) {
            (StatusCode::BAD_REQUEST, _) => ResolveError::InvalidArgument(body.error_message),
            (StatusCode::NOT_FOUND, Some(id)) => ResolveError::NotFound(id),
            _ => ResolveError::UpstreamFailure(format!(
                "facade returned {status}: {}",
                body.error_message
            )),
        })
    }
}

async fn read_error_body(response: reqwest::Response) -> ApiErrorBody {
    let status = response.status();
    match response.json::<ApiErrorBody>().await {
        Ok(body) => body,
        Err(_) => ApiErrorBody {
            error_message: status.to_string(),
            id: None,
        },
    }
}

/// Cache-first batching client. One instance owns one cache; construct a new
/// client per user session.
pub struct CharacterClient {
    transport: Arc<dyn BatchFetch>,
    cache: CharacterCache,
    references: ReferenceBase,
    batch_limit: usize,
}

impl CharacterClient {
    pub fn new(
        transport: Arc<dyn BatchFetch>,
        references: ReferenceBase,
        batch_limit: usize,
        cache: CharacterCache,
    ) -> Self {
        CharacterClient {
            transport,
            cache,
            references,
            batch_limit: batch_limit.max(1),
        }
    }

    /// Client talking to the facade over HTTP.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let facade = FacadeClient::new(&config.facade_url, config.timeout_secs)?;
        Ok(CharacterClient::with_facade(facade, config))
    }

    /// Like `from_config`, reusing the connection pool of an existing facade
    /// client. `facade_url` and `timeout_secs` of `config` are not used.
    pub fn with_facade(facade: FacadeClient, config: &ClientConfig) -> Self {
        CharacterClient::new(
            Arc::new(facade),
            ReferenceBase::new(&config.character_base_url),
            config.batch_limit,
            CharacterCache::new(config.cache_capacity),
        )
    }

    /// Client calling a resolver in the same process.
    pub fn in_process(resolver: BatchResolver, references: ReferenceBase) -> Self {
        let batch_limit = resolver.batch_limit();
        CharacterClient::new(
            Arc::new(resolver),
            references,
            batch_limit,
            CharacterCache::default(),
        )
    }

    pub fn cache(&self) -> &CharacterCache {
        &self.cache
    }

    pub fn canonical(&self, reference: &CharacterRef) -> String {
        self.references.canonical(reference.id())
    }

    /// Resolves references given as character URLs or numeric IDs.
    ///
    /// Unparseable references, and URLs that are not under the configured
    /// character base, fail the whole request before any network access.
    pub async fn resolve_by_reference<S: AsRef<str>>(
        &self,
        references: &[S],
    ) -> Result<Vec<Character>, ResolveError> {
        let parsed = references
            .iter()
            .map(|r| self.references.parse(r.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        self.resolve(&parsed).await
    }

    /// Resolves references in order. Each distinct reference is fetched at most
    /// once over the lifetime of this client.
    pub async fn resolve(
        &self,
        references: &[CharacterRef],
    ) -> Result<Vec<Character>, ResolveError> {
        let mut resolved: HashMap<CharacterId, Character> = HashMap::new();
        let mut seen = HashSet::new();
        let mut missing = Vec::new();

        for reference in references {
            let id = reference.id();
            if !seen.insert(id) {
                continue;
            }
            match self.cache.get(&self.canonical(reference)) {
                Some(character) => {
                    resolved.insert(id, character);
                }
                None => missing.push(id),
            }
        }

        tracing::debug!(
            requested = references.len(),
            cached = resolved.len(),
            missing = missing.len(),
            "Resolving character references"
        );

        if !missing.is_empty() {
            self.fetch_missing(&missing, &mut resolved).await?;
        }

        references
            .iter()
            .map(|reference| {
                resolved.get(&reference.id()).cloned().ok_or_else(|| {
                    ResolveError::Inconsistency(format!(
                        "no character for {} after fetching",
                        self.canonical(reference)
                    ))
                })
            })
            .collect()
    }

    /// Fetches all chunks concurrently and merges them into the cache once every
    /// chunk has finished. A failed chunk contributes nothing; chunks that
    /// succeeded are cached even when the request as a whole fails.
    async fn fetch_missing(
        &self,
        missing: &[CharacterId],
        resolved: &mut HashMap<CharacterId, Character>,
    ) -> Result<(), ResolveError> {
        let mut join_set = JoinSet::new();

        for (chunk_index, chunk) in missing.chunks(self.batch_limit).enumerate() {
            let transport = self.transport.clone();
            let chunk = chunk.to_vec();
            join_set.spawn(async move {
                let result = transport.fetch_batch(&chunk).await;
                (chunk_index, result)
            });
        }

        let mut fetched = Vec::new();
        let mut first_error: Option<(usize, ResolveError)> = None;
        let mut record_error = |chunk_index: usize, err: ResolveError| {
            if first_error.as_ref().is_none_or(|(i, _)| chunk_index < *i) {
                first_error = Some((chunk_index, err));
            }
        };

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(characters))) => fetched.push(characters),
                Ok((chunk_index, Err(e))) => {
                    tracing::error!(chunk_index, error = %e, "Character chunk failed");
                    record_error(chunk_index, e);
                }
                Err(e) => {
                    tracing::error!("Character chunk task failed: {e}");
                    record_error(usize::MAX, ResolveError::UpstreamFailure(e.to_string()));
                }
            }
        }

        for character in fetched.into_iter().flatten() {
            self.cache
                .insert(self.references.canonical(character.id), character.clone());
            resolved.insert(character.id, character);
        }

        match first_error {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }
}
