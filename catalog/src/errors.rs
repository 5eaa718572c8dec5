use crate::types::{CharacterId, Endpoint};
use reqwest::StatusCode;

/// Errors returned by the upstream catalog fetch capability.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("{endpoint} {id} not found")]
    NotFound { endpoint: Endpoint, id: u64 },
    #[error("episode page {0} not found")]
    PageNotFound(u32),
    #[error("upstream returned {status} for {endpoint}")]
    Status {
        endpoint: Endpoint,
        status: StatusCode,
    },
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Outcome kinds of character resolution, shared by the resolver and the client.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// Malformed or out-of-policy input. Never reaches the network.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The upstream confirmed that the character does not exist.
    #[error("character {0} not found")]
    NotFound(CharacterId),

    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    /// A requested reference has no entry after a successful fetch cycle.
    #[error("inconsistent resolution state: {0}")]
    Inconsistency(String),
}

impl From<CatalogError> for ResolveError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound {
                endpoint: Endpoint::Character,
                id,
            } => ResolveError::NotFound(id),
            other => ResolveError::UpstreamFailure(other.to_string()),
        }
    }
}
