use crate::config::Config;
use crate::errors::{CatalogError, ResolveError};
use crate::reference::{parse_id_list, require_positive};
use crate::resolver::BatchResolver;
use crate::types::{Character, CharacterId, Episode, EpisodeId, EpisodePage};
use crate::upstream::{Catalog, HttpCatalog};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode, header::InvalidHeaderValue},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use url::Url;

#[derive(thiserror::Error, Debug)]
pub enum FacadeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("catalog error: {0}")]
    CatalogError(#[from] CatalogError),
    #[error("invalid CORS origin: {0}")]
    InvalidOrigin(#[from] InvalidHeaderValue),
}

/// Binds the configured listener and serves the facade until the process stops.
pub async fn serve(config: Config) -> Result<(), FacadeError> {
    let catalog = Arc::new(HttpCatalog::new(&config.upstream)?);
    let app = router(catalog, config.batch_limit).layer(cors(&config.allowed_origins)?);
    let addr = format!("{}:{}", config.listener.host, config.listener.port);

    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, app).await
}

pub async fn serve_on(listener: TcpListener, app: Router) -> Result<(), FacadeError> {
    tracing::info!(addr = %listener.local_addr()?, "Facade listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Cross-origin policy for the browser UI: read-only requests from the listed
/// origins, any request header.
pub fn cors(allowed_origins: &[Url]) -> Result<CorsLayer, FacadeError> {
    let origins = allowed_origins
        .iter()
        .map(|url| HeaderValue::from_str(&url.origin().ascii_serialization()))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(origins = ?origins, "Allowing cross-origin requests");

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
        .allow_headers(Any))
}

pub fn router(catalog: Arc<dyn Catalog>, batch_limit: usize) -> Router {
    let state = AppState {
        resolver: BatchResolver::new(catalog.clone(), batch_limit),
        catalog,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/episodes", get(list_episodes))
        .route("/api/episodes/{id}", get(get_episode))
        .route("/api/characters/batch", get(get_characters))
        .route("/api/characters/{id}", get(get_character))
        .with_state(state)
}

#[derive(Clone)]
struct AppState {
    catalog: Arc<dyn Catalog>,
    resolver: BatchResolver,
}

/// JSON body of every non-success response.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiErrorBody {
    pub error_message: String,
    /// ID of the missing entity, on not-found responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, id) = match &self {
            ApiError::Resolve(ResolveError::InvalidArgument(_)) => (StatusCode::BAD_REQUEST, None),
            ApiError::Resolve(ResolveError::NotFound(id)) => (StatusCode::NOT_FOUND, Some(*id)),
            ApiError::Resolve(ResolveError::UpstreamFailure(_)) => (StatusCode::BAD_GATEWAY, None),
            ApiError::Resolve(ResolveError::Inconsistency(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            ApiError::Catalog(CatalogError::NotFound { id, .. }) => {
                (StatusCode::NOT_FOUND, Some(*id))
            }
            ApiError::Catalog(CatalogError::PageNotFound(_)) => (StatusCode::NOT_FOUND, None),
            ApiError::Catalog(CatalogError::Status { .. } | CatalogError::ReqwestError(_)) => {
                (StatusCode::BAD_GATEWAY, None)
            }
            ApiError::Catalog(CatalogError::InvalidUrl(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %self, "Request failed");
        } else {
            tracing::warn!(%status, error = %self, "Request rejected");
        }

        let body = Json(ApiErrorBody {
            error_message: self.to_string(),
            id,
        });

        (status, body).into_response()
    }
}

#[derive(Deserialize, Debug)]
struct PageParams {
    page: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct BatchParams {
    ids: Option<String>,
}

async fn health() -> &'static str {
    "ok\n"
}

async fn list_episodes(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<EpisodePage>, ApiError> {
    let page = params.page.unwrap_or(1);
    tracing::info!(page, "Listing episodes");

    if page == 0 {
        return Err(ResolveError::InvalidArgument("page must be greater than 0".into()).into());
    }

    let episodes = state.catalog.episodes(page).await?;
    if episodes.results.is_empty() {
        tracing::info!(page, "Episode page is empty");
    }
    Ok(Json(episodes))
}

async fn get_episode(
    State(state): State<AppState>,
    Path(id): Path<EpisodeId>,
) -> Result<Json<Episode>, ApiError> {
    tracing::info!(id, "Fetching episode");
    require_positive(id)?;

    Ok(Json(state.catalog.episode(id).await?))
}

async fn get_character(
    State(state): State<AppState>,
    Path(id): Path<CharacterId>,
) -> Result<Json<Character>, ApiError> {
    tracing::info!(id, "Fetching character");
    require_positive(id)?;

    Ok(Json(state.catalog.character(id).await?))
}

async fn get_characters(
    State(state): State<AppState>,
    Query(params): Query<BatchParams>,
) -> Result<Json<Vec<Character>>, ApiError> {
    let raw = params.ids.unwrap_or_default();
    tracing::info!(ids = %raw, "Fetching characters");

    let ids = parse_id_list(&raw)?;
    Ok(Json(state.resolver.resolve_characters(&ids).await?))
}
