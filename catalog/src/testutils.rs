use crate::errors::CatalogError;
use crate::types::{
    Character, CharacterId, Endpoint, Episode, EpisodeId, EpisodePage, PageInfo,
};
use crate::upstream::Catalog;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

const API: &str = "https://rickandmortyapi.com/api";

pub fn character_json(id: CharacterId) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": format!("Character {id}"),
        "status": "Alive",
        "species": "Human",
        "type": "",
        "gender": "unknown",
        "origin": {"name": "Earth (C-137)", "url": format!("{API}/location/1")},
        "location": {"name": "Citadel of Ricks", "url": format!("{API}/location/3")},
        "image": format!("{API}/character/avatar/{id}.jpeg"),
        "episode": [format!("{API}/episode/1")],
        "url": format!("{API}/character/{id}"),
        "created": "2017-11-04T18:48:46.250Z",
    })
}

pub fn character(id: CharacterId) -> Character {
    serde_json::from_value(character_json(id)).unwrap()
}

pub fn episode_json(id: EpisodeId, character_ids: &[CharacterId]) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": format!("Episode {id}"),
        "air_date": "December 2, 2013",
        "episode": format!("S01E{id:02}"),
        "characters": character_ids.iter().map(|c| format!("{API}/character/{c}")).collect::<Vec<_>>(),
        "url": format!("{API}/episode/{id}"),
        "created": "2017-11-10T12:56:33.798Z",
    })
}

pub fn character_url(id: CharacterId) -> String {
    format!("{API}/character/{id}")
}

/// In-memory catalog that records every single-character fetch.
#[derive(Default)]
pub struct FakeCatalog {
    missing: HashSet<CharacterId>,
    failing: HashSet<CharacterId>,
    // Lower IDs answer later, so completion order differs from request order.
    inverse_latency: bool,
    // Character fetches block until this many are in flight at once.
    barrier: Option<Arc<Barrier>>,
    calls: Mutex<Vec<CharacterId>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing(mut self, ids: &[CharacterId]) -> Self {
        self.missing.extend(ids);
        self
    }

    pub fn with_failing(mut self, ids: &[CharacterId]) -> Self {
        self.failing.extend(ids);
        self
    }

    pub fn with_inverse_latency(mut self) -> Self {
        self.inverse_latency = true;
        self
    }

    pub fn with_barrier(mut self, in_flight: usize) -> Self {
        self.barrier = Some(Arc::new(Barrier::new(in_flight)));
        self
    }

    pub fn calls(&self) -> Vec<CharacterId> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn episodes(&self, page: u32) -> Result<EpisodePage, CatalogError> {
        if page > 3 {
            return Err(CatalogError::PageNotFound(page));
        }
        let first = (page as u64 - 1) * 20 + 1;
        Ok(EpisodePage {
            info: PageInfo {
                count: 51,
                pages: 3,
                next: (page < 3).then(|| format!("{API}/episode?page={}", page + 1)),
                prev: (page > 1).then(|| format!("{API}/episode?page={}", page - 1)),
            },
            results: (first..first + 2)
                .map(|id| serde_json::from_value(episode_json(id, &[1, 2])).unwrap())
                .collect(),
        })
    }

    async fn episode(&self, id: EpisodeId) -> Result<Episode, CatalogError> {
        if id > 51 {
            return Err(CatalogError::NotFound {
                endpoint: Endpoint::Episode,
                id,
            });
        }
        Ok(serde_json::from_value(episode_json(id, &[1, 2, 3])).unwrap())
    }

    async fn character(&self, id: CharacterId) -> Result<Character, CatalogError> {
        self.calls.lock().unwrap().push(id);

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        if self.inverse_latency {
            let delay = 30u64.saturating_sub(id.min(30));
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.missing.contains(&id) {
            return Err(CatalogError::NotFound {
                endpoint: Endpoint::Character,
                id,
            });
        }
        if self.failing.contains(&id) {
            return Err(CatalogError::Status {
                endpoint: Endpoint::Character,
                status: StatusCode::BAD_GATEWAY,
            });
        }
        Ok(character(id))
    }
}
