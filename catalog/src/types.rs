use serde::{Deserialize, Serialize};
use std::fmt;

pub type CharacterId = u64;
pub type EpisodeId = u64;

/// Upstream collection an entity belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Episode,
    Character,
}

impl Endpoint {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Episode => "episode",
            Endpoint::Character => "character",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub status: String,
    pub species: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub gender: String,
    pub origin: Place,
    pub location: Place,
    pub image: String,
    /// URLs of the episodes the character appears in.
    pub episode: Vec<String>,
    pub url: String,
    pub created: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub name: String,
    pub air_date: String,
    /// Season and episode code, e.g. `S01E01`.
    pub episode: String,
    /// URLs of the characters appearing in the episode.
    pub characters: Vec<String>,
    pub url: String,
    pub created: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub count: u32,
    pub pages: u32,
    pub next: Option<String>,
    pub prev: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodePage {
    pub info: PageInfo,
    pub results: Vec<Episode>,
}
