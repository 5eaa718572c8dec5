//! Parsing of character references and ID lists.
//!
//! A character can be referred to by its upstream URL
//! (`https://rickandmortyapi.com/api/character/42`) or by its bare numeric ID.
//! Both forms denote the same entity and map to the same canonical URL.

use crate::errors::ResolveError;
use crate::types::CharacterId;
use std::fmt;
use std::str::FromStr;
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CharacterRef {
    id: CharacterId,
}

impl CharacterRef {
    pub fn new(id: CharacterId) -> Result<Self, ResolveError> {
        require_positive(id)?;
        Ok(CharacterRef { id })
    }

    /// Parses a reference given either as a URL or as a numeric ID. URLs must end
    /// in `character/{id}`; the host is not checked here, see
    /// [`ReferenceBase::parse`].
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ResolveError::InvalidArgument("empty reference".into()));
        }

        let segment = if raw.contains('/') {
            let url = Url::parse(raw).map_err(|e| {
                ResolveError::InvalidArgument(format!("invalid reference '{raw}': {e}"))
            })?;
            let segments: Vec<&str> = url
                .path_segments()
                .map(|segments| segments.filter(|s| !s.is_empty()).collect())
                .unwrap_or_default();
            match segments.as_slice() {
                [.., "character", id] => id.to_string(),
                _ => {
                    return Err(ResolveError::InvalidArgument(format!(
                        "reference '{raw}' is not a character URL"
                    )));
                }
            }
        } else {
            raw.to_string()
        };

        let id = Some(segment.as_str())
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<CharacterId>().ok())
            .ok_or_else(|| {
                ResolveError::InvalidArgument(format!(
                    "reference '{raw}' does not end in a numeric ID"
                ))
            })?;

        CharacterRef::new(id)
    }

    pub fn id(&self) -> CharacterId {
        self.id
    }
}

impl FromStr for CharacterRef {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CharacterRef::parse(s)
    }
}

impl fmt::Display for CharacterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Builds canonical character URLs, which are used as cache keys.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceBase {
    base: String,
}

impl ReferenceBase {
    pub fn new(character_base_url: &Url) -> Self {
        ReferenceBase {
            base: character_base_url.as_str().trim_end_matches('/').to_string(),
        }
    }

    pub fn canonical(&self, id: CharacterId) -> String {
        format!("{}/{}", self.base, id)
    }

    /// Parses a reference, additionally requiring URLs to be the canonical URL
    /// of the character under this base. A trailing slash is tolerated.
    pub fn parse(&self, raw: &str) -> Result<CharacterRef, ResolveError> {
        let reference = CharacterRef::parse(raw)?;

        let raw = raw.trim();
        if raw.contains('/') {
            let url = Url::parse(raw).map_err(|e| {
                ResolveError::InvalidArgument(format!("invalid reference '{raw}': {e}"))
            })?;
            if url.as_str().trim_end_matches('/') != self.canonical(reference.id()) {
                return Err(ResolveError::InvalidArgument(format!(
                    "reference '{raw}' is not a character of {}",
                    self.base
                )));
            }
        }
        Ok(reference)
    }
}

pub fn require_positive(id: u64) -> Result<(), ResolveError> {
    if id < 1 {
        return Err(ResolveError::InvalidArgument(format!(
            "IDs must be greater than 0, got {id}"
        )));
    }
    Ok(())
}

/// Parses a comma-separated list of positive integers such as `1,2,3`.
pub fn parse_id_list(raw: &str) -> Result<Vec<CharacterId>, ResolveError> {
    if raw.trim().is_empty() {
        return Err(ResolveError::InvalidArgument("the ID list is required".into()));
    }

    raw.split(',')
        .map(|part| {
            let part = part.trim();
            let invalid = || {
                ResolveError::InvalidArgument(format!(
                    "invalid ID '{part}', use comma-separated numbers"
                ))
            };
            // `u64::from_str` would also take a leading `+`
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let id = part.parse::<CharacterId>().map_err(|_| invalid())?;
            require_positive(id)?;
            Ok(id)
        })
        .collect()
}
