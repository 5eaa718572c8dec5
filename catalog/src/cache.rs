// Session-scoped cache of resolved characters, keyed by canonical character URL.
// Entries are never invalidated. Without a capacity the cache grows for as long
// as its owner lives; with one, moka evicts the least recently used entries.
use crate::metrics_defs::{CHARACTER_CACHE_HIT, CHARACTER_CACHE_MISS};
use crate::types::Character;
use moka::sync::Cache;
use shared::counter;

pub struct CharacterCache {
    entries: Cache<String, Character>,
}

impl CharacterCache {
    pub fn new(capacity: Option<u64>) -> Self {
        let mut builder = Cache::builder();
        match capacity {
            Some(max) => builder = builder.max_capacity(max),
            None => tracing::warn!("Character cache has no capacity bound"),
        }

        CharacterCache {
            entries: builder.build(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Character> {
        let entry = self.entries.get(key);
        let metric_def = if entry.is_some() {
            CHARACTER_CACHE_HIT
        } else {
            CHARACTER_CACHE_MISS
        };
        counter!(metric_def).increment(1);
        entry
    }

    /// Re-inserting the same character under the same key is a no-op in effect.
    pub fn insert(&self, key: String, character: Character) {
        self.entries.insert(key, character);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CharacterCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{character, character_url};

    #[test]
    fn test_insert_and_get() {
        let cache = CharacterCache::default();
        assert!(cache.is_empty());
        assert!(cache.get(&character_url(1)).is_none());

        cache.insert(character_url(1), character(1));
        cache.insert(character_url(1), character(1));

        assert_eq!(cache.get(&character_url(1)), Some(character(1)));
        assert!(cache.contains(&character_url(1)));
        assert!(!cache.contains(&character_url(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_bound() {
        let cache = CharacterCache::new(Some(5));
        for id in 1..=50 {
            cache.insert(character_url(id), character(id));
        }
        assert!(cache.len() <= 5);
    }
}
