//! Server-side batch resolution of characters.
//!
//! A batch of IDs is fanned out as one single-character upstream request per ID.
//! All requests are spawned at once and joined; results are placed back by the
//! index of the ID they were issued for, so the output order never depends on
//! completion order.

use crate::errors::ResolveError;
use crate::metrics_defs::FANOUT_BATCH_SIZE;
use crate::reference::require_positive;
use crate::types::{Character, CharacterId};
use crate::upstream::Catalog;
use shared::histogram;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Result of resolving one ID of a batch.
pub type Outcome = Result<Character, ResolveError>;

#[derive(Clone)]
pub struct BatchResolver {
    catalog: Arc<dyn Catalog>,
    batch_limit: usize,
}

impl BatchResolver {
    pub fn new(catalog: Arc<dyn Catalog>, batch_limit: usize) -> Self {
        BatchResolver {
            catalog,
            batch_limit,
        }
    }

    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Resolves every ID, aligned index-for-index with `ids`.
    ///
    /// Duplicated IDs are fetched once per occurrence. The batch fails as a whole
    /// if any single fetch fails.
    pub async fn resolve_characters(
        &self,
        ids: &[CharacterId],
    ) -> Result<Vec<Character>, ResolveError> {
        let outcomes = self.resolve_each(ids).await?;
        fail_whole_batch(ids, outcomes)
    }

    /// Resolves every ID and reports the outcome of each one separately.
    ///
    /// Input validation still applies to the batch as a whole.
    pub async fn resolve_each(&self, ids: &[CharacterId]) -> Result<Vec<Outcome>, ResolveError> {
        self.validate(ids)?;
        tracing::info!(count = ids.len(), "Resolving characters");

        Ok(self.fan_out(ids).await)
    }

    fn validate(&self, ids: &[CharacterId]) -> Result<(), ResolveError> {
        if ids.is_empty() {
            return Err(ResolveError::InvalidArgument(
                "the ID list cannot be empty".into(),
            ));
        }
        if ids.len() > self.batch_limit {
            return Err(ResolveError::InvalidArgument(format!(
                "cannot request more than {} characters at once, got {}",
                self.batch_limit,
                ids.len()
            )));
        }
        ids.iter().try_for_each(|&id| require_positive(id))
    }

    async fn fan_out(&self, ids: &[CharacterId]) -> Vec<Outcome> {
        histogram!(FANOUT_BATCH_SIZE).record(ids.len() as f64);

        let mut join_set = JoinSet::new();
        let mut task_index = HashMap::new();

        for (index, &id) in ids.iter().enumerate() {
            let catalog = self.catalog.clone();
            let abort_handle = join_set.spawn(async move {
                let outcome = catalog.character(id).await.map_err(ResolveError::from);
                (index, outcome)
            });
            task_index.insert(abort_handle.id(), index);
        }

        let mut outcomes: Vec<Option<Outcome>> = vec![None; ids.len()];

        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((_, (index, outcome))) => outcomes[index] = Some(outcome),
                Err(e) => {
                    tracing::error!("Fan-out task failed: {e}");
                    if let Some(&index) = task_index.get(&e.id()) {
                        outcomes[index] = Some(Err(ResolveError::UpstreamFailure(format!(
                            "fetch task for character {} failed: {e}",
                            ids[index]
                        ))));
                    }
                }
            }
        }

        outcomes
            .into_iter()
            .zip(ids)
            .map(|(outcome, id)| {
                outcome.unwrap_or_else(|| {
                    Err(ResolveError::Inconsistency(format!(
                        "no outcome recorded for character {id}"
                    )))
                })
            })
            .collect()
    }
}

/// Failure policy of `resolve_characters`: the first failed item, in request
/// order, fails the whole batch.
fn fail_whole_batch(
    ids: &[CharacterId],
    outcomes: Vec<Outcome>,
) -> Result<Vec<Character>, ResolveError> {
    outcomes
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| {
            outcome.inspect_err(|e| match e {
                ResolveError::NotFound(_) => {
                    tracing::warn!(index, id = ids[index], "Character not found, failing batch")
                }
                _ => tracing::error!(index, id = ids[index], error = %e, "Character fetch failed, failing batch"),
            })
        })
        .collect()
}
