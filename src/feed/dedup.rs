//! Story identity and batch deduplication.
//!
//! A story is identified by `(feed_id, guid)`. Merging a batch never updates
//! a stored story: new guids are inserted, everything else is skipped.

use std::collections::HashSet;

use tracing::debug;

use super::repository::StoryRepository;
use super::types::NormalizedStory;
use crate::db::DbPool;
use crate::{NuntiaError, Result};

/// Select the stories of `batch` that should be inserted.
///
/// Drops guids already in `existing` and later repeats of a guid within the
/// batch; the first occurrence wins.
pub fn plan_merge(batch: Vec<NormalizedStory>, existing: &HashSet<String>) -> Vec<NormalizedStory> {
    let mut seen: HashSet<String> = HashSet::with_capacity(batch.len());
    batch
        .into_iter()
        .filter(|story| !existing.contains(&story.guid) && seen.insert(story.guid.clone()))
        .collect()
}

/// Merge a normalized batch into the store for one feed.
///
/// Returns the number of stories actually inserted. Any store failure is
/// reported as `StoreWriteFailure`.
pub async fn merge_stories(
    pool: &DbPool,
    feed_id: &str,
    batch: Vec<NormalizedStory>,
) -> Result<u64> {
    let repo = StoryRepository::new(pool);

    let existing = repo
        .list_existing_guids(feed_id)
        .await
        .map_err(|e| store_failure(feed_id, e))?;
    let batch_size = batch.len();
    let planned = plan_merge(batch, &existing);

    if planned.is_empty() {
        debug!(feed_id, batch_size, "no new stories");
        return Ok(0);
    }

    let inserted = repo
        .insert_skipping_duplicates(feed_id, &planned)
        .await
        .map_err(|e| store_failure(feed_id, e))?;

    debug!(feed_id, batch_size, planned = planned.len(), inserted, "merged stories");
    Ok(inserted)
}

fn store_failure(feed_id: &str, e: NuntiaError) -> NuntiaError {
    NuntiaError::StoreWriteFailure(format!("feed {feed_id}: {e}"))
}
