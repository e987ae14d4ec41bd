use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::article::Article;
use crate::error::PipelineResult;
use crate::storage::TitleStore;

/// Articles processed together into one video.
pub type Batch = Vec<Article>;

/// Admission control over the processed-title log.
///
/// Walks the ranked candidates in contiguous, non-overlapping slices of
/// `batch_size` and accepts the first slice whose titles were never used.
/// A rejected slice is abandoned as a whole for this run; its fresh members
/// are not retried on their own.
pub struct BatchSelector {
    store: Arc<dyn TitleStore>,
}

impl BatchSelector {
    pub fn new(store: Arc<dyn TitleStore>) -> Self {
        Self { store }
    }

    /// Select and persist the next admissible batch.
    ///
    /// Returns `Ok(None)` when every slice collides (nothing is written then).
    /// Storage failures propagate so the run never proceeds on an unrecorded batch.
    pub async fn select_next_batch(
        &self,
        candidates: &[Article],
        batch_size: usize,
    ) -> PipelineResult<Option<Batch>> {
        if batch_size == 0 {
            warn!("batch: batch size is zero, nothing to select");
            return Ok(None);
        }

        let mut i = 0;
        while i + batch_size <= candidates.len() {
            let slice = &candidates[i..i + batch_size];
            let titles: Vec<String> = slice.iter().map(|a| a.title.clone()).collect();

            // The conditional insert is the authority; this only skips known slices cheaply.
            if self.store.contains_any(&titles).await? {
                debug!(offset = i, "batch: slice already processed, advancing");
            } else if self.store.insert_if_absent(slice).await? {
                info!(offset = i, titles = ?titles, "batch: accepted");
                return Ok(Some(slice.to_vec()));
            } else {
                debug!(offset = i, "batch: slice taken by a concurrent run, advancing");
            }
            i += batch_size;
        }

        info!(candidates = candidates.len(), "batch: candidates exhausted, no new batch");
        Ok(None)
    }
}
