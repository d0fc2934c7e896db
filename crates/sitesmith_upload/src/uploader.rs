use std::{sync::Arc, time::Duration};

use futures::{StreamExt, TryStreamExt};
use sitesmith_cas::{Block, Cid};

use crate::{
    batch::{split_into_batches, BatchLimits, UploadBatch},
    reporter::Reporter,
    store::{BlockStore, ProbeError, PutOutcome, StoreError},
};

/// The default number of existence checks that run at the same time.
pub const DEFAULT_PROBE_CONCURRENCY: usize = 50;

/// The default delay between the start of two consecutive existence checks.
pub const DEFAULT_PROBE_THROTTLE: Duration = Duration::from_millis(25);

/// An error that aborts an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// A block does not fit in a batch on its own.
    #[error("block {cid} is {size} bytes, which exceeds the batch limit of {limit} bytes")]
    BlockTooLarge {
        /// The oversized block.
        cid: Cid,
        /// The size of the block.
        size: usize,
        /// The maximum size of a batch.
        limit: usize,
    },

    /// Whether a block is present could not be determined.
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// A block could not be written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What an upload did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// The number of blocks that were handed to the uploader.
    pub total: usize,
    /// The number of blocks the store already held.
    pub present: usize,
    /// The number of blocks the store accepted.
    pub written: usize,
    /// The number of blocks whose write was reported as already applied.
    pub already_applied: usize,
    /// The number of batches the missing blocks were split into.
    pub batches: usize,
}

/// Makes sure that every block of a tree is present in a [`BlockStore`], writing only the blocks
/// the store does not hold yet.
///
/// Existence checks run concurrently, but writes are strictly sequential: batch after batch and
/// block after block within a batch.
#[derive(Clone)]
pub struct DeduplicatingUploader {
    store: Arc<dyn BlockStore>,
    limits: BatchLimits,
    probe_concurrency: usize,
    probe_throttle: Duration,
    reporter: Option<Arc<dyn Reporter>>,
}

impl std::fmt::Debug for DeduplicatingUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeduplicatingUploader")
            .field("limits", &self.limits)
            .field("probe_concurrency", &self.probe_concurrency)
            .field("probe_throttle", &self.probe_throttle)
            .finish_non_exhaustive()
    }
}

impl DeduplicatingUploader {
    /// Constructs an uploader with the default limits.
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self {
            store,
            limits: BatchLimits::default(),
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            probe_throttle: DEFAULT_PROBE_THROTTLE,
            reporter: None,
        }
    }

    /// Sets the bounds of a batch.
    pub fn with_batch_limits(self, limits: BatchLimits) -> Self {
        Self { limits, ..self }
    }

    /// Sets how many existence checks may run at the same time.
    pub fn with_probe_concurrency(self, probe_concurrency: usize) -> Self {
        Self {
            probe_concurrency: probe_concurrency.max(1),
            ..self
        }
    }

    /// Sets the delay between the start of two consecutive existence checks.
    pub fn with_probe_throttle(self, probe_throttle: Duration) -> Self {
        Self {
            probe_throttle,
            ..self
        }
    }

    /// Reports progress to `reporter`.
    pub fn with_reporter(self, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            reporter: Some(reporter),
            ..self
        }
    }

    /// Uploads every block of `blocks` that the store does not hold yet.
    ///
    /// Nothing is written unless every existence check succeeded and every missing block fits in
    /// a batch. Blocks the store already holds are never size checked. The first failed write
    /// aborts the upload.
    pub async fn upload(&self, blocks: &[Block]) -> Result<UploadSummary, UploadError> {
        let present = self.probe(blocks).await?;
        let missing = blocks
            .iter()
            .zip(&present)
            .filter(|(_, present)| !**present)
            .map(|(block, _)| block.clone());
        let batches = split_into_batches(missing, self.limits)?;

        let mut summary = UploadSummary {
            total: blocks.len(),
            present: present.iter().filter(|present| **present).count(),
            batches: batches.len(),
            ..UploadSummary::default()
        };
        self.write(&batches, &mut summary).await?;
        Ok(summary)
    }

    /// Returns the identifiers of the blocks the store does not hold, in the order of `blocks`,
    /// without writing anything.
    pub async fn missing(&self, blocks: &[Block]) -> Result<Vec<Cid>, ProbeError> {
        let present = self.probe(blocks).await?;
        Ok(blocks
            .iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(block, _)| block.cid)
            .collect())
    }

    /// Checks every block for presence. Check `i` starts no earlier than `i` times the throttle
    /// after the first one.
    async fn probe(&self, blocks: &[Block]) -> Result<Vec<bool>, ProbeError> {
        if let Some(reporter) = &self.reporter {
            reporter.on_probe_start(blocks.len());
        }

        let start = tokio::time::Instant::now();
        let present: Vec<bool> = futures::stream::iter(blocks.iter().enumerate())
            .map(|(index, block)| {
                let delay = self
                    .probe_throttle
                    .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
                async move {
                    tokio::time::sleep_until(start + delay).await;
                    let present = self.store.contains(&block.cid).await?;
                    if present {
                        tracing::debug!("block {} is already present, skipping", block.cid);
                    }
                    if let Some(reporter) = &self.reporter {
                        reporter.on_probe_complete(&block.cid, present);
                    }
                    Ok::<_, ProbeError>(present)
                }
            })
            .buffered(self.probe_concurrency)
            .try_collect()
            .await?;

        if let Some(reporter) = &self.reporter {
            reporter.on_probes_done();
        }
        Ok(present)
    }

    async fn write(
        &self,
        batches: &[UploadBatch],
        summary: &mut UploadSummary,
    ) -> Result<(), StoreError> {
        let total: usize = batches.iter().map(UploadBatch::len).sum();
        if let Some(reporter) = &self.reporter {
            reporter.on_upload_start(total);
        }

        let mut uploaded = 0;
        for (index, batch) in batches.iter().enumerate() {
            tracing::debug!(
                "uploading batch {} / {} ({} blocks, {} bytes)",
                index + 1,
                batches.len(),
                batch.len(),
                batch.byte_size()
            );
            for block in batch.blocks() {
                let outcome = self.store.put(block).await?;
                match outcome {
                    PutOutcome::Written => summary.written += 1,
                    PutOutcome::AlreadyApplied => summary.already_applied += 1,
                }
                uploaded += 1;
                tracing::info!("uploaded {uploaded} / {total} blocks");
                if let Some(reporter) = &self.reporter {
                    reporter.on_block_uploaded(&block.cid, outcome);
                }
            }
        }

        if let Some(reporter) = &self.reporter {
            reporter.on_upload_complete();
        }
        Ok(())
    }
}
