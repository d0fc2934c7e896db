use sitesmith_cas::Block;

use crate::UploadError;

/// The default maximum number of blocks in a batch.
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 7;

/// The default maximum number of bytes in a batch.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 256 * 1024;

/// Bounds that every [`UploadBatch`] satisfies. Both apply at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// The maximum number of blocks in a batch.
    pub max_items: usize,
    /// The maximum cumulative size of the blocks in a batch.
    pub max_bytes: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_BATCH_ITEMS,
            max_bytes: DEFAULT_MAX_BATCH_BYTES,
        }
    }
}

/// An ordered group of blocks that are uploaded together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    blocks: Vec<Block>,
    bytes: usize,
}

impl UploadBatch {
    /// The blocks of the batch in upload order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The number of blocks in the batch.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if the batch holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The cumulative size of the blocks in the batch.
    pub fn byte_size(&self) -> usize {
        self.bytes
    }

    fn fits(&self, block: &Block, limits: BatchLimits) -> bool {
        self.blocks.len() < limits.max_items && self.bytes + block.len() <= limits.max_bytes
    }

    fn push(&mut self, block: Block) {
        self.bytes += block.len();
        self.blocks.push(block);
    }
}

/// Splits `blocks` into consecutive batches that respect `limits`, preserving their order.
///
/// A batch is closed as soon as the next block would exceed either limit. A single block that is
/// larger than `limits.max_bytes` can never be placed and results in
/// [`UploadError::BlockTooLarge`].
pub fn split_into_batches<I>(blocks: I, limits: BatchLimits) -> Result<Vec<UploadBatch>, UploadError>
where
    I: IntoIterator<Item = Block>,
{
    let mut batches = Vec::new();
    let mut current = UploadBatch::default();

    for block in blocks {
        if block.len() > limits.max_bytes {
            return Err(UploadError::BlockTooLarge {
                cid: block.cid,
                size: block.len(),
                limit: limits.max_bytes,
            });
        }
        if !current.is_empty() && !current.fits(&block, limits) {
            batches.push(std::mem::take(&mut current));
        }
        current.push(block);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use sitesmith_cas::Codec;

    fn blocks_of_sizes(sizes: &[usize]) -> Vec<Block> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| {
                // The first byte makes every block unique.
                let mut data = vec![0u8; *size];
                if let Some(first) = data.first_mut() {
                    *first = i as u8;
                }
                Block::new(Codec::Raw, data)
            })
            .collect()
    }

    fn batch_sizes(batches: &[UploadBatch]) -> Vec<Vec<usize>> {
        batches
            .iter()
            .map(|batch| batch.blocks().iter().map(Block::len).collect())
            .collect()
    }

    #[test]
    fn test_item_limit() {
        let batches = split_into_batches(blocks_of_sizes(&[1; 16]), BatchLimits::default()).unwrap();
        assert_eq!(
            batches.iter().map(UploadBatch::len).collect::<Vec<_>>(),
            vec![7, 7, 2]
        );
    }

    #[test]
    fn test_byte_limit() {
        let limits = BatchLimits {
            max_items: 7,
            max_bytes: 100,
        };
        let batches = split_into_batches(blocks_of_sizes(&[60, 40, 1, 100, 50, 50, 51]), limits).unwrap();
        assert_eq!(
            batch_sizes(&batches),
            vec![vec![60, 40], vec![1], vec![100], vec![50, 50], vec![51]]
        );
        assert_eq!(batches[0].byte_size(), 100);
    }

    #[test]
    fn test_no_blocks() {
        assert!(split_into_batches(Vec::new(), BatchLimits::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_block_too_large() {
        let blocks = blocks_of_sizes(&[10, DEFAULT_MAX_BATCH_BYTES + 1]);
        let oversized = blocks[1].cid;
        assert_matches!(
            split_into_batches(blocks, BatchLimits::default()),
            Err(UploadError::BlockTooLarge { cid, size, limit })
                if cid == oversized && size == DEFAULT_MAX_BATCH_BYTES + 1 && limit == DEFAULT_MAX_BATCH_BYTES
        );
    }

    #[test]
    fn test_block_of_exactly_the_limit() {
        let batches =
            split_into_batches(blocks_of_sizes(&[DEFAULT_MAX_BATCH_BYTES, 1]), BatchLimits::default())
                .unwrap();
        assert_eq!(batches.len(), 2);
    }

    proptest! {
        #[test]
        fn test_batches_respect_limits(
            max_items in 1usize..10,
            max_bytes in 16usize..2048,
            fractions in prop::collection::vec(0.0f64..=1.0, 0..40),
        ) {
            let limits = BatchLimits { max_items, max_bytes };
            let sizes: Vec<usize> = fractions
                .iter()
                .map(|f| (f * max_bytes as f64) as usize)
                .collect();
            let blocks = blocks_of_sizes(&sizes);

            let batches = split_into_batches(blocks.clone(), limits).unwrap();
            for batch in &batches {
                prop_assert!(!batch.is_empty());
                prop_assert!(batch.len() <= max_items);
                prop_assert!(batch.byte_size() <= max_bytes);
            }

            // Batching neither drops nor reorders blocks.
            let flattened: Vec<Block> = batches
                .iter()
                .flat_map(|batch| batch.blocks().iter().cloned())
                .collect();
            prop_assert_eq!(flattened, blocks);
        }
    }
}
