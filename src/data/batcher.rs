// ============================================================
// Layer 4 — Pretraining Batcher
// ============================================================
// Implements Burn's Batcher trait to stack individual examples
// into one batch for the training loop.
//
// The batch stays in plain row-major Vecs instead of framework
// tensors: the numerical backend behind PretrainStepper is an
// external collaborator, and it decides for itself how (and on
// which device) to lay the rows out. All rows already share one
// fixed length, so no dynamic padding happens here.

use burn::data::dataloader::batcher::Batcher;

use crate::domain::example::PretrainExample;

/// A batch of sentence-pair examples. Row i of every field
/// belongs to the same example.
#[derive(Debug, Clone)]
pub struct PretrainBatch {
    pub token_ids: Vec<Vec<u32>>,
    pub segment_ids: Vec<Vec<u8>>,
    pub is_next: Vec<u8>,
}

impl PretrainBatch {
    pub fn batch_size(&self) -> usize {
        self.token_ids.len()
    }

    pub fn seq_len(&self) -> usize {
        self.token_ids.first().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PretrainBatcher;

impl PretrainBatcher {
    pub fn new() -> Self {
        Self
    }
}

impl Batcher<PretrainExample, PretrainBatch> for PretrainBatcher {
    fn batch(&self, items: Vec<PretrainExample>) -> PretrainBatch {
        let mut token_ids = Vec::with_capacity(items.len());
        let mut segment_ids = Vec::with_capacity(items.len());
        let mut is_next = Vec::with_capacity(items.len());

        for item in items {
            token_ids.push(item.token_ids);
            segment_ids.push(item.segment_ids);
            is_next.push(item.is_next);
        }

        PretrainBatch { token_ids, segment_ids, is_next }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn example(fill: u32, is_next: u8) -> PretrainExample {
        PretrainExample {
            token_ids: vec![fill; 8],
            segment_ids: vec![0; 8],
            is_next,
        }
    }

    #[test]
    fn rows_keep_example_order() {
        let batch = PretrainBatcher::new().batch(vec![
            example(5, 1),
            example(6, 0),
            example(7, 1),
        ]);

        assert_eq!(batch.batch_size(), 3);
        assert_eq!(batch.seq_len(), 8);
        assert_eq!(batch.token_ids[1], vec![6; 8]);
        assert_eq!(batch.is_next, vec![1, 0, 1]);
    }

    #[test]
    fn empty_batch_is_well_formed() {
        let batch = PretrainBatcher::new().batch(Vec::new());
        assert_eq!(batch.batch_size(), 0);
        assert_eq!(batch.seq_len(), 0);
    }
}
