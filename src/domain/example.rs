// ============================================================
// Layer 3 — Pretraining Example
// ============================================================
// One fully assembled MLM/NSP training example. Built on every
// dataset access, never persisted.
//
// Sequence format: [CLS] sentence A [SEP] sentence B [SEP] [PAD]...

use serde::{Deserialize, Serialize};

/// One fixed-length sentence-pair example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PretrainExample {
    /// Token ids, exactly `max_len` long
    pub token_ids: Vec<u32>,

    /// Segment ids, same length: 0 for sentence A (and its
    /// boundary tokens), 1 for sentence B up to and including
    /// the trailing [SEP]
    pub segment_ids: Vec<u8>,

    /// 1 iff sentence B is the true successor of sentence A
    pub is_next: u8,
}
