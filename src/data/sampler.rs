// ============================================================
// Layer 4 — Sentence Pair Sampler
// ============================================================
// Decides what sentence B is for a given sentence A:
//
//   p = 0.5 → the true successor paragraph, label 1 ("is-next")
//   p = 0.5 → a uniformly random paragraph,  label 0 ("not-next")
//
// Policy for the two positions with no true successor (the last
// paragraph of the corpus and the last paragraph of each
// document): a heads draw falls back to the not-next branch.
// This keeps sampling total — no index ever fails — at the cost
// of a label-1 fraction slightly below one half on corpora with
// many short documents.
//
// RNG is rand::thread_rng per call, so the sampler is safe to
// invoke from any number of parallel data-loader workers.

use rand::Rng;

use crate::data::corpus::TokenCorpusIndex;

/// Next-sentence sampling policy. Stateless; all corpus access
/// goes through the shared read-only index.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentencePairSampler;

impl SentencePairSampler {
    pub fn new() -> Self {
        Self
    }

    /// Sample sentence B for paragraph `idx`.
    /// Returns the token ids of B and the is-next label.
    pub fn sample(&self, corpus: &TokenCorpusIndex, idx: usize) -> (Vec<u32>, u8) {
        let mut rng = rand::thread_rng();

        if rng.gen_bool(0.5) && corpus.has_true_successor(idx) {
            (corpus.token_ids_at(idx + 1).to_vec(), 1)
        } else {
            // Uniform over the whole corpus. A draw can land on
            // idx + 1 and still be labelled 0; the original
            // sampling scheme accepts that noise.
            let random_idx = rng.gen_range(0..corpus.len());
            (corpus.token_ids_at(random_idx).to_vec(), 0)
        }
    }
}
