// ============================================================
// Layer 4 — Pretraining Dataset
// ============================================================
// The addressable example source: one example per paragraph
// index. Examples are assembled on every access — sampling the
// NSP partner fresh each time — and never cached.
//
// Implements Burn's Dataset trait so the DataLoader can drive it
// from several worker threads. That is safe because the corpus
// index is immutable behind an Arc, the sampler is stateless,
// and the assembler only carries copied token ids.

use std::sync::Arc;

use burn::data::dataset::Dataset;

use crate::data::assembler::SequenceAssembler;
use crate::data::corpus::TokenCorpusIndex;
use crate::data::sampler::SentencePairSampler;
use crate::domain::example::PretrainExample;

pub struct PretrainDataset {
    corpus: Arc<TokenCorpusIndex>,
    sampler: SentencePairSampler,
    assembler: SequenceAssembler,
}

impl PretrainDataset {
    pub fn new(corpus: Arc<TokenCorpusIndex>, max_len: usize) -> Self {
        let assembler = SequenceAssembler::new(max_len, corpus.special_tokens());
        Self { corpus, sampler: SentencePairSampler::new(), assembler }
    }
}

impl Dataset<PretrainExample> for PretrainDataset {
    fn get(&self, index: usize) -> Option<PretrainExample> {
        if index >= self.corpus.len() {
            return None;
        }

        let prev = self.corpus.token_ids_at(index);
        let (next, is_next) = self.sampler.sample(&self.corpus, index);
        let token_ids = self.assembler.assemble(prev, &next);
        let segment_ids = self.assembler.segment_ids(&token_ids);

        Some(PretrainExample { token_ids, segment_ids, is_next })
    }

    fn len(&self) -> usize {
        self.corpus.len()
    }
}
