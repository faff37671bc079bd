// ============================================================
// Layer 4 — Sequence Assembler
// ============================================================
// Packs a sentence pair into one fixed-length BERT input and
// derives the segment ids that mark which half each position
// belongs to.
//
// Packing order:
//   1. [CLS] + A truncated to max_len - 3 + [SEP] + B
//   2. truncate the whole thing to max_len - 1
//   3. append the trailing [SEP]
//   4. right-pad with [PAD] to exactly max_len
//
// Appending the trailing [SEP] after the global truncation
// guarantees it survives no matter how long B is; the price is
// that B can be cut off anywhere.

use crate::data::corpus::SpecialTokens;

/// Fixed-length input packing for one (A, B) sentence pair.
#[derive(Debug, Clone, Copy)]
pub struct SequenceAssembler {
    max_len: usize,
    specials: SpecialTokens,
}

impl SequenceAssembler {
    pub fn new(max_len: usize, specials: SpecialTokens) -> Self {
        // Need room for [CLS], at least one A slot, and two [SEP]
        assert!(max_len >= 4, "max_len must be at least 4");
        Self { max_len, specials }
    }

    /// Pack `prev` (sentence A) and `next` (sentence B) into a
    /// sequence of exactly `max_len` token ids.
    pub fn assemble(&self, prev: &[u32], next: &[u32]) -> Vec<u32> {
        let SpecialTokens { cls, sep, pad, .. } = self.specials;

        let mut ids = Vec::with_capacity(self.max_len);
        ids.push(cls);
        ids.extend_from_slice(&prev[..prev.len().min(self.max_len - 3)]);
        ids.push(sep);
        ids.extend_from_slice(next);

        ids.truncate(self.max_len - 1);
        ids.push(sep);
        ids.resize(self.max_len, pad);
        ids
    }

    /// Derive segment ids from an assembled sequence.
    ///
    /// With exactly two [SEP] occurrences at positions a < b, the
    /// positions a+1 ..= b are segment 1 and everything else is
    /// segment 0. Any other [SEP] count (conceivable when
    /// truncation eats a boundary or a paragraph itself contains
    /// the id) degrades to all zeros rather than erroring.
    pub fn segment_ids(&self, token_ids: &[u32]) -> Vec<u8> {
        let sep = self.specials.sep;
        let sep_positions: Vec<usize> = token_ids
            .iter()
            .enumerate()
            .filter(|(_, &id)| id == sep)
            .map(|(pos, _)| pos)
            .collect();

        let mut segments = vec![0u8; token_ids.len()];
        if let [a, b] = sep_positions[..] {
            for seg in &mut segments[a + 1..=b] {
                *seg = 1;
            }
        }
        segments
    }
}
