// ============================================================
// Layer 5 — Masking Policy
// ============================================================
// The BERT token-corruption scheme applied to every batch before
// the forward pass:
//
//   select 15% of maskable positions, then per selected token
//     80% → replace with [MASK]
//     10% → replace with a random vocabulary token
//     10% → leave unchanged
//
// Special tokens ([CLS], [SEP], [PAD]) are never selected —
// corrupting a boundary token would also corrupt the segment-id
// derivation on the model side.

use rand::Rng;

use crate::data::corpus::SpecialTokens;
use crate::domain::traits::MaskingPolicy;

pub struct BertMasking {
    specials: SpecialTokens,
    vocab_size: u32,
    select_prob: f64,
    mask_prob: f64,
    randomize_prob: f64,
}

impl BertMasking {
    pub fn new(
        specials: SpecialTokens,
        vocab_size: u32,
        select_prob: f64,
        mask_prob: f64,
        randomize_prob: f64,
    ) -> Self {
        assert!(mask_prob + randomize_prob <= 1.0);
        Self { specials, vocab_size, select_prob, mask_prob, randomize_prob }
    }

    /// The published BERT probabilities: 0.15 / 0.8 / 0.1.
    pub fn bert_defaults(specials: SpecialTokens, vocab_size: u32) -> Self {
        Self::new(specials, vocab_size, 0.15, 0.8, 0.1)
    }

    fn is_maskable(&self, id: u32) -> bool {
        id != self.specials.cls && id != self.specials.sep && id != self.specials.pad
    }
}

impl MaskingPolicy for BertMasking {
    fn apply(&self, token_ids: &[Vec<u32>]) -> Vec<Vec<u32>> {
        let mut rng = rand::thread_rng();

        token_ids
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&id| {
                        if !self.is_maskable(id) || !rng.gen_bool(self.select_prob) {
                            return id;
                        }
                        let roll: f64 = rng.gen();
                        if roll < self.mask_prob {
                            self.specials.mask
                        } else if roll < self.mask_prob + self.randomize_prob {
                            rng.gen_range(0..self.vocab_size)
                        } else {
                            id
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::corpus::tests::test_specials;

    #[test]
    fn special_tokens_are_never_touched() {
        let masking = BertMasking::new(test_specials(), 100, 1.0, 1.0, 0.0);
        let row = vec![1, 50, 2, 60, 2, 0, 0];
        let masked = &masking.apply(&[row])[0];

        assert_eq!(masked[0], 1); // [CLS]
        assert_eq!(masked[2], 2); // [SEP]
        assert_eq!(masked[4], 2);
        assert_eq!(masked[5], 0); // [PAD]
        assert_eq!(masked[6], 0);
        // With select=1.0 and mask=1.0 both content tokens flip
        assert_eq!(masked[1], 4); // [MASK]
        assert_eq!(masked[3], 4);
    }

    #[test]
    fn selection_rate_tracks_select_prob() {
        let masking = BertMasking::new(test_specials(), 1000, 0.15, 1.0, 0.0);
        let row = vec![500u32; 20_000];
        let masked = &masking.apply(&[row.clone()])[0];

        let changed = masked.iter().filter(|&&id| id == 4).count();
        let rate = changed as f64 / row.len() as f64;
        assert!((0.12..0.18).contains(&rate), "selection rate was {rate}");
    }

    #[test]
    fn input_rows_are_left_intact() {
        let masking = BertMasking::bert_defaults(test_specials(), 1000);
        let rows = vec![vec![10, 11, 12, 13], vec![14, 15, 16, 17]];
        let _ = masking.apply(&rows);
        assert_eq!(rows, vec![vec![10, 11, 12, 13], vec![14, 15, 16, 17]]);
    }
}
