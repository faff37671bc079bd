// ============================================================
// Layer 5 — Reference Model
// ============================================================
// A deliberately small numerical backend so the pipeline runs
// end to end without an external network: a tied-embedding
// bag-of-tokens model with two objectives.
//
//   h        = mean over non-pad positions of
//              token_embedding + segment_embedding
//   NSP      = sigmoid(h · w + b), binary cross-entropy
//   MLM      = softmax(E · h) over the vocabulary, cross-entropy
//              against the token at a few probed positions
//
// Gradients are derived by hand and accumulated during the
// forward pass; backward only applies the loss scale and checks
// finiteness, and apply_update runs a standard Adam step. That
// split is exactly the contract PretrainStepper asks for, so
// the gradient scaler drives this model the same way it would
// drive a real network.
//
// The autocast flag is accepted but computation stays in f32:
// full precision is the documented fallback.

use anyhow::{bail, Result};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::data::batcher::PretrainBatch;
use crate::data::corpus::SpecialTokens;
use crate::domain::traits::{PretrainStepper, StepLosses};

/// MLM positions probed per row. Probing every position would
/// cost a full vocabulary softmax per token; a handful is enough
/// to train the reference weights and exercise the loop.
const MLM_PROBES: usize = 4;

/// Adam hyperparameters, taken from the pretraining config.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdamHyper {
    pub lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub weight_decay: f32,
    pub eps: f32,
}

impl Default for AdamHyper {
    fn default() -> Self {
        Self { lr: 1e-3, beta1: 0.9, beta2: 0.999, weight_decay: 0.01, eps: 1e-8 }
    }
}

#[derive(Serialize, Deserialize)]
struct ModelState {
    vocab_size: usize,
    dim: usize,
    emb: Vec<f32>,
    seg_emb: Vec<f32>,
    nsp_w: Vec<f32>,
    nsp_b: f32,
}

#[derive(Serialize, Deserialize)]
struct OptimizerState {
    t: u64,
    m: Vec<f32>,
    v: Vec<f32>,
}

pub struct TiedEmbeddingModel {
    vocab_size: usize,
    dim: usize,
    pad_id: u32,

    // Parameters. The embedding table doubles as the MLM output
    // projection (weight tying).
    emb: Vec<f32>,     // vocab_size * dim
    seg_emb: Vec<f32>, // 2 * dim
    nsp_w: Vec<f32>,   // dim
    nsp_b: f32,

    // Gradient accumulators, same layout as the flattened
    // parameter vector [emb | seg_emb | nsp_w | nsp_b]
    grads: Vec<f32>,

    // Adam state over the flattened parameter vector
    t: u64,
    m: Vec<f32>,
    v: Vec<f32>,
    hyper: AdamHyper,
}

impl TiedEmbeddingModel {
    pub fn new(vocab_size: usize, dim: usize, specials: SpecialTokens, hyper: AdamHyper) -> Self {
        let mut rng = rand::thread_rng();
        let init = Normal::new(0.0f32, 0.02).expect("valid normal distribution");

        let n_params = vocab_size * dim + 2 * dim + dim + 1;
        Self {
            vocab_size,
            dim,
            pad_id: specials.pad,
            emb: (0..vocab_size * dim).map(|_| init.sample(&mut rng)).collect(),
            seg_emb: (0..2 * dim).map(|_| init.sample(&mut rng)).collect(),
            nsp_w: (0..dim).map(|_| init.sample(&mut rng)).collect(),
            nsp_b: 0.0,
            grads: vec![0.0; n_params],
            t: 0,
            m: vec![0.0; n_params],
            v: vec![0.0; n_params],
            hyper,
        }
    }

    fn n_params(&self) -> usize {
        self.vocab_size * self.dim + 2 * self.dim + self.dim + 1
    }

    // Offsets into the flattened gradient/moment vectors
    fn seg_offset(&self) -> usize {
        self.vocab_size * self.dim
    }
    fn nsp_w_offset(&self) -> usize {
        self.seg_offset() + 2 * self.dim
    }
    fn nsp_b_offset(&self) -> usize {
        self.nsp_w_offset() + self.dim
    }

    fn embedding(&self, token: u32) -> &[f32] {
        let start = token as usize * self.dim;
        &self.emb[start..start + self.dim]
    }

    /// Stable binary cross-entropy from the raw logit.
    fn bce_from_logit(z: f32, y: f32) -> f32 {
        z.max(0.0) - z * y + (-z.abs()).exp().ln_1p()
    }
}

impl PretrainStepper for TiedEmbeddingModel {
    fn forward(&mut self, batch: &PretrainBatch, _autocast: bool) -> Result<StepLosses> {
        let batch_size = batch.batch_size();
        if batch_size == 0 {
            bail!("cannot step on an empty batch");
        }
        let dim = self.dim;
        let inv_b = 1.0 / batch_size as f32;

        self.grads.fill(0.0);
        let mut nsp_loss = 0.0f64;
        let mut mlm_loss = 0.0f64;
        let mut mlm_rows = 0usize;

        for row in 0..batch_size {
            let tokens = &batch.token_ids[row];
            let segments = &batch.segment_ids[row];
            let positions: Vec<usize> = (0..tokens.len())
                .filter(|&p| tokens[p] != self.pad_id)
                .collect();
            if positions.is_empty() {
                continue;
            }
            let inv_n = 1.0 / positions.len() as f32;

            // Pooled representation
            let mut h = vec![0.0f32; dim];
            for &p in &positions {
                let te = self.embedding(tokens[p]);
                let se = &self.seg_emb[segments[p] as usize * dim..(segments[p] as usize + 1) * dim];
                for d in 0..dim {
                    h[d] += (te[d] + se[d]) * inv_n;
                }
            }

            // ── NSP head ─────────────────────────────────────────────────────
            let y = batch.is_next[row] as f32;
            let z: f32 = h.iter().zip(&self.nsp_w).map(|(a, b)| a * b).sum::<f32>() + self.nsp_b;
            nsp_loss += Self::bce_from_logit(z, y) as f64;

            let dz = (1.0 / (1.0 + (-z).exp()) - y) * inv_b;
            let nsp_w_off = self.nsp_w_offset();
            let nsp_b_off = self.nsp_b_offset();
            for d in 0..dim {
                self.grads[nsp_w_off + d] += dz * h[d];
            }
            self.grads[nsp_b_off] += dz;

            // Gradient flowing back into h from both heads
            let mut dh: Vec<f32> = self.nsp_w.iter().map(|w| dz * w).collect();

            // ── MLM head (tied weights, probed positions) ────────────────────
            let stride = (positions.len() / MLM_PROBES).max(1);
            let probes: Vec<usize> = positions.iter().copied().step_by(stride).take(MLM_PROBES).collect();
            let inv_probes = 1.0 / probes.len() as f32;
            let mut row_mlm = 0.0f64;

            for &p in &probes {
                let target = tokens[p] as usize;

                // Softmax over the vocabulary of E · h
                let mut logits = vec![0.0f32; self.vocab_size];
                let mut max_logit = f32::NEG_INFINITY;
                for vtok in 0..self.vocab_size {
                    let e = &self.emb[vtok * dim..(vtok + 1) * dim];
                    let l: f32 = e.iter().zip(&h).map(|(a, b)| a * b).sum();
                    logits[vtok] = l;
                    max_logit = max_logit.max(l);
                }
                let denom: f32 = logits.iter().map(|l| (l - max_logit).exp()).sum();
                let log_denom = denom.ln() + max_logit;
                row_mlm += (log_denom - logits[target]) as f64;

                // d loss / d logit_v = softmax_v - 1{v == target}
                let gscale = inv_b * inv_probes;
                for vtok in 0..self.vocab_size {
                    let p_v = (logits[vtok] - max_logit).exp() / denom;
                    let dl = (p_v - (vtok == target) as usize as f32) * gscale;
                    let e_off = vtok * dim;
                    for d in 0..dim {
                        dh[d] += dl * self.emb[e_off + d];
                        self.grads[e_off + d] += dl * h[d];
                    }
                }
            }
            mlm_loss += row_mlm * inv_probes as f64;
            mlm_rows += 1;

            // ── Pooling backprop into embeddings ─────────────────────────────
            let seg_off = self.seg_offset();
            for &p in &positions {
                let e_off = tokens[p] as usize * dim;
                let s_off = seg_off + segments[p] as usize * dim;
                for d in 0..dim {
                    let g = dh[d] * inv_n;
                    self.grads[e_off + d] += g;
                    self.grads[s_off + d] += g;
                }
            }
        }

        if mlm_rows == 0 {
            bail!("batch contained only padding");
        }

        Ok(StepLosses {
            nsp: nsp_loss / batch_size as f64,
            mlm: mlm_loss / mlm_rows as f64,
        })
    }

    fn backward(&mut self, loss_scale: f32) -> Result<bool> {
        let mut finite = true;
        for g in &mut self.grads {
            *g *= loss_scale;
            finite &= g.is_finite();
        }
        Ok(finite)
    }

    fn apply_update(&mut self, inv_scale: f32) -> Result<()> {
        self.t += 1;
        let AdamHyper { lr, beta1, beta2, weight_decay, eps } = self.hyper;
        let bias1 = 1.0 - beta1.powi(self.t as i32);
        let bias2 = 1.0 - beta2.powi(self.t as i32);

        let seg_off = self.seg_offset();
        let nsp_w_off = self.nsp_w_offset();
        let nsp_b_off = self.nsp_b_offset();

        for i in 0..self.n_params() {
            let param = if i < seg_off {
                self.emb[i]
            } else if i < nsp_w_off {
                self.seg_emb[i - seg_off]
            } else if i < nsp_b_off {
                self.nsp_w[i - nsp_w_off]
            } else {
                self.nsp_b
            };

            let g = self.grads[i] * inv_scale + weight_decay * param;
            self.m[i] = beta1 * self.m[i] + (1.0 - beta1) * g;
            self.v[i] = beta2 * self.v[i] + (1.0 - beta2) * g * g;
            let update = lr * (self.m[i] / bias1) / ((self.v[i] / bias2).sqrt() + eps);

            let target = if i < seg_off {
                &mut self.emb[i]
            } else if i < nsp_w_off {
                &mut self.seg_emb[i - seg_off]
            } else if i < nsp_b_off {
                &mut self.nsp_w[i - nsp_w_off]
            } else {
                &mut self.nsp_b
            };
            *target = param - update;
        }
        Ok(())
    }

    fn model_state(&self) -> Result<Vec<u8>> {
        let state = ModelState {
            vocab_size: self.vocab_size,
            dim: self.dim,
            emb: self.emb.clone(),
            seg_emb: self.seg_emb.clone(),
            nsp_w: self.nsp_w.clone(),
            nsp_b: self.nsp_b,
        };
        Ok(bincode::serialize(&state)?)
    }

    fn optimizer_state(&self) -> Result<Vec<u8>> {
        let state = OptimizerState { t: self.t, m: self.m.clone(), v: self.v.clone() };
        Ok(bincode::serialize(&state)?)
    }

    fn load_model_state(&mut self, bytes: &[u8]) -> Result<()> {
        let state: ModelState = bincode::deserialize(bytes)?;
        if state.vocab_size != self.vocab_size || state.dim != self.dim {
            bail!(
                "checkpoint shape mismatch: saved {}x{}, configured {}x{}",
                state.vocab_size,
                state.dim,
                self.vocab_size,
                self.dim
            );
        }
        self.emb = state.emb;
        self.seg_emb = state.seg_emb;
        self.nsp_w = state.nsp_w;
        self.nsp_b = state.nsp_b;
        Ok(())
    }

    fn load_optimizer_state(&mut self, bytes: &[u8]) -> Result<()> {
        let state: OptimizerState = bincode::deserialize(bytes)?;
        if state.m.len() != self.n_params() {
            bail!("optimizer state length mismatch");
        }
        self.t = state.t;
        self.m = state.m;
        self.v = state.v;
        Ok(())
    }
}
