// ============================================================
// Layer 3 — Collaborator Contracts
// ============================================================
// The network, the loss, the optimizer, and the masking policy
// are external collaborators with fixed contracts. The training
// loop only ever talks to these traits, so the whole loop is
// testable with scripted mocks and the real model can live on
// any numerical backend.
//
// PretrainStepper deliberately collapses forward/loss/backward/
// update into one seam: the loop needs "compute one step, under
// mixed precision if asked" — not the internals of autodiff.

use anyhow::Result;

use crate::data::batcher::PretrainBatch;

// ─── MaskingPolicy ────────────────────────────────────────────────────────────
/// Token-corruption policy applied to each batch before the
/// forward pass (the BERT 80/10/10 scheme in the reference
/// implementation).
pub trait MaskingPolicy: Send + Sync {
    /// Return a masked copy of the token-id rows. Input rows are
    /// left untouched.
    fn apply(&self, token_ids: &[Vec<u32>]) -> Vec<Vec<u32>>;
}

/// Per-objective loss values extracted after one forward pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLosses {
    pub nsp: f64,
    pub mlm: f64,
}

// ─── PretrainStepper ──────────────────────────────────────────────────────────
/// External numerical backend driving model + loss + optimizer.
///
/// Call protocol per training step:
///   1. `forward(batch, autocast)` — forward pass and loss
///   2. `backward(loss_scale)`     — backprop of (nsp + mlm) * scale
///   3. `apply_update(inv_scale)`  — optimizer update, or skipped
///                                   by the scaler on overflow
///
/// Implementations must fall back to full precision when
/// `autocast` is false.
pub trait PretrainStepper {
    /// Forward pass + loss on one masked batch. Retains whatever
    /// activations the subsequent backward call needs.
    fn forward(&mut self, batch: &PretrainBatch, autocast: bool) -> Result<StepLosses>;

    /// Backprop the combined loss multiplied by `loss_scale`.
    /// Returns false if any parameter gradient is non-finite.
    fn backward(&mut self, loss_scale: f32) -> Result<bool>;

    /// Optimizer update with gradients multiplied by `inv_scale`
    /// (the gradient unscaling step).
    fn apply_update(&mut self, inv_scale: f32) -> Result<()>;

    /// Opaque parameter blob for the checkpoint record.
    fn model_state(&self) -> Result<Vec<u8>>;

    /// Opaque optimizer-state blob for the checkpoint record.
    fn optimizer_state(&self) -> Result<Vec<u8>>;

    /// Restore parameters from a checkpoint blob. Malformed
    /// contents are fatal — no partial-state recovery.
    fn load_model_state(&mut self, bytes: &[u8]) -> Result<()>;

    /// Restore optimizer state from a checkpoint blob.
    fn load_optimizer_state(&mut self, bytes: &[u8]) -> Result<()>;
}
