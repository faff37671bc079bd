// ============================================================
// Layer 5 — ML Layer
// ============================================================
// Numerics and the training state machine.
//
//   masking.rs — the BERT 80/10/10 token-corruption policy
//                (reference MaskingPolicy implementation)
//
//   scaler.rs  — mixed-precision gradient scaler: loss scaling,
//                overflow detection, backoff and growth
//
//   model.rs   — a small tied-embedding NSP+MLM model with an
//                Adam update, the reference PretrainStepper so
//                the binary runs end to end without an external
//                network
//
//   trainer.rs — the resumable training loop: batch cycling,
//                scaled backpropagation, running-loss tracking,
//                periodic checkpoint rotation
//
// Everything the loop touches goes through the domain traits, so
// a production network can replace model.rs without touching the
// loop.

/// BERT masking policy (select/mask/randomize probabilities)
pub mod masking;

/// Gradient scaler for mixed-precision training
pub mod scaler;

/// Reference tied-embedding model implementing PretrainStepper
pub mod model;

/// The resumable training loop
pub mod trainer;
