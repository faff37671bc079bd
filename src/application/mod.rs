// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: this layer wires the data
// pipeline, the collaborators, and the training loop together.
// No tensor math here, no printing here, no direct sampling
// logic here — it tells the other layers what to do.

// The pretraining workflow and its configuration record
pub mod pretrain_use_case;
