// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits defining the core concepts of the
// pretraining pipeline. No Burn types, no file I/O, no tensor
// math in this layer — only what a training example IS and what
// the external collaborators (masking policy, numerical backend)
// must provide.
//
// Keeping this layer pure means every contract here is unit
// testable without a tokenizer vocabulary or an accelerator.

// One assembled MLM/NSP training example
pub mod example;

// Collaborator contracts implemented by the ml layer (and by
// mocks in tests)
pub mod traits;
