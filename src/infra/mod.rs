// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence and reporting concerns:
//
//   checkpoint.rs      — the durable training snapshot: one
//                        bincode record of {step, model blob,
//                        optimizer blob, scaler state}, rotated
//                        so exactly one file is authoritative
//
//   tokenizer_store.rs — loads the tokenizer vocabulary from
//                        disk, or builds a word-level one from
//                        the corpus on the first run
//
//   metrics.rs         — running-loss accumulators and the
//                        progress line printed at every
//                        checkpoint interval
//
// Nothing in this layer knows about sampling policies or the
// training loop's step arithmetic; it only persists and reports
// what it is handed.

/// Checkpoint writing, rotation, and resumption
pub mod checkpoint;

/// Tokenizer vocabulary persistence
pub mod tokenizer_store;

/// Running losses and elapsed-time reporting
pub mod metrics;
