// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw text files to batched training examples.
//
// The pipeline flows in this order:
//
//   corpus dir (*.txt, one sentence per line)
//       │
//       ▼
//   TokenCorpusIndex    → tokenizes every paragraph once,
//       │                 holds the flat in-memory index
//       ▼
//   SentencePairSampler → picks true successor or random
//       │                 paragraph (the NSP label)
//       ▼
//   SequenceAssembler   → [CLS]/[SEP] packing, truncation,
//       │                 padding, segment ids
//       ▼
//   PretrainDataset     → Burn Dataset, one example per
//       │                 paragraph index, built on access
//       ▼
//   PretrainBatcher     → stacks examples into row batches
//       │
//       ▼
//   DataLoader          → shuffles and prefetches for the loop
//
// Each module does exactly one step, so each step is
// independently testable.

/// Tokenized paragraph index over a directory of text files
pub mod corpus;

/// Next-sentence sampling policy
pub mod sampler;

/// Fixed-length BERT input packing and segment-id derivation
pub mod assembler;

/// Implements Burn's Dataset trait — one example per paragraph
pub mod dataset;

/// Implements Burn's Batcher trait for the data loader
pub mod batcher;
