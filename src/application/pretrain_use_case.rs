// ============================================================
// Layer 2 — PretrainUseCase
// ============================================================
// Orchestrates the full pretraining pipeline in order:
//
//   Step 1: Load or build the tokenizer     (Layer 6 - infra)
//   Step 2: Index and tokenize the corpus   (Layer 4 - data)
//   Step 3: Build the example dataset       (Layer 4 - data)
//   Step 4: Wire masking + reference model  (Layer 5 - ml)
//   Step 5: Run the resumable training loop (Layer 5 - ml)
//
// The CLI only ever supplies the corpus directory and the batch
// size; every other knob lives in PretrainConfig with defaults
// from the published BERT recipe.

use std::path::Path;
use std::sync::Arc;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::data::corpus::TokenCorpusIndex;
use crate::data::dataset::PretrainDataset;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::tokenizer_store::TokenizerStore;
use crate::ml::masking::BertMasking;
use crate::ml::model::{AdamHyper, TiedEmbeddingModel};
use crate::ml::trainer::run_pretraining;

// ─── Pretraining Configuration ────────────────────────────────────────────────
// The static configuration record. Serializable so a run's exact
// settings can be kept next to its checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PretrainConfig {
    pub corpus_dir:        String,
    pub checkpoint_dir:    String,
    pub batch_size:        usize,
    pub max_len:           usize,
    pub vocab_size:        usize,
    pub embedding_dim:     usize,

    // Adam (BERT pretraining recipe)
    pub lr:                f32,
    pub beta1:             f32,
    pub beta2:             f32,
    pub weight_decay:      f32,

    // Masking policy probabilities
    pub select_prob:       f64,
    pub mask_prob:         f64,
    pub randomize_prob:    f64,

    /// Run forward/backward under mixed precision with loss
    /// scaling. Off means guaranteed full precision.
    pub mixed_precision:   bool,

    /// Total tokens to train on. The BERT recipe: 256 sequences
    /// × 512 tokens × 1,000,000 steps.
    pub token_budget:      u64,

    /// Samples consumed between checkpoints
    pub ckpt_samples:      usize,

    pub n_workers:         usize,
    pub shuffle_seed:      u64,

    /// Checkpoint file to resume from, if any
    pub resume_checkpoint: Option<String>,
}

impl Default for PretrainConfig {
    fn default() -> Self {
        Self {
            corpus_dir:        "data/corpus".to_string(),
            checkpoint_dir:    "checkpoints".to_string(),
            batch_size:        256,
            max_len:           512,
            vocab_size:        30522,
            embedding_dim:     64,
            lr:                1e-4,
            beta1:             0.9,
            beta2:             0.999,
            weight_decay:      0.01,
            select_prob:       0.15,
            mask_prob:         0.8,
            randomize_prob:    0.1,
            mixed_precision:   false,
            token_budget:      256 * 512 * 1_000_000,
            ckpt_samples:      100_000,
            n_workers:         4,
            shuffle_seed:      42,
            resume_checkpoint: None,
        }
    }
}

// ─── PretrainUseCase ──────────────────────────────────────────────────────────
pub struct PretrainUseCase {
    config: PretrainConfig,
}

impl PretrainUseCase {
    pub fn new(config: PretrainConfig) -> Self {
        Self { config }
    }

    /// Execute the pretraining pipeline end to end.
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        let corpus_dir = Path::new(&cfg.corpus_dir);

        // ── Step 1: tokenizer ─────────────────────────────────────────────────
        let store = TokenizerStore::new(&cfg.checkpoint_dir);
        let tokenizer = store.load_or_build(corpus_dir, cfg.vocab_size)?;
        let vocab_size = tokenizer.get_vocab_size(true);

        // ── Step 2: corpus index ──────────────────────────────────────────────
        let corpus = TokenCorpusIndex::build(corpus_dir, &tokenizer)?;
        ensure!(!corpus.is_empty(), "no paragraphs found in '{}'", cfg.corpus_dir);
        let corpus_name = corpus.name().to_string();
        let specials = corpus.special_tokens();

        // ── Step 3: dataset ───────────────────────────────────────────────────
        let dataset = PretrainDataset::new(Arc::new(corpus), cfg.max_len);

        // ── Step 4: collaborators ─────────────────────────────────────────────
        let masking = BertMasking::new(
            specials,
            vocab_size as u32,
            cfg.select_prob,
            cfg.mask_prob,
            cfg.randomize_prob,
        );
        let hyper = AdamHyper {
            lr: cfg.lr,
            beta1: cfg.beta1,
            beta2: cfg.beta2,
            weight_decay: cfg.weight_decay,
            eps: 1e-8,
        };
        let mut model = TiedEmbeddingModel::new(vocab_size, cfg.embedding_dim, specials, hyper);

        // ── Step 5: train ─────────────────────────────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.checkpoint_dir, &corpus_name)?;
        run_pretraining(cfg, dataset, &masking, &mut model, checkpoints)
    }
}
