// ============================================================
// Layer 5 — Training Loop
// ============================================================
// The resumable pretraining state machine. Phases:
//
//   INITIALIZING  — resolve init_step (0 or the checkpointed
//                   step), total_steps from the token budget,
//                   and the checkpoint cadence
//   RUNNING       — one masked forward/backward/update per step,
//                   cycling the batch stream on exhaustion
//   CHECKPOINTING — every save_every steps and at total_steps:
//                   progress line, accumulator reset, write new
//                   checkpoint, then rotate out the old one
//   DONE          — loop exit after total_steps
//
// The step counter is monotone across the whole run and across
// resumes: a checkpoint written at step S resumes at S + 1.
//
// Batch-stream exhaustion is steady state, not an error: the
// DataLoader iterator is simply rebuilt, which also reshuffles.

use anyhow::{Context, Result};
use burn::data::dataloader::DataLoaderBuilder;
use std::path::{Path, PathBuf};

use crate::application::pretrain_use_case::PretrainConfig;
use crate::data::batcher::{PretrainBatch, PretrainBatcher};
use crate::data::dataset::PretrainDataset;
use crate::domain::traits::{MaskingPolicy, PretrainStepper};
use crate::infra::checkpoint::{CheckpointManager, CheckpointRecord};
use crate::infra::metrics::TrainingState;
use crate::ml::scaler::GradScaler;

/// Steps needed to consume the token budget at this batch shape.
/// The BERT recipe (batch 256 × 512 tokens × 1M steps) divided by
/// the configured per-step token count.
pub fn total_steps(token_budget: u64, batch_size: usize, max_len: usize) -> usize {
    (token_budget / (batch_size as u64 * max_len as u64)) as usize
}

/// Checkpoint cadence: a fixed sample budget between saves,
/// expressed in steps.
pub fn save_interval(ckpt_samples: usize, batch_size: usize) -> usize {
    (ckpt_samples / batch_size).max(1)
}

pub fn run_pretraining<S: PretrainStepper>(
    cfg: &PretrainConfig,
    dataset: PretrainDataset,
    masking: &dyn MaskingPolicy,
    stepper: &mut S,
    mut checkpoints: CheckpointManager,
) -> Result<()> {
    // ── INITIALIZING ──────────────────────────────────────────────────────────
    let total_steps = total_steps(cfg.token_budget, cfg.batch_size, cfg.max_len);
    let save_every = save_interval(cfg.ckpt_samples, cfg.batch_size);
    let mut scaler = GradScaler::new(cfg.mixed_precision);

    let init_step = match &cfg.resume_checkpoint {
        Some(path) => {
            let record = CheckpointManager::load(Path::new(path))
                .with_context(|| format!("cannot resume from checkpoint '{path}'"))?;
            stepper.load_model_state(&record.model)?;
            stepper.load_optimizer_state(&record.optimizer)?;
            scaler.load_state(record.scaler);
            checkpoints.adopt(PathBuf::from(path));
            tracing::info!("Resumed from '{}' at step {}", path, record.step);
            record.step
        }
        None => 0,
    };

    tracing::info!(
        "Pretraining: batch_size={}, max_len={}, total_steps={}, checkpoint every {} steps",
        cfg.batch_size,
        cfg.max_len,
        total_steps,
        save_every
    );

    let loader = DataLoaderBuilder::new(PretrainBatcher::new())
        .batch_size(cfg.batch_size)
        .shuffle(cfg.shuffle_seed)
        .num_workers(cfg.n_workers)
        .build(dataset);

    // ── RUNNING ───────────────────────────────────────────────────────────────
    let mut batches = loader.iter();
    let mut state = TrainingState::start();

    for step in init_step + 1..=total_steps {
        let batch = match batches.next() {
            Some(batch) => batch,
            None => {
                // One epoch exhausted; restart (and reshuffle)
                batches = loader.iter();
                batches.next().context("data loader produced no batches")?
            }
        };

        let masked = masking.apply(&batch.token_ids);
        let masked_batch = PretrainBatch {
            token_ids: masked,
            segment_ids: batch.segment_ids,
            is_next: batch.is_next,
        };

        let losses = stepper.forward(&masked_batch, cfg.mixed_precision)?;
        let grads_finite = stepper.backward(scaler.loss_scale())?;
        scaler.step(stepper, grads_finite)?;
        state.accumulate(losses);

        // ── CHECKPOINTING ─────────────────────────────────────────────────────
        if step % save_every == 0 || step == total_steps {
            println!("{}", state.progress_line(step, total_steps));
            state.reset_window();

            let record = CheckpointRecord {
                step,
                model: stepper.model_state()?,
                optimizer: stepper.optimizer_state()?,
                scaler: scaler.state().clone(),
            };
            let path = checkpoints.save(&record)?;
            tracing::info!("Saved checkpoint '{}'", path.display());
        }
    }

    // DONE — the final checkpoint was written at total_steps
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::data::corpus::tests::test_specials;
    use crate::data::corpus::TokenCorpusIndex;
    use crate::domain::traits::StepLosses;

    /// Scripted stepper that counts the steps it executes.
    #[derive(Default)]
    struct CountingStepper {
        forwards: usize,
        updates: usize,
    }

    impl PretrainStepper for CountingStepper {
        fn forward(&mut self, batch: &PretrainBatch, _: bool) -> Result<StepLosses> {
            assert!(batch.batch_size() > 0);
            self.forwards += 1;
            Ok(StepLosses { nsp: 0.7, mlm: 2.3 })
        }
        fn backward(&mut self, _: f32) -> Result<bool> {
            Ok(true)
        }
        fn apply_update(&mut self, _: f32) -> Result<()> {
            self.updates += 1;
            Ok(())
        }
        fn model_state(&self) -> Result<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }
        fn optimizer_state(&self) -> Result<Vec<u8>> {
            Ok(vec![4, 5])
        }
        fn load_model_state(&mut self, bytes: &[u8]) -> Result<()> {
            assert_eq!(bytes, &[1, 2, 3]);
            Ok(())
        }
        fn load_optimizer_state(&mut self, bytes: &[u8]) -> Result<()> {
            assert_eq!(bytes, &[4, 5]);
            Ok(())
        }
    }

    struct NoMasking;
    impl MaskingPolicy for NoMasking {
        fn apply(&self, token_ids: &[Vec<u32>]) -> Vec<Vec<u32>> {
            token_ids.to_vec()
        }
    }

    fn test_dataset() -> PretrainDataset {
        let corpus = TokenCorpusIndex::from_parts(
            vec![vec![5, 6], vec![7, 6], vec![8, 9]],
            vec![0, 0, 0],
            test_specials(),
        );
        PretrainDataset::new(Arc::new(corpus), 8)
    }

    fn test_config(ckpt_dir: &std::path::Path) -> PretrainConfig {
        PretrainConfig {
            checkpoint_dir: ckpt_dir.to_str().unwrap().to_string(),
            batch_size: 2,
            max_len: 8,
            // 5 steps of 2 × 8 tokens
            token_budget: 80,
            // checkpoint every 2 steps
            ckpt_samples: 4,
            n_workers: 1,
            mixed_precision: false,
            resume_checkpoint: None,
            ..PretrainConfig::default()
        }
    }

    #[test]
    fn step_budget_matches_published_recipe() {
        assert_eq!(total_steps(256 * 512 * 1_000_000, 256, 512), 1_000_000);
        assert_eq!(total_steps(256 * 512 * 1_000_000, 128, 512), 2_000_000);
        assert_eq!(save_interval(100_000, 256), 390);
        assert_eq!(save_interval(1, 256), 1);
    }

    #[test]
    fn runs_to_the_step_budget_cycling_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        let mut stepper = CountingStepper::default();
        let manager = CheckpointManager::new(dir.path(), "bookish").unwrap();

        // 3 examples at batch_size 2 → 2 batches per pass; 5
        // steps force at least two stream restarts
        run_pretraining(&cfg, test_dataset(), &NoMasking, &mut stepper, manager).unwrap();

        assert_eq!(stepper.forwards, 5);
        assert_eq!(stepper.updates, 5);

        // Saves happened at steps 2, 4 and 5; only the final file
        // survives rotation
        let files: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|name| name.ends_with(".ckpt"))
            .collect();
        assert_eq!(files, vec!["bookish_step_5.ckpt"]);

        let record = CheckpointManager::load(&dir.path().join("bookish_step_5.ckpt")).unwrap();
        assert_eq!(record.step, 5);
    }

    #[test]
    fn resume_executes_only_the_remaining_steps() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = test_config(dir.path());

        // Write a checkpoint as if a previous run stopped at 3
        let mut manager = CheckpointManager::new(dir.path(), "bookish").unwrap();
        let saved = manager
            .save(&CheckpointRecord {
                step: 3,
                model: vec![1, 2, 3],
                optimizer: vec![4, 5],
                scaler: crate::ml::scaler::GradScalerState::default(),
            })
            .unwrap();
        cfg.resume_checkpoint = Some(saved.to_str().unwrap().to_string());

        let mut stepper = CountingStepper::default();
        let manager = CheckpointManager::new(dir.path(), "bookish").unwrap();
        run_pretraining(&cfg, test_dataset(), &NoMasking, &mut stepper, manager).unwrap();

        // Steps 4 and 5 only
        assert_eq!(stepper.forwards, 2);

        // The resumed-from file was rotated out by the next save
        assert!(!saved.exists());
        assert!(dir.path().join("bookish_step_5.ckpt").exists());
    }

    #[test]
    fn malformed_checkpoint_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bookish_step_9.ckpt");
        std::fs::write(&bogus, b"xx").unwrap();

        let mut cfg = test_config(dir.path());
        cfg.resume_checkpoint = Some(bogus.to_str().unwrap().to_string());

        let mut stepper = CountingStepper::default();
        let manager = CheckpointManager::new(dir.path(), "bookish").unwrap();
        let result = run_pretraining(&cfg, test_dataset(), &NoMasking, &mut stepper, manager);
        assert!(result.is_err());
        assert_eq!(stepper.forwards, 0);
    }
}
