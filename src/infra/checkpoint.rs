// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists training progress as a single bincode record:
//
//   { step, model blob, optimizer blob, scaler state }
//
// File naming: {checkpoint_dir}/{corpus_name}_step_{step}.ckpt
//
// Rotation invariant: after any successful save exactly one
// checkpoint file exists. The previous file is deleted only
// AFTER the new write returned successfully — a write that dies
// halfway must leave the old recovery point untouched, otherwise
// a crash could strand the run with zero usable checkpoints.
//
// Malformed contents on load are fatal; there is no partial
// recovery of a half-readable record.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PretrainError;
use crate::ml::scaler::GradScalerState;

/// The durable snapshot of one training run.
/// Model and optimizer contents are opaque to this layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub step: usize,
    pub model: Vec<u8>,
    pub optimizer: Vec<u8>,
    pub scaler: GradScalerState,
}

pub struct CheckpointManager {
    dir: PathBuf,
    corpus_name: String,

    /// The file superseded by the next successful save. Mutated
    /// only by the training thread.
    previous: Option<PathBuf>,
}

impl CheckpointManager {
    /// Create a manager rooted at `dir`, creating it if needed.
    pub fn new(dir: impl AsRef<Path>, corpus_name: &str) -> Result<Self, PretrainError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, corpus_name: corpus_name.to_string(), previous: None })
    }

    fn path_for_step(&self, step: usize) -> PathBuf {
        self.dir.join(format!("{}_step_{}.ckpt", self.corpus_name, step))
    }

    /// Write a new checkpoint, then rotate the previous one out.
    /// On a failed write the previous file is left untouched.
    pub fn save(&mut self, record: &CheckpointRecord) -> Result<PathBuf, PretrainError> {
        let path = self.path_for_step(record.step);
        let bytes = bincode::serialize(record)?;
        fs::write(&path, bytes)?;

        if let Some(previous) = self.previous.take() {
            if previous != path {
                if let Err(e) = fs::remove_file(&previous) {
                    // The new checkpoint is already authoritative;
                    // a stale leftover is not worth aborting for
                    tracing::warn!("Could not remove old checkpoint '{}': {e}", previous.display());
                }
            }
        }
        self.previous = Some(path.clone());
        Ok(path)
    }

    /// Read a checkpoint record back. Any decode failure is
    /// fatal to resumption.
    pub fn load(path: &Path) -> Result<CheckpointRecord, PretrainError> {
        let bytes = fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Mark an existing file (the one we resumed from) for
    /// rotation at the next save.
    pub fn adopt(&mut self, path: PathBuf) {
        self.previous = Some(path);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn record(step: usize) -> CheckpointRecord {
        CheckpointRecord {
            step,
            model: vec![10, 20, 30],
            optimizer: vec![40],
            scaler: GradScalerState::default(),
        }
    }

    fn ckpt_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n.ends_with(".ckpt"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::new(dir.path(), "bookcorpus").unwrap();

        let path = manager.save(&record(7)).unwrap();
        assert_eq!(path, dir.path().join("bookcorpus_step_7.ckpt"));

        let loaded = CheckpointManager::load(&path).unwrap();
        assert_eq!(loaded.step, 7);
        assert_eq!(loaded.model, vec![10, 20, 30]);
        assert_eq!(loaded.optimizer, vec![40]);
        assert_eq!(loaded.scaler, GradScalerState::default());
    }

    #[test]
    fn rotation_keeps_exactly_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::new(dir.path(), "bookcorpus").unwrap();

        manager.save(&record(1)).unwrap();
        assert_eq!(ckpt_files(dir.path()), vec!["bookcorpus_step_1.ckpt"]);

        manager.save(&record(2)).unwrap();
        assert_eq!(ckpt_files(dir.path()), vec!["bookcorpus_step_2.ckpt"]);

        manager.save(&record(3)).unwrap();
        assert_eq!(ckpt_files(dir.path()), vec!["bookcorpus_step_3.ckpt"]);
    }

    #[test]
    fn failed_write_preserves_the_previous_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = CheckpointManager::new(dir.path(), "bookcorpus").unwrap();
        manager.save(&record(1)).unwrap();

        // Occupy the next path with a directory so the write fails
        fs::create_dir(dir.path().join("bookcorpus_step_2.ckpt")).unwrap();
        assert!(manager.save(&record(2)).is_err());

        // Step 1 must still be loadable
        let survivor = dir.path().join("bookcorpus_step_1.ckpt");
        assert_eq!(CheckpointManager::load(&survivor).unwrap().step, 1);
    }

    #[test]
    fn adopted_checkpoint_is_rotated_by_the_next_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = CheckpointManager::new(dir.path(), "bookcorpus").unwrap();
        let old = first.save(&record(5)).unwrap();

        let mut resumed = CheckpointManager::new(dir.path(), "bookcorpus").unwrap();
        resumed.adopt(old.clone());
        resumed.save(&record(6)).unwrap();

        assert!(!old.exists());
        assert_eq!(ckpt_files(dir.path()), vec!["bookcorpus_step_6.ckpt"]);
    }

    #[test]
    fn malformed_record_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookcorpus_step_1.ckpt");
        fs::write(&path, b"xx").unwrap();

        let err = CheckpointManager::load(&path);
        assert!(matches!(err, Err(PretrainError::Serialization(_))));
    }
}
