// ============================================================
// Error Taxonomy
// ============================================================
// Fatal error categories for the pretraining pipeline:
//
//   Io            — corpus directory/file unreadable, checkpoint
//                   path unwritable. Aborts startup.
//   Tokenizer     — vocabulary missing a required special token,
//                   or encoding failed on malformed text.
//   Serialization — checkpoint record cannot be encoded/decoded.
//                   No partial-state recovery is attempted.
//
// Batch-stream exhaustion is deliberately NOT in this taxonomy:
// it is expected steady-state behaviour and the training loop
// handles it by restarting the stream.
//
// The application layer wraps these in anyhow::Result; there is
// no retry policy in this core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PretrainError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("checkpoint serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}
