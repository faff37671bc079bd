// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// One subcommand: `pretrain`. Only the corpus directory and the
// batch size are exposed on the command line; every other
// parameter comes from the static PretrainConfig defaults.

use clap::{Args, Subcommand};

use crate::application::pretrain_use_case::PretrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run MLM/NSP pretraining over a directory of text files
    Pretrain(PretrainArgs),
}

#[derive(Args, Debug)]
pub struct PretrainArgs {
    /// Directory of plain-text corpus files, one sentence or
    /// paragraph per line
    #[arg(long, default_value = "data/corpus")]
    pub corpus_dir: String,

    /// Sequences per optimization step
    #[arg(long, default_value_t = 256)]
    pub batch_size: usize,
}

/// The boundary between Layer 1 and Layer 2: the application
/// layer never sees clap types.
impl From<PretrainArgs> for PretrainConfig {
    fn from(args: PretrainArgs) -> Self {
        PretrainConfig {
            corpus_dir: args.corpus_dir,
            batch_size: args.batch_size,
            ..PretrainConfig::default()
        }
    }
}
