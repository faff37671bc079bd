// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for user interaction. Parses arguments with clap
// and dispatches to the application layer; it routes, it never
// computes.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PretrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "bert-pretrain",
    version,
    about = "MLM/NSP pretraining: corpus sampling, sequence packing, and a resumable training loop."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Pretrain(args) => Self::run_pretrain(args),
        }
    }

    fn run_pretrain(args: PretrainArgs) -> Result<()> {
        use crate::application::pretrain_use_case::PretrainUseCase;

        tracing::info!("Pretraining on corpus: {}", args.corpus_dir);
        let use_case = PretrainUseCase::new(args.into());
        use_case.execute()?;

        println!("Pretraining complete.");
        Ok(())
    }
}
