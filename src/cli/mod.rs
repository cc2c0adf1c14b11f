// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. clap parses the command
// line; every subcommand hands a config to one use case.
//
//   parse    — raw notes → extracted / cleaned tables
//   reduce   — clothing reducer + computed table
//   train    — feels / hr / clothing forests
//   export   — model.onnx for the latest versions
//   pipeline — parse, reduce, train, export
//   serve    — HTTP inference service
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::Commands;

use crate::application::{
    export_use_case::ExportUseCase, parse_use_case::ParseUseCase,
    pipeline_use_case::PipelineUseCase, reduce_use_case::ReduceUseCase,
    train_use_case::TrainUseCase,
};

#[derive(Parser, Debug)]
#[command(
    name = "temp-feel",
    version,
    about = "Parse activity notes, train thermal-comfort models and serve predictions."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route the subcommand to its use case. Nothing is computed here.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Parse(args) => {
                let report = ParseUseCase::new(args.into()).execute()?;
                println!("Parsed {} records, appended {} to the cleaned table.", report.parsed, report.ingested);
            }
            Commands::Reduce(args) => {
                let report = ReduceUseCase::new(args.into()).execute()?;
                println!(
                    "Reduced {} rows. clothing_encoder {} (r={:.3}), clothing_pca {} (r={:.3}).",
                    report.rows,
                    report.encoder_version,
                    report.upper.correlation,
                    report.pca_version,
                    report.lower.correlation,
                );
                if let Some(loss) = report.final_loss {
                    println!("Autoencoder reconstruction loss {loss:.6}.");
                }
            }
            Commands::Train(args) => {
                for r in TrainUseCase::new(args.into()).execute()? {
                    println!("{:<9} {}  {} = {:.4}", r.model, r.version, r.metric, r.test_score);
                }
            }
            Commands::Export(args) => {
                for r in ExportUseCase::new(args.into()).execute()? {
                    println!("{:<17} {}  {}", r.model, r.version, r.path.display());
                }
            }
            Commands::Pipeline(args) => {
                PipelineUseCase::new(args.into()).execute()?;
                println!("Pipeline complete.");
            }
            Commands::Serve(args) => {
                crate::service::serve(args.into())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{TrainConfig, TrainTarget};
    use crate::service::ServeConfig;

    #[test]
    fn test_train_args_convert() {
        let cli = Cli::try_parse_from(["temp-feel", "train", "--target", "hr", "--seed", "7", "--models-dir", "m"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.targets, vec![TrainTarget::Hr]);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.models_dir, "m");
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["temp-feel", "serve", "--bind", "127.0.0.1:9000"]).unwrap();
        let Commands::Serve(args) = cli.command else { panic!("expected serve") };
        let cfg: ServeConfig = args.into();
        assert_eq!(cfg.bind, "127.0.0.1:9000");

        let cli = Cli::try_parse_from(["temp-feel", "reduce", "--hidden", "8,4", "--epochs", "3"]).unwrap();
        let Commands::Reduce(args) = cli.command else { panic!("expected reduce") };
        assert_eq!(args.autoencoder.hidden, vec![8, 4]);
        assert_eq!(args.autoencoder.epochs, 3);
    }
}
