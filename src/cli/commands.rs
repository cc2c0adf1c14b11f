// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands and their flags. Directory flags can
// also be set through the environment:
//
//   TEMP_FEEL_DATA_DIR    (default: data)
//   TEMP_FEEL_MODELS_DIR  (default: models)
//   TEMP_FEEL_BIND        (default: 0.0.0.0:8080)
//
// Each Args struct converts into the matching application config;
// the application layer never sees clap types.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::{
    export_use_case::{default_models, ExportConfig},
    parse_use_case::ParseConfig,
    pipeline_use_case::PipelineConfig,
    reduce_use_case::ReduceConfig,
    train_use_case::{TrainConfig, TrainTarget},
};
use crate::ml::autoencoder::AutoencoderTraining;
use crate::service::ServeConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse raw notes into records and append them to the cleaned table
    Parse(ParseArgs),

    /// Fit the clothing reducer and write the computed feature table
    Reduce(ReduceArgs),

    /// Train the random forests with grid search
    Train(TrainArgs),

    /// Export the latest models to ONNX
    Export(ExportArgs),

    /// Run parse, reduce, train and export in order
    Pipeline(PipelineArgs),

    /// Serve predictions over HTTP
    Serve(ServeArgs),
}

// ─── Shared Flags ─────────────────────────────────────────────────────────────

#[derive(Args, Debug, Clone)]
pub struct DataDirArg {
    /// Directory holding raw_data.txt and the CSV tables
    #[arg(long, env = "TEMP_FEEL_DATA_DIR", default_value = "data")]
    pub data_dir: String,
}

#[derive(Args, Debug, Clone)]
pub struct ModelsDirArg {
    /// Directory holding versioned models and scaler files
    #[arg(long, env = "TEMP_FEEL_MODELS_DIR", default_value = "models")]
    pub models_dir: String,
}

/// Autoencoder hyperparameters
#[derive(Args, Debug, Clone)]
pub struct AutoencoderArgs {
    /// Full passes over the clothing rows
    #[arg(long, default_value_t = 300)]
    pub epochs: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 5e-4)]
    pub lr: f64,

    /// Hidden layer widths between the input and the 1-unit bottleneck
    #[arg(long, value_delimiter = ',', default_value = "32,16,8,4")]
    pub hidden: Vec<usize>,

    #[arg(long = "ae-seed", default_value_t = 42)]
    pub seed: u64,
}

impl From<AutoencoderArgs> for AutoencoderTraining {
    fn from(a: AutoencoderArgs) -> Self {
        AutoencoderTraining {
            hidden:     a.hidden,
            epochs:     a.epochs,
            batch_size: a.batch_size,
            lr:         a.lr,
            seed:       a.seed,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetArg {
    Feels,
    Hr,
    Clothing,
}

impl From<TargetArg> for TrainTarget {
    fn from(t: TargetArg) -> Self {
        match t {
            TargetArg::Feels    => TrainTarget::Feels,
            TargetArg::Hr       => TrainTarget::Hr,
            TargetArg::Clothing => TrainTarget::Clothing,
        }
    }
}

fn targets(args: Vec<TargetArg>) -> Vec<TrainTarget> {
    if args.is_empty() {
        TrainTarget::ALL.to_vec()
    } else {
        args.into_iter().map(Into::into).collect()
    }
}

// ─── parse ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ParseArgs {
    #[command(flatten)]
    pub data: DataDirArg,

    /// Rows shown in the logged preview
    #[arg(long, default_value_t = 5)]
    pub preview_rows: usize,

    /// Only write extracted_data.csv; leave the cleaned table alone
    #[arg(long)]
    pub no_ingest: bool,

    /// Empty raw_data.txt once its rows are in the cleaned table
    #[arg(long)]
    pub clear_notes: bool,
}

impl From<ParseArgs> for ParseConfig {
    fn from(a: ParseArgs) -> Self {
        ParseConfig {
            data_dir:     a.data.data_dir,
            preview_rows: a.preview_rows,
            ingest:       !a.no_ingest,
            clear_notes:  a.clear_notes,
        }
    }
}

// ─── reduce ───────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ReduceArgs {
    #[command(flatten)]
    pub data: DataDirArg,

    #[command(flatten)]
    pub models: ModelsDirArg,

    #[command(flatten)]
    pub autoencoder: AutoencoderArgs,
}

impl From<ReduceArgs> for ReduceConfig {
    fn from(a: ReduceArgs) -> Self {
        ReduceConfig {
            data_dir:    a.data.data_dir,
            models_dir:  a.models.models_dir,
            autoencoder: a.autoencoder.into(),
        }
    }
}

// ─── train ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DataDirArg,

    #[command(flatten)]
    pub models: ModelsDirArg,

    /// Models to train (repeatable); all three when omitted
    #[arg(long = "target", value_enum)]
    pub targets: Vec<TargetArg>,

    /// Seed for the split, the CV folds and the forests
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:   a.data.data_dir,
            models_dir: a.models.models_dir,
            targets:    targets(a.targets),
            seed:       a.seed,
        }
    }
}

// ─── export ───────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub models: ModelsDirArg,

    /// Model names to export (repeatable); every known model when omitted
    #[arg(long = "model")]
    pub names: Vec<String>,
}

impl From<ExportArgs> for ExportConfig {
    fn from(a: ExportArgs) -> Self {
        ExportConfig {
            models_dir: a.models.models_dir,
            models:     if a.names.is_empty() { default_models() } else { a.names },
        }
    }
}

// ─── pipeline ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct PipelineArgs {
    #[command(flatten)]
    pub data: DataDirArg,

    #[command(flatten)]
    pub models: ModelsDirArg,

    #[command(flatten)]
    pub autoencoder: AutoencoderArgs,

    #[arg(long = "target", value_enum)]
    pub targets: Vec<TargetArg>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long)]
    pub clear_notes: bool,
}

impl From<PipelineArgs> for PipelineConfig {
    fn from(a: PipelineArgs) -> Self {
        PipelineConfig {
            data_dir:    a.data.data_dir,
            models_dir:  a.models.models_dir,
            clear_notes: a.clear_notes,
            autoencoder: a.autoencoder.into(),
            targets:     targets(a.targets),
            seed:        a.seed,
        }
    }
}

// ─── serve ────────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub models: ModelsDirArg,

    /// Address to listen on
    #[arg(long, env = "TEMP_FEEL_BIND", default_value = "0.0.0.0:8080")]
    pub bind: String,
}

impl From<ServeArgs> for ServeConfig {
    fn from(a: ServeArgs) -> Self {
        ServeConfig {
            models_dir: a.models.models_dir,
            bind:       a.bind,
        }
    }
}
