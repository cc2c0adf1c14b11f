// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to run one stage of
// the batch pipeline:
//
//   parse    raw_data.txt      → extracted_data.csv → cleaned_data.csv
//   reduce   cleaned_data.csv  → computed_data.csv + reducer models
//   train    computed_data.csv → feels / hr / clothing forests
//   export   persisted models  → model.onnx per model
//   pipeline all four, in order
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

use std::path::{Path, PathBuf};

/// Free-text notes, one observation per line
pub const RAW_NOTES_FILE: &str = "raw_data.txt";
/// Records parsed by the most recent `parse` run (staging)
pub const EXTRACTED_FILE: &str = "extracted_data.csv";
/// Every record ever ingested
pub const CLEANED_FILE:   &str = "cleaned_data.csv";
/// Reduced feature table the forests are trained on
pub const COMPUTED_FILE:  &str = "computed_data.csv";

pub fn data_path(data_dir: &str, file: &str) -> PathBuf {
    Path::new(data_dir).join(file)
}

/// Notes → records → cleaned table
pub mod parse_use_case;

/// Clothing feature reduction
pub mod reduce_use_case;

/// Forest training with grid search
pub mod train_use_case;

/// ONNX export of persisted models
pub mod export_use_case;

/// All stages end to end
pub mod pipeline_use_case;

/// Shared on-disk fixtures for the use-case and service tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::{
        fs,
        path::{Path, PathBuf},
    };

    use super::{
        parse_use_case::{ParseConfig, ParseUseCase},
        reduce_use_case::{ReduceConfig, ReduceUseCase},
        train_use_case::TrainConfig,
        RAW_NOTES_FILE,
    };
    use crate::ml::autoencoder::AutoencoderTraining;

    pub const NOTES: &str = "\
cot S 18 95 warm
poly l L 10 100 cool
poly d T -5 120 sun cold
dress 25 85 hot
cot s F 2 110 headwind cold
poly f D -12 130 cool
cot S 22 90 hot
poly l T 6 105 light rain cool
dress 28 80 sun hot
cot d F -8 125 cold
poly s L 14 98 warm
cot f T 0 115 heavy snow cold
dress S 30 78 sun hot
poly l L 12 102 no sun cool
cot d D -15 135 fatigue cold
poly s S 20 92 warm
";
    pub const NOTE_LINES: usize = 16;

    /// A data directory and a models directory under one root.
    pub struct Workspace {
        pub data:   PathBuf,
        pub models: PathBuf,
    }

    impl Workspace {
        /// Notes written and parsed into cleaned_data.csv
        pub fn parsed(root: &Path) -> Self {
            let ws = Self { data: root.join("data"), models: root.join("models") };
            fs::create_dir_all(&ws.data).unwrap();
            fs::write(ws.data.join(RAW_NOTES_FILE), NOTES).unwrap();
            ParseUseCase::new(ParseConfig { data_dir: ws.data_dir(), ..ParseConfig::default() })
                .execute()
                .unwrap();
            ws
        }

        /// Parsed and reduced: computed_data.csv and the reducer models exist
        pub fn reduced(root: &Path) -> Self {
            let ws = Self::parsed(root);
            ReduceUseCase::new(ws.reduce_config()).execute().unwrap();
            ws
        }

        pub fn data_dir(&self) -> String {
            self.data.to_string_lossy().into_owned()
        }

        pub fn models_dir(&self) -> String {
            self.models.to_string_lossy().into_owned()
        }

        pub fn reduce_config(&self) -> ReduceConfig {
            ReduceConfig {
                data_dir:    self.data_dir(),
                models_dir:  self.models_dir(),
                autoencoder: AutoencoderTraining { epochs: 10, ..AutoencoderTraining::default() },
            }
        }

        pub fn train_config(&self) -> TrainConfig {
            TrainConfig {
                data_dir:   self.data_dir(),
                models_dir: self.models_dir(),
                ..TrainConfig::default()
            }
        }
    }
}
