//! Pipeline constants and the paths derived from them.
//!
//! Everything is fixed at compile time except the project root and the DVC
//! executable, which can be redirected through `MODEL_PIPELINE_ROOT` and
//! `MODEL_PIPELINE_DVC` for tests or unusual installs.

use std::path::PathBuf;

use crate::random_forest::RandomForestBuilder;

pub const ROOT_ENV: &str = "MODEL_PIPELINE_ROOT";
pub const DVC_ENV: &str = "MODEL_PIPELINE_DVC";

pub const MODELS_DIR: &str = "models";
pub const MODEL_FILE: &str = "model.pkl";
pub const METADATA_FILE: &str = "model_metadata.txt";
pub const DVC_DIR: &str = ".dvc";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
	/// Directory holding `.dvc/` and `models/`.
	pub root: PathBuf,
	pub dvc_program: String,
	pub test_fraction: f64,
	/// Seeds the train/test split. The forest carries its own seed.
	pub split_seed: u64,
	pub forest: RandomForestBuilder,
	/// Dataset row used for the reload check.
	pub probe_sample: usize,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			root: PathBuf::from("."),
			dvc_program: "dvc".to_string(),
			test_fraction: 0.2,
			split_seed: 42,
			forest: RandomForestBuilder {
				n_trees: 100,
				max_depth: 3,
				bag_amount: 1.0,
				seed: 42,
			},
			probe_sample: 0,
		}
	}
}

impl PipelineConfig {
	pub fn from_env() -> Self {
		let mut config = Self::default();
		if let Ok(root) = std::env::var(ROOT_ENV) {
			config.root = PathBuf::from(root);
		}
		if let Ok(program) = std::env::var(DVC_ENV) {
			config.dvc_program = program;
		}
		config
	}

	/// Points the pipeline at `root`, keeping every other default.
	pub fn with_root(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			..Self::default()
		}
	}

	pub fn models_dir(&self) -> PathBuf {
		self.root.join(MODELS_DIR)
	}

	pub fn model_path(&self) -> PathBuf {
		self.models_dir().join(MODEL_FILE)
	}

	/// Sidecar DVC writes next to the model once it is tracked.
	pub fn tracking_path(&self) -> PathBuf {
		self.models_dir().join(format!("{MODEL_FILE}.dvc"))
	}

	pub fn metadata_path(&self) -> PathBuf {
		self.models_dir().join(METADATA_FILE)
	}

	pub fn dvc_dir(&self) -> PathBuf {
		self.root.join(DVC_DIR)
	}

	/// Model path as handed to `dvc add`, relative to the root.
	pub fn model_relative_path(&self) -> String {
		format!("{MODELS_DIR}/{MODEL_FILE}")
	}
}
