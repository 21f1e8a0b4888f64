//! Health checks run by the `verify` binary against a finished pipeline run.
//!
//! Each check is independent: a failing check is logged and the rest still
//! run. Missing DVC tracking and missing metadata are reported but tolerated.

use std::fs;
use std::time::Instant;

use crate::artifact;
use crate::classifier::Classifier;
use crate::config::PipelineConfig;
use crate::error::CheckError;
use crate::iris;
use crate::versioning::Dvc;

/// Lowest accuracy over the full dataset that still counts as working.
pub const MIN_ACCURACY: f64 = 0.8;

pub type CheckFn = fn(&PipelineConfig) -> Result<(), CheckError>;

pub const CHECKS: [(&str, CheckFn); 6] = [
	("Environment", check_environment),
	("Model exists", check_model_exists),
	("Model functionality", check_model_functionality),
	("DVC integration", check_dvc_integration),
	("Metadata", check_metadata),
	("Performance", check_performance),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSummary {
	pub passed: usize,
	pub total: usize,
}

impl CheckSummary {
	pub fn all_passed(&self) -> bool {
		self.passed == self.total
	}
}

pub fn run_all(config: &PipelineConfig) -> CheckSummary {
	let mut passed = 0;

	for (name, check) in CHECKS.iter() {
		tracing::info!("Checking {} ...", name.to_lowercase());
		match check(config) {
			Ok(()) => {
				tracing::info!("Check passed: {}", name);
				passed += 1;
			},
			Err(err) => tracing::error!("Check failed: {}: {}", name, err),
		}
	}

	CheckSummary {
		passed,
		total: CHECKS.len(),
	}
}

pub fn check_environment(config: &PipelineConfig) -> Result<(), CheckError> {
	tracing::info!("{}: {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
	match Dvc::new(&config.dvc_program, &config.root).version() {
		Ok(version) => tracing::info!("DVC: {}", version),
		Err(err) => tracing::warn!("DVC unavailable: {}", err),
	}

	let models_dir = config.models_dir();
	if !models_dir.is_dir() {
		return Err(CheckError::MissingDirectory(models_dir));
	}

	tracing::info!("Environment configured");
	Ok(())
}

pub fn check_model_exists(config: &PipelineConfig) -> Result<(), CheckError> {
	let model_path = config.model_path();
	let meta = fs::metadata(&model_path).map_err(|_| CheckError::MissingModel(model_path.clone()))?;

	tracing::info!("Model found ({} bytes)", meta.len());
	Ok(())
}

pub fn check_model_functionality(config: &PipelineConfig) -> Result<(), CheckError> {
	let builder = iris::load_iris();
	let model = artifact::load_for(&config.model_path(), builder.features_len())?;
	tracing::info!("Model loaded");
	let accuracy = builder.build().evaluate(&model);
	tracing::info!("Accuracy on full dataset: {:.4}", accuracy);

	if accuracy < MIN_ACCURACY {
		return Err(CheckError::LowAccuracy {
			accuracy,
			threshold: MIN_ACCURACY,
		});
	}

	if let Some(sample) = builder.row(config.probe_sample) {
		tracing::info!("Sample prediction: {}", model.predict(&sample));
		tracing::info!("Probabilities: {:?}", model.predict_proba(&sample));
	}

	Ok(())
}

pub fn check_dvc_integration(config: &PipelineConfig) -> Result<(), CheckError> {
	let tracking_path = config.tracking_path();
	if tracking_path.exists() {
		tracing::info!("DVC file found: {}", tracking_path.display());
	} else {
		tracing::warn!("DVC file not found: {}", tracking_path.display());
		tracing::warn!("This is expected when DVC is not configured");
	}

	Ok(())
}

pub fn check_metadata(config: &PipelineConfig) -> Result<(), CheckError> {
	let metadata_path = config.metadata_path();
	if !metadata_path.exists() {
		tracing::warn!("Metadata not found: {}", metadata_path.display());
		return Ok(());
	}

	let content = fs::read_to_string(&metadata_path).map_err(|source| CheckError::Read {
		path: metadata_path.clone(),
		source,
	})?;
	tracing::info!("Metadata found:");
	for line in content.trim().lines() {
		tracing::info!("   {}", line);
	}

	Ok(())
}

pub fn check_performance(config: &PipelineConfig) -> Result<(), CheckError> {
	let builder = iris::load_iris();
	let dataset = builder.build();

	let start = Instant::now();
	let model = artifact::load_for(&config.model_path(), builder.features_len())?;
	let load_time = start.elapsed();

	let start = Instant::now();
	let predictions = dataset.classify(&model);
	let prediction_time = start.elapsed();

	tracing::info!("Load time: {:.4}s", load_time.as_secs_f64());
	tracing::info!("Prediction time: {:.4}s", prediction_time.as_secs_f64());
	tracing::info!(
		"Predictions per second: {:.0}",
		predictions.len() as f64 / prediction_time.as_secs_f64().max(f64::EPSILON),
	);

	Ok(())
}
