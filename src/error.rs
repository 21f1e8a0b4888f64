//! Fatal pipeline and check errors.

use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
	/// Failed to create a directory the pipeline writes into.
	#[error("Failed to create directory {path}: {source}")]
	CreateDir {
		path: PathBuf,
		source: std::io::Error,
	},
	/// Failed to write the serialized model.
	#[error("Failed to write model to {path}: {source}")]
	WriteModel {
		path: PathBuf,
		source: std::io::Error,
	},
	/// The model file is absent right after it was written.
	#[error("Model was not saved to {0}")]
	ArtifactMissing(PathBuf),
	/// Failed to open or decode the serialized model.
	#[error("Failed to load model from {path}: {source}")]
	LoadModel {
		path: PathBuf,
		source: std::io::Error,
	},
	/// Failed to write the metadata sidecar.
	#[error("Failed to write metadata to {path}: {source}")]
	WriteMetadata {
		path: PathBuf,
		source: std::io::Error,
	},
	/// The model expects a different number of features than the data has.
	#[error("Model at {path} expects {expected} features, the data has {found}")]
	FeatureMismatch {
		path: PathBuf,
		expected: usize,
		found: usize,
	},
	/// The bundled dataset has no row to run the reload check on.
	#[error("Dataset has no sample {0}")]
	MissingSample(usize),
}

/// Reasons a health check in the `verify` binary did not pass.
#[derive(Debug, Error)]
pub enum CheckError {
	#[error("Directory {0} does not exist")]
	MissingDirectory(PathBuf),
	#[error("Model not found at {0}")]
	MissingModel(PathBuf),
	#[error("Accuracy {accuracy:.4} is below the {threshold} threshold")]
	LowAccuracy { accuracy: f64, threshold: f64 },
	#[error("Failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error(transparent)]
	Pipeline(#[from] PipelineError),
}
