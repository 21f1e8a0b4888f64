//! Reading and writing the model file and its metadata sidecar.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::process::Command;

use time::{OffsetDateTime, format_description::FormatItem, macros::format_description};

use crate::classifier::Classifier;
use crate::error::PipelineError;
use crate::random_forest::RandomForestClassifier;

/// Writes `model` to `path` and returns the size of the written file.
pub fn save(model: &RandomForestClassifier, path: &Path) -> Result<u64, PipelineError> {
	let write_err = |source: std::io::Error| PipelineError::WriteModel {
		path: path.to_path_buf(),
		source,
	};

	let file = File::create(path).map_err(write_err)?;
	let mut writer = BufWriter::new(file);
	model.serialize(&mut writer).map_err(write_err)?;
	writer.flush().map_err(write_err)?;
	drop(writer);

	if !path.exists() {
		return Err(PipelineError::ArtifactMissing(path.to_path_buf()));
	}

	fs::metadata(path)
		.map(|meta| meta.len())
		.map_err(|_| PipelineError::ArtifactMissing(path.to_path_buf()))
}

pub fn load(path: &Path) -> Result<RandomForestClassifier, PipelineError> {
	let load_err = |source: std::io::Error| PipelineError::LoadModel {
		path: path.to_path_buf(),
		source,
	};

	let file = File::open(path).map_err(load_err)?;
	RandomForestClassifier::deserialize(&mut BufReader::new(file)).map_err(load_err)
}

/// Loads the model at `path` and checks it takes rows of `features` values.
pub fn load_for(path: &Path, features: usize) -> Result<RandomForestClassifier, PipelineError> {
	let model = load(path)?;
	if model.features_len() != features {
		return Err(PipelineError::FeatureMismatch {
			path: path.to_path_buf(),
			expected: model.features_len(),
			found: features,
		});
	}

	Ok(model)
}

/// Descriptive facts recorded next to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
	pub model: String,
	pub accuracy: f64,
	pub dataset: String,
	pub date: String,
	pub features: usize,
	pub classes: usize,
}

impl fmt::Display for Metadata {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "Model: {}", self.model)?;
		writeln!(f, "Accuracy: {:.4}", self.accuracy)?;
		writeln!(f, "Dataset: {}", self.dataset)?;
		writeln!(f, "Date: {}", self.date)?;
		writeln!(f, "Features: {}", self.features)?;
		writeln!(f, "Classes: {}", self.classes)
	}
}

pub fn write_metadata(metadata: &Metadata, path: &Path) -> Result<(), PipelineError> {
	fs::write(path, metadata.to_string()).map_err(|source| PipelineError::WriteMetadata {
		path: path.to_path_buf(),
		source,
	})
}

/// Output of the system `date` command, or the local clock if it cannot run.
pub fn timestamp() -> String {
	match Command::new("date").output() {
		Ok(output) if output.status.success() => {
			let date = String::from_utf8_lossy(&output.stdout).trim().to_string();
			if !date.is_empty() {
				return date;
			}
		},
		Ok(output) => tracing::debug!("date exited with {}", output.status),
		Err(err) => tracing::debug!("Could not run date: {}", err),
	}

	clock_timestamp(OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()))
}

fn clock_timestamp(now: OffsetDateTime) -> String {
	const FORMAT: &[FormatItem<'_>] =
		format_description!("[year]-[month]-[day] [hour]:[minute]:[second] [offset_hour sign:mandatory]:[offset_minute]");
	now.format(FORMAT).unwrap_or_else(|_| now.unix_timestamp().to_string())
}
