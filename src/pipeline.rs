//! The four pipeline stages: setup, training, persistence, verification.

use std::fs;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::artifact::{self, Metadata};
use crate::classifier::Classifier;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::iris;
use crate::metrics::{ClassificationReport, ConfusionMatrix};
use crate::random_forest::RandomForestClassifier;
use crate::versioning::{Dvc, Outcome};

pub const MODEL_NAME: &str = "RandomForestClassifier";

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
	pub train_samples: usize,
	pub test_samples: usize,
	pub accuracy: f64,
	pub report: ClassificationReport,
	pub importances: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
	pub size: u64,
	/// False when DVC was unavailable or refused the file.
	pub tracked: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
	pub prediction: f64,
	pub probabilities: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
	pub training: TrainingReport,
	pub saved: SaveOutcome,
	pub verification: Verification,
}

/// Makes sure `.dvc/` and `models/` exist. Only the directory is fatal.
pub fn setup_environment(config: &PipelineConfig) -> Result<(), PipelineError> {
	let dvc = Dvc::new(&config.dvc_program, &config.root);
	match dvc.init(&config.dvc_dir()) {
		Ok(Outcome::Created) => tracing::info!("DVC initialized"),
		Ok(Outcome::AlreadyPresent) => tracing::info!("DVC already configured"),
		Err(err) => tracing::warn!("Could not set up DVC: {}", err),
	}

	let models_dir = config.models_dir();
	fs::create_dir_all(&models_dir).map_err(|source| PipelineError::CreateDir {
		path: models_dir.clone(),
		source,
	})?;
	tracing::info!("Model directory ready at {}", models_dir.display());

	Ok(())
}

pub fn train_model(config: &PipelineConfig) -> (RandomForestClassifier, TrainingReport) {
	tracing::info!("Loading {} dataset ...", iris::NAME);
	let builder = iris::load_iris();

	let mut rng = StdRng::seed_from_u64(config.split_seed);
	let (train, test) = builder.build().stratified_split(&mut rng, config.test_fraction);
	tracing::info!("Training samples: {}", train.rows_len());
	tracing::info!("Test samples: {}", test.rows_len());

	tracing::info!(
		"Fitting random forest classifier [trees: {}, depth: {}] ...",
		config.forest.n_trees,
		config.forest.max_depth,
	);
	let model = config.forest.fit(train.clone());

	tracing::info!("Evaluating model ...");
	let cm = ConfusionMatrix::from_dataset(&model, &test);
	let report = ClassificationReport::new(&cm, &iris::TARGET_NAMES);
	let accuracy = test.evaluate(&model);
	tracing::info!("Model accuracy: {:.4}", accuracy);
	tracing::info!("Classification report:\n{}", report);

	let importances = iris::FEATURE_NAMES
		.iter()
		.zip(model.feature_importances())
		.map(|(name, &importance)| (name.to_string(), importance))
		.collect::<Vec<_>>();
	tracing::info!("Feature importance:");
	for (name, importance) in &importances {
		tracing::info!("  {}: {:.4}", name, importance);
	}

	let training = TrainingReport {
		train_samples: train.rows_len(),
		test_samples: test.rows_len(),
		accuracy,
		report,
		importances,
	};

	(model, training)
}

/// Writes the model, tries to track it with DVC, then writes the metadata.
pub fn save_model(config: &PipelineConfig, model: &RandomForestClassifier, accuracy: f64) -> Result<SaveOutcome, PipelineError> {
	let model_path = config.model_path();
	tracing::info!("Saving model to {} ...", model_path.display());
	let size = artifact::save(model, &model_path)?;
	tracing::info!("Model saved ({} bytes)", size);

	let tracking_path = config.tracking_path();
	let dvc = Dvc::new(&config.dvc_program, &config.root);
	let tracked = match dvc.add(&config.model_relative_path(), &tracking_path) {
		Ok(Outcome::Created) => {
			tracing::info!("Model added to DVC tracking: {}", tracking_path.display());
			true
		},
		Ok(Outcome::AlreadyPresent) => {
			tracing::info!("Model already under DVC tracking: {}", tracking_path.display());
			true
		},
		Err(err) => {
			tracing::warn!("Could not track model with DVC: {}", err);
			tracing::warn!("The model was saved without DVC versioning");
			false
		},
	};

	let metadata = Metadata {
		model: MODEL_NAME.to_string(),
		accuracy,
		dataset: iris::NAME.to_string(),
		date: artifact::timestamp(),
		features: model.features_len(),
		classes: model.classes_len(),
	};
	let metadata_path = config.metadata_path();
	artifact::write_metadata(&metadata, &metadata_path)?;
	tracing::info!("Metadata saved to {}", metadata_path.display());

	Ok(SaveOutcome { size, tracked })
}

/// Reloads the saved model and predicts the probe sample.
pub fn verify_model_loading(config: &PipelineConfig) -> Result<Verification, PipelineError> {
	tracing::info!("Loading model back from disk ...");

	let verification = reload_and_predict(config);
	match &verification {
		Ok(v) => {
			tracing::info!("Model loaded");
			tracing::info!("Test prediction: class {}", v.prediction);
			tracing::info!("Probabilities: {:?}", v.probabilities);
		},
		Err(err) => tracing::error!("Failed to load model: {}", err),
	}

	verification
}

fn reload_and_predict(config: &PipelineConfig) -> Result<Verification, PipelineError> {
	let sample = iris::load_iris()
		.row(config.probe_sample)
		.ok_or(PipelineError::MissingSample(config.probe_sample))?;
	let model = artifact::load_for(&config.model_path(), sample.len())?;

	Ok(Verification {
		prediction: model.predict(&sample),
		probabilities: model.predict_proba(&sample),
	})
}

/// Runs every stage in order and stops at the first fatal error.
pub fn run(config: &PipelineConfig) -> Result<Summary, PipelineError> {
	setup_environment(config)?;
	let (model, training) = train_model(config);
	let saved = save_model(config, &model, training.accuracy)?;
	let verification = verify_model_loading(config)?;

	Ok(Summary {
		training,
		saved,
		verification,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dataset::Builder;
	use crate::random_forest::RandomForestBuilder;
	use crate::random_forest::tests::stump_artifact;
	use tempfile::tempdir;

	fn offline(root: &std::path::Path) -> PipelineConfig {
		PipelineConfig {
			dvc_program: "model-pipeline-no-such-dvc".to_string(),
			..PipelineConfig::with_root(root)
		}
	}

	#[test]
	fn training_is_deterministic() {
		let config = PipelineConfig::default();
		let (a, report_a) = train_model(&config);
		let (b, report_b) = train_model(&config);

		assert_eq!(report_a.accuracy.to_bits(), report_b.accuracy.to_bits());
		assert_eq!(a, b);
	}

	#[test]
	fn training_reports_the_held_out_split() {
		let (_, report) = train_model(&PipelineConfig::default());

		assert_eq!(report.test_samples, 30);
		assert_eq!(report.train_samples, 120);
		assert_eq!(report.report.classes.len(), 3);
		assert_eq!(report.report.support, 30);
		assert!(report.report.classes.iter().all(|c| c.support == 10));
		assert!(report.accuracy >= 0.85, "accuracy {}", report.accuracy);
		assert_eq!(report.report.accuracy, report.accuracy);
		assert_eq!(report.importances.len(), 4);
	}

	#[test]
	fn setup_survives_missing_dvc() {
		let dir = tempdir().unwrap();
		let config = offline(dir.path());

		setup_environment(&config).unwrap();
		setup_environment(&config).unwrap();

		assert!(config.models_dir().is_dir());
		assert!(!config.dvc_dir().exists());
	}

	#[test]
	fn save_without_dvc_is_untracked() {
		let dir = tempdir().unwrap();
		let config = offline(dir.path());
		setup_environment(&config).unwrap();

		let (model, report) = train_model(&config);
		let saved = save_model(&config, &model, report.accuracy).unwrap();

		assert!(!saved.tracked);
		assert!(saved.size > 0);
		assert!(config.model_path().is_file());
		assert!(config.metadata_path().is_file());
		assert!(!config.tracking_path().exists());
	}

	#[cfg(unix)]
	#[test]
	fn save_with_failing_dvc_is_untracked() {
		let dir = tempdir().unwrap();
		let config = PipelineConfig {
			dvc_program: "false".to_string(),
			..PipelineConfig::with_root(dir.path())
		};
		setup_environment(&config).unwrap();

		let (model, report) = train_model(&config);
		let saved = save_model(&config, &model, report.accuracy).unwrap();

		assert!(!saved.tracked);
		assert!(config.model_path().is_file());
		assert!(config.metadata_path().is_file());
		assert!(!config.tracking_path().exists());
	}

	#[test]
	fn existing_sidecar_counts_as_tracked() {
		let dir = tempdir().unwrap();
		let config = offline(dir.path());
		setup_environment(&config).unwrap();
		fs::write(config.tracking_path(), "outs: []\n").unwrap();

		let (model, report) = train_model(&config);
		let saved = save_model(&config, &model, report.accuracy).unwrap();

		assert!(saved.tracked);
	}

	#[test]
	fn verification_without_model_fails() {
		let dir = tempdir().unwrap();
		let config = offline(dir.path());

		assert!(matches!(verify_model_loading(&config), Err(PipelineError::LoadModel { .. })));
	}

	#[test]
	fn verification_of_split_on_missing_feature_fails() {
		let dir = tempdir().unwrap();
		let config = offline(dir.path());
		fs::create_dir_all(config.models_dir()).unwrap();
		fs::write(config.model_path(), stump_artifact(9)).unwrap();

		assert!(matches!(verify_model_loading(&config), Err(PipelineError::LoadModel { .. })));
	}

	#[test]
	fn verification_rejects_model_with_other_feature_count() {
		let dir = tempdir().unwrap();
		let config = offline(dir.path());
		fs::create_dir_all(config.models_dir()).unwrap();

		let mut builder = Builder::new();
		for i in 0..20 {
			builder.add(&[i as f64, (i % 3) as f64], if i < 10 { 0.0 } else { 1.0 });
		}
		let model = RandomForestBuilder {
			n_trees: 5,
			..RandomForestBuilder::default()
		}.fit(builder.build());
		artifact::save(&model, &config.model_path()).unwrap();

		assert!(matches!(
			verify_model_loading(&config),
			Err(PipelineError::FeatureMismatch { expected: 2, found: 4, .. })
		));
	}

	#[test]
	fn reloaded_model_predicts_like_the_fitted_one() {
		let dir = tempdir().unwrap();
		let config = offline(dir.path());
		setup_environment(&config).unwrap();

		let (model, report) = train_model(&config);
		save_model(&config, &model, report.accuracy).unwrap();
		let verification = verify_model_loading(&config).unwrap();

		let sample = iris::load_iris().row(0).unwrap();
		assert_eq!(verification.prediction, model.predict(&sample));
		assert_eq!(verification.probabilities, model.predict_proba(&sample));
		assert_eq!(verification.prediction, 0.0);
	}
}
