//! Runs the health checks against the artifacts of a finished pipeline run.

use model_pipeline::{checks, logging, PipelineConfig};

const RULE: &str = "============================================================";

fn main() {
	if let Err(err) = logging::init() {
		eprintln!("{err}");
	}

	tracing::info!("{}", RULE);
	tracing::info!("Running project checks");
	tracing::info!("{}", RULE);

	let config = PipelineConfig::from_env();
	let summary = checks::run_all(&config);

	tracing::info!("{}", RULE);
	tracing::info!("Results: {}/{} checks passed", summary.passed, summary.total);
	tracing::info!("{}", RULE);

	if summary.all_passed() {
		tracing::info!("All checks passed");
	} else {
		tracing::warn!("Some checks failed");
		std::process::exit(1);
	}
}
