use model_pipeline::{logging, pipeline, PipelineConfig};

const RULE: &str = "============================================================";

fn main() {
	if let Err(err) = logging::init() {
		eprintln!("{err}");
	}

	tracing::info!("{}", RULE);
	tracing::info!("Iris random forest + DVC pipeline");
	tracing::info!("{}", RULE);

	let config = PipelineConfig::from_env();

	match pipeline::run(&config) {
		Ok(summary) => {
			tracing::info!("{}", RULE);
			tracing::info!("Pipeline finished");
			tracing::info!("{}", RULE);
			tracing::info!("Model saved to: {}", config.model_path().display());
			tracing::info!("Final accuracy: {:.4}", summary.training.accuracy);
			if !summary.saved.tracked {
				tracing::warn!("Model is not tracked by DVC");
			}
		},
		Err(err) => {
			tracing::error!("Pipeline failed: {}", err);
			tracing::error!("Check the log output above for details");
			std::process::exit(1);
		},
	}
}
