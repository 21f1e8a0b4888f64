//! Trains a random forest on the bundled Iris dataset, stores it under
//! `models/`, optionally tracks it with DVC and checks that it reloads.

#[macro_use]
extern crate num_derive;

pub mod artifact;
pub mod checks;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod decision_tree;
pub mod error;
pub mod functions;
pub mod iris;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod pipeline;
pub mod random_forest;
pub mod versioning;

pub use classifier::Classifier;
pub use config::PipelineConfig;
pub use error::{CheckError, PipelineError};
pub use random_forest::{RandomForestBuilder, RandomForestClassifier};
