//! Thin wrapper over the `dvc` command line.
//!
//! Every call runs synchronously in the project root. Callers treat any
//! [`VersioningError`] as a warning: the model is still usable without DVC.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersioningError {
	/// The executable could not be found on `PATH`.
	#[error("{program} is not installed or not in PATH")]
	NotInstalled { program: String },
	/// The executable exists but could not be started.
	#[error("Failed to run {command}: {source}")]
	Spawn {
		command: String,
		source: std::io::Error,
	},
	/// The command ran and exited unsuccessfully.
	#[error("{command} exited with {status}: {stderr}")]
	Failed {
		command: String,
		status: String,
		stderr: String,
	},
}

/// Whether a call changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	Created,
	AlreadyPresent,
}

#[derive(Debug, Clone)]
pub struct Dvc {
	program: String,
	root: PathBuf,
}

impl Dvc {
	pub fn new(program: impl Into<String>, root: impl Into<PathBuf>) -> Self {
		Self {
			program: program.into(),
			root: root.into(),
		}
	}

	/// Runs `dvc init --no-scm` unless `.dvc/` already exists.
	pub fn init(&self, dvc_dir: &Path) -> Result<Outcome, VersioningError> {
		if dvc_dir.exists() {
			return Ok(Outcome::AlreadyPresent);
		}

		self.run(&["init", "--no-scm"])?;
		Ok(Outcome::Created)
	}

	/// Runs `dvc add <target>` unless `sidecar` shows it is already tracked.
	pub fn add(&self, target: &str, sidecar: &Path) -> Result<Outcome, VersioningError> {
		if sidecar.exists() {
			return Ok(Outcome::AlreadyPresent);
		}

		self.run(&["add", target])?;
		Ok(Outcome::Created)
	}

	/// First line of `dvc --version`.
	pub fn version(&self) -> Result<String, VersioningError> {
		let output = self.run(&["--version"])?;
		Ok(first_line(&output.stdout))
	}

	fn run(&self, args: &[&str]) -> Result<Output, VersioningError> {
		let command = format!("{} {}", self.program, args.join(" "));
		tracing::debug!("Running `{}` in {}", command, self.root.display());

		let output = Command::new(&self.program)
			.args(args)
			.current_dir(&self.root)
			.output()
			.map_err(|source| match source.kind() {
				ErrorKind::NotFound => VersioningError::NotInstalled {
					program: self.program.clone(),
				},
				_ => VersioningError::Spawn {
					command: command.clone(),
					source,
				},
			})?;

		if !output.status.success() {
			return Err(VersioningError::Failed {
				command,
				status: output.status.to_string(),
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			});
		}

		Ok(output)
	}
}

fn first_line(stdout: &[u8]) -> String {
	String::from_utf8_lossy(stdout)
		.lines()
		.next()
		.unwrap_or_default()
		.trim()
		.to_string()
}
