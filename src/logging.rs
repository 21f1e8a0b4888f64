//! Logging setup for the pipeline binaries.
//!
//! Installs a global tracing subscriber writing to stdout. The filter comes
//! from `RUST_LOG` and defaults to `info`.

use std::sync::OnceLock;

use time::{UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
	/// Failed to set the global tracing subscriber.
	#[error("Failed to install global tracing subscriber: {0}")]
	SetGlobal(tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize tracing to write to stdout.
///
/// Subsequent calls are no-ops. Failures are returned so callers can carry on
/// without logging.
pub fn init() -> Result<(), LoggingError> {
	if INITIALIZED.get().is_some() {
		return Ok(());
	}

	let stdout_layer = fmt::layer()
		.with_target(false)
		.with_timer(build_timer())
		.with_writer(std::io::stdout);

	let subscriber = Registry::default()
		.with(build_env_filter())
		.with(stdout_layer);
	tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobal)?;
	let _ = INITIALIZED.set(());

	Ok(())
}

fn build_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
	const DISPLAY_FORMAT: &[FormatItem<'static>] =
		format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
	let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
	fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn build_env_filter() -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
