use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;

fn default_filter(verbose: bool) -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("strata=trace,strata_pip=trace,strata_index=debug,strata_postal=debug,info")
		} else {
			EnvFilter::new("strata=info,strata_pip=info,strata_index=info,warn")
		}
	})
}

/// Installs the global subscriber.
///
/// With `STRATA_LOG_DIR` set, events go to a per-process file in that
/// directory; otherwise to stderr so stdout stays machine-readable.
pub fn setup_tracing(verbose: bool) {
	if let Some(log_dir) = std::env::var_os("STRATA_LOG_DIR").map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("strata.{}.log", std::process::id()));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_span_events(FmtSpan::CLOSE)
				.with_target(true);

			tracing_subscriber::registry().with(default_filter(verbose)).with(file_layer).init();

			tracing::info!(path = %log_path.display(), "strata.tracing.file");
			return;
		}
	}

	tracing_subscriber::fmt()
		.with_env_filter(default_filter(verbose))
		.with_writer(std::io::stderr)
		.init();
}
