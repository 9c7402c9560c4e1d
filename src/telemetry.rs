//! Log subscriber setup for the binary.

// crates.io
use tracing_subscriber::EnvFilter;

/// Default filter when neither `--log` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "info";

/// Installs the global `tracing` subscriber.
///
/// `filter` wins over `RUST_LOG`; an unparsable directive falls back to [`DEFAULT_FILTER`].
pub fn init(filter: Option<&str>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
	tracing_subscriber::fmt().with_env_filter(env_filter(filter)).with_target(false).try_init()
}

fn env_filter(filter: Option<&str>) -> EnvFilter {
	match filter {
		Some(directives) => EnvFilter::try_new(directives).ok(),
		None => EnvFilter::try_from_default_env().ok(),
	}
	.unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn explicit_filter_wins_and_garbage_falls_back() {
		assert_eq!(env_filter(Some("directory_portal=debug")).to_string(), "directory_portal=debug");
		assert_eq!(env_filter(Some("=[")).to_string(), DEFAULT_FILTER);
	}
}
