//! Tracing subscriber setup.

use crate::settings::{LogFormat, LoggingSettings, SettingsError};
use tracing_subscriber::EnvFilter;

/// Parses the configured level into an `EnvFilter`.
pub fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter, SettingsError> {
	EnvFilter::try_new(&settings.level).map_err(|e| {
		SettingsError::ValidationError(format!("logging.level '{}': {}", settings.level, e))
	})
}

/// Installs the global subscriber.
///
/// Returns `Ok(false)` when a global subscriber was already installed, which
/// is the normal case in tests and when the host application owns logging.
pub fn init_logging(settings: &LoggingSettings) -> Result<bool, SettingsError> {
	let filter = build_filter(settings)?;
	let installed = match settings.format {
		LogFormat::Json => tracing_subscriber::fmt()
			.json()
			.with_env_filter(filter)
			.try_init(),
		LogFormat::Pretty => tracing_subscriber::fmt()
			.pretty()
			.with_env_filter(filter)
			.try_init(),
		LogFormat::Compact => tracing_subscriber::fmt()
			.compact()
			.with_env_filter(filter)
			.try_init(),
	};
	Ok(installed.is_ok())
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("info")]
	#[case("warn,reinhardt_backoffice_workflow=debug")]
	fn test_build_filter_accepts_directives(#[case] level: &str) {
		// Arrange
		let settings = LoggingSettings {
			level: level.to_string(),
			format: LogFormat::Compact,
		};

		// Act & Assert
		assert!(build_filter(&settings).is_ok());
	}

	#[rstest]
	fn test_build_filter_rejects_garbage() {
		// Arrange
		let settings = LoggingSettings {
			level: "backoffice=notalevel".to_string(),
			format: LogFormat::Json,
		};

		// Act & Assert
		assert!(build_filter(&settings).is_err());
	}

	#[rstest]
	fn test_init_logging_twice_is_harmless() {
		// Arrange
		let settings = LoggingSettings::default();

		// Act
		let _ = init_logging(&settings).unwrap();
		let second = init_logging(&settings).unwrap();

		// Assert
		assert!(!second);
	}
}
