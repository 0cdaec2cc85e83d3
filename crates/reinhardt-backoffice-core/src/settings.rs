//! Back-office settings
//!
//! Settings load from a `.toml`/`.json` file or from `BACKOFFICE_*`
//! environment variables. Every section defaults independently so a file
//! only needs the keys it overrides.

use crate::error::BackofficeError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackofficeSettings {
	/// Enables stack traces in error envelopes
	pub debug: bool,
	pub guardrails: GuardrailSettings,
	pub rate_limit: RateLimitSettings,
	pub navigation: NavigationSettings,
	pub urls: UrlSettings,
	pub translation: TranslationSettings,
	pub features: FeatureSettings,
	pub logging: LoggingSettings,
}

impl Default for BackofficeSettings {
	fn default() -> Self {
		Self {
			debug: false,
			guardrails: GuardrailSettings::default(),
			rate_limit: RateLimitSettings::default(),
			navigation: NavigationSettings::default(),
			urls: UrlSettings::default(),
			translation: TranslationSettings::default(),
			features: FeatureSettings::default(),
			logging: LoggingSettings::default(),
		}
	}
}

impl BackofficeSettings {
	pub fn new() -> Self {
		Self::default()
	}

	/// Validate settings
	pub fn validate(&self) -> Result<(), SettingsError> {
		let guardrails = &self.guardrails;
		for (key, value) in [
			("guardrails.schema_max_size_bytes", guardrails.schema_max_size_bytes),
			(
				"guardrails.ui_schema_max_size_bytes",
				guardrails.ui_schema_max_size_bytes,
			),
			("guardrails.max_fields", guardrails.max_fields),
			("guardrails.max_depth", guardrails.max_depth),
			("rate_limit.max_requests", self.rate_limit.max_requests),
		] {
			if value == 0 {
				return Err(SettingsError::ValidationError(format!(
					"{} must be greater than zero",
					key
				)));
			}
		}

		if self.rate_limit.window_ms == 0 {
			return Err(SettingsError::ValidationError(
				"rate_limit.window_ms must be greater than zero".to_string(),
			));
		}

		for (name, namespace) in [("admin", &self.urls.admin), ("public", &self.urls.public)] {
			if !namespace.base_path.starts_with('/') {
				return Err(SettingsError::ValidationError(format!(
					"urls.{}.base_path must start with '/'",
					name
				)));
			}
		}

		if self.navigation.menu.trim().is_empty() {
			return Err(SettingsError::ValidationError(
				"navigation.menu must not be empty".to_string(),
			));
		}

		for (index, policy) in self.translation.policies.iter().enumerate() {
			if policy.entity.trim().is_empty() || policy.locales.is_empty() {
				return Err(SettingsError::ValidationError(format!(
					"translation.policies[{}] needs an entity and at least one locale",
					index
				)));
			}
		}

		self.features.validate()
	}

	/// Load settings from `BACKOFFICE_*` environment variables
	pub fn from_env() -> Result<Self, SettingsError> {
		Self::from_env_with(|key| std::env::var(key).ok())
	}

	/// Load settings from an arbitrary variable lookup.
	pub fn from_env_with<F>(lookup: F) -> Result<Self, SettingsError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut settings = Self::default();

		if let Some(debug) = lookup("BACKOFFICE_DEBUG") {
			settings.debug = parse_bool(&debug);
		}

		// Guardrails
		if let Some(value) = lookup("BACKOFFICE_SCHEMA_MAX_SIZE_BYTES") {
			settings.guardrails.schema_max_size_bytes =
				parse_number("BACKOFFICE_SCHEMA_MAX_SIZE_BYTES", &value)?;
		}
		if let Some(value) = lookup("BACKOFFICE_UI_SCHEMA_MAX_SIZE_BYTES") {
			settings.guardrails.ui_schema_max_size_bytes =
				parse_number("BACKOFFICE_UI_SCHEMA_MAX_SIZE_BYTES", &value)?;
		}
		if let Some(value) = lookup("BACKOFFICE_SCHEMA_MAX_FIELDS") {
			settings.guardrails.max_fields = parse_number("BACKOFFICE_SCHEMA_MAX_FIELDS", &value)?;
		}
		if let Some(value) = lookup("BACKOFFICE_SCHEMA_MAX_DEPTH") {
			settings.guardrails.max_depth = parse_number("BACKOFFICE_SCHEMA_MAX_DEPTH", &value)?;
		}

		// Rate limit
		if let Some(value) = lookup("BACKOFFICE_RATE_LIMIT_MAX_REQUESTS") {
			settings.rate_limit.max_requests =
				parse_number("BACKOFFICE_RATE_LIMIT_MAX_REQUESTS", &value)?;
		}
		if let Some(value) = lookup("BACKOFFICE_RATE_LIMIT_WINDOW_MS") {
			settings.rate_limit.window_ms = parse_number("BACKOFFICE_RATE_LIMIT_WINDOW_MS", &value)?;
		}

		// URLs
		if let Some(value) = lookup("BACKOFFICE_ADMIN_BASE_PATH") {
			settings.urls.admin.base_path = value;
		}
		if let Some(value) = lookup("BACKOFFICE_API_VERSION") {
			settings.urls.admin.api_version = Some(value);
		}

		// Navigation
		if let Some(value) = lookup("BACKOFFICE_CONTENT_MENU") {
			settings.navigation.menu = value;
		}

		// Translation
		if let Some(value) = lookup("BACKOFFICE_TRANSLATION_QUEUE_AUTO_CREATE") {
			settings.translation.queue_auto_create = parse_bool(&value);
		}

		// Logging
		if let Some(value) = lookup("BACKOFFICE_LOG_LEVEL") {
			settings.logging.level = value;
		}
		if let Some(value) = lookup("BACKOFFICE_LOG_FORMAT") {
			settings.logging.format = match value.to_lowercase().as_str() {
				"json" => LogFormat::Json,
				"pretty" => LogFormat::Pretty,
				"compact" => LogFormat::Compact,
				other => {
					return Err(SettingsError::ValidationError(format!(
						"BACKOFFICE_LOG_FORMAT: unknown format '{}'",
						other
					)));
				}
			};
		}

		Ok(settings)
	}

	/// Load settings from a configuration file
	pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
		let path = path.into();
		let contents = std::fs::read_to_string(&path).map_err(|e| {
			SettingsError::FileError(format!("Failed to read {}: {}", path.display(), e))
		})?;

		let settings: BackofficeSettings =
			if path.extension().and_then(|s| s.to_str()) == Some("toml") {
				toml::from_str(&contents)
					.map_err(|e| SettingsError::ParseError(format!("TOML parse error: {}", e)))?
			} else if path.extension().and_then(|s| s.to_str()) == Some("json") {
				serde_json::from_str(&contents)
					.map_err(|e| SettingsError::ParseError(format!("JSON parse error: {}", e)))?
			} else {
				return Err(SettingsError::UnsupportedFormat(
					"Supported formats: .toml, .json".to_string(),
				));
			};

		Ok(settings)
	}
}

fn parse_bool(value: &str) -> bool {
	value.eq_ignore_ascii_case("true") || value == "1"
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SettingsError> {
	value
		.trim()
		.parse()
		.map_err(|_| SettingsError::ValidationError(format!("{}: '{}' is not a number", key, value)))
}

/// Schema guardrail limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailSettings {
	pub schema_max_size_bytes: usize,
	pub ui_schema_max_size_bytes: usize,
	pub max_fields: usize,
	pub max_depth: usize,
}

impl Default for GuardrailSettings {
	fn default() -> Self {
		Self {
			schema_max_size_bytes: 64 * 1024,
			ui_schema_max_size_bytes: 32 * 1024,
			max_fields: 200,
			max_depth: 12,
		}
	}
}

/// Preview/validate rate limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
	pub enabled: bool,
	pub max_requests: usize,
	pub window_ms: u64,
	/// Idle keys are swept once every this many `allow` calls
	pub cleanup_interval: u64,
}

impl Default for RateLimitSettings {
	fn default() -> Self {
		Self {
			enabled: true,
			max_requests: 30,
			window_ms: 60_000,
			cleanup_interval: 100,
		}
	}
}

impl RateLimitSettings {
	pub fn window(&self) -> Duration {
		Duration::from_millis(self.window_ms)
	}
}

/// Where dynamic panels appear in the admin navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
	/// Content-modeling menu code
	pub menu: String,
	pub parent_id: Option<String>,
	pub base_position: i32,
}

impl Default for NavigationSettings {
	fn default() -> Self {
		Self {
			menu: "content".to_string(),
			parent_id: None,
			base_position: 100,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlSettings {
	pub admin: NamespaceSettings,
	pub public: NamespaceSettings,
}

impl Default for UrlSettings {
	fn default() -> Self {
		Self {
			admin: NamespaceSettings {
				base_path: "/admin".to_string(),
				api_prefix: "/api".to_string(),
				api_version: None,
			},
			public: NamespaceSettings {
				base_path: "/".to_string(),
				api_prefix: "/api".to_string(),
				api_version: None,
			},
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceSettings {
	pub base_path: String,
	pub api_prefix: String,
	pub api_version: Option<String>,
}

impl Default for NamespaceSettings {
	fn default() -> Self {
		Self {
			base_path: "/".to_string(),
			api_prefix: "/api".to_string(),
			api_version: None,
		}
	}
}

/// Translation gate and queue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
	/// Create assignments when the gate blocks a transition
	pub queue_auto_create: bool,
	pub assignment_type: String,
	pub priority: String,
	pub policies: Vec<TranslationPolicySettings>,
}

impl Default for TranslationSettings {
	fn default() -> Self {
		Self {
			queue_auto_create: true,
			assignment_type: "open_pool".to_string(),
			priority: "normal".to_string(),
			policies: Vec::new(),
		}
	}
}

/// One translation requirement: `entity` + `transition` (`*` for any).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationPolicySettings {
	pub entity: String,
	#[serde(default = "wildcard")]
	pub transition: String,
	#[serde(default)]
	pub environment: Option<String>,
	pub locales: Vec<String>,
	#[serde(default)]
	pub required_fields: Vec<String>,
	#[serde(default)]
	pub strategy: Option<String>,
}

fn wildcard() -> String {
	"*".to_string()
}

/// Feature switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
	pub workflows: bool,
	pub translations: bool,
	pub translation_queue: bool,
	pub block_library: bool,
}

impl Default for FeatureSettings {
	fn default() -> Self {
		Self {
			workflows: true,
			translations: true,
			translation_queue: true,
			block_library: true,
		}
	}
}

impl FeatureSettings {
	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.translation_queue && !self.translations {
			return Err(SettingsError::InvalidFeatureConfig(
				"translation_queue requires translations".to_string(),
			));
		}
		if self.translations && !self.workflows {
			return Err(SettingsError::InvalidFeatureConfig(
				"translations requires workflows".to_string(),
			));
		}
		Ok(())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Compact,
	Pretty,
	Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
	/// `EnvFilter` directive, e.g. `info` or `reinhardt_backoffice_workflow=debug`
	pub level: String,
	pub format: LogFormat,
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			format: LogFormat::Compact,
		}
	}
}

#[derive(Debug, Error)]
pub enum SettingsError {
	#[error("File error: {0}")]
	FileError(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Unsupported format: {0}")]
	UnsupportedFormat(String),

	#[error("Invalid feature configuration: {0}")]
	InvalidFeatureConfig(String),
}

impl From<SettingsError> for BackofficeError {
	fn from(err: SettingsError) -> Self {
		match err {
			SettingsError::InvalidFeatureConfig(msg) => BackofficeError::invalid_feature_config(msg),
			other => BackofficeError::internal(other.to_string()).with_metadata("component", "settings"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TextCode;
	use rstest::rstest;
	use std::collections::HashMap;
	use std::io::Write;

	#[rstest]
	fn test_default_settings() {
		// Act
		let settings = BackofficeSettings::default();

		// Assert
		assert_eq!(settings.guardrails.schema_max_size_bytes, 65536);
		assert_eq!(settings.guardrails.ui_schema_max_size_bytes, 32768);
		assert_eq!(settings.rate_limit.max_requests, 30);
		assert_eq!(settings.rate_limit.window(), Duration::from_secs(60));
		assert_eq!(settings.navigation.menu, "content");
		assert!(settings.translation.queue_auto_create);
		assert!(settings.validate().is_ok());
	}

	#[rstest]
	fn test_from_env_with_overrides() {
		// Arrange
		let vars: HashMap<&str, &str> = HashMap::from([
			("BACKOFFICE_DEBUG", "1"),
			("BACKOFFICE_RATE_LIMIT_MAX_REQUESTS", "2"),
			("BACKOFFICE_RATE_LIMIT_WINDOW_MS", "50"),
			("BACKOFFICE_LOG_FORMAT", "json"),
		]);

		// Act
		let settings =
			BackofficeSettings::from_env_with(|key| vars.get(key).map(|v| v.to_string())).unwrap();

		// Assert
		assert!(settings.debug);
		assert_eq!(settings.rate_limit.max_requests, 2);
		assert_eq!(settings.rate_limit.window(), Duration::from_millis(50));
		assert_eq!(settings.logging.format, LogFormat::Json);
	}

	#[rstest]
	fn test_from_env_rejects_non_numeric_limit() {
		// Act
		let result = BackofficeSettings::from_env_with(|key| {
			(key == "BACKOFFICE_SCHEMA_MAX_DEPTH").then(|| "deep".to_string())
		});

		// Assert
		assert!(matches!(result, Err(SettingsError::ValidationError(_))));
	}

	#[rstest]
	fn test_from_file_toml_keeps_section_defaults() {
		// Arrange
		let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
		writeln!(
			file,
			"[rate_limit]\nmax_requests = 5\n\n[[translation.policies]]\nentity = \"page\"\ntransition = \"publish\"\nlocales = [\"en\", \"es\"]"
		)
		.unwrap();

		// Act
		let settings = BackofficeSettings::from_file(file.path()).unwrap();

		// Assert
		assert_eq!(settings.rate_limit.max_requests, 5);
		assert_eq!(settings.rate_limit.window_ms, 60_000);
		assert_eq!(settings.translation.policies.len(), 1);
		assert_eq!(settings.translation.policies[0].locales, vec!["en", "es"]);
		assert_eq!(settings.guardrails.max_depth, 12);
	}

	#[rstest]
	fn test_from_file_unsupported_extension() {
		// Arrange
		let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();

		// Act
		let result = BackofficeSettings::from_file(file.path());

		// Assert
		assert!(matches!(result, Err(SettingsError::UnsupportedFormat(_))));
	}

	#[rstest]
	#[case::zero_requests(|s: &mut BackofficeSettings| s.rate_limit.max_requests = 0)]
	#[case::zero_window(|s: &mut BackofficeSettings| s.rate_limit.window_ms = 0)]
	#[case::relative_base(|s: &mut BackofficeSettings| s.urls.admin.base_path = "admin".to_string())]
	#[case::empty_menu(|s: &mut BackofficeSettings| s.navigation.menu = String::new())]
	fn test_validate_rejects(#[case] mutate: fn(&mut BackofficeSettings)) {
		// Arrange
		let mut settings = BackofficeSettings::default();
		mutate(&mut settings);

		// Act
		let result = settings.validate();

		// Assert
		assert!(matches!(result, Err(SettingsError::ValidationError(_))));
	}

	#[rstest]
	fn test_queue_without_translations_is_invalid_feature_config() {
		// Arrange
		let mut settings = BackofficeSettings::default();
		settings.features.translations = false;

		// Act
		let err: BackofficeError = settings.validate().unwrap_err().into();

		// Assert
		assert_eq!(err.text_code(), TextCode::InvalidFeatureConfig);
	}
}
