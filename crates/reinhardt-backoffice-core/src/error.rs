//! Structured errors shared by every back-office component.
//!
//! A [`BackofficeError`] carries a coarse [`ErrorKind`], a registered
//! [`TextCode`], the HTTP status used by the presenter, a human message and a
//! free-form metadata map that clients use to drive retries and field-level
//! feedback.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	Validation,
	NotFound,
	Forbidden,
	/// Path, uniqueness and optimistic-lock conflicts
	Conflict,
	RateLimited,
	ServiceUnavailable,
	FeatureDisabled,
	Internal,
	/// Context cancellation. Never produced by the core's own rules.
	Cancelled,
}

impl ErrorKind {
	pub fn as_str(self) -> &'static str {
		match self {
			ErrorKind::Validation => "validation",
			ErrorKind::NotFound => "not_found",
			ErrorKind::Forbidden => "forbidden",
			ErrorKind::Conflict => "conflict",
			ErrorKind::RateLimited => "rate_limited",
			ErrorKind::ServiceUnavailable => "service_unavailable",
			ErrorKind::FeatureDisabled => "feature_disabled",
			ErrorKind::Internal => "internal",
			ErrorKind::Cancelled => "cancelled",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Registered machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextCode {
	ValidationError,
	NotFound,
	Forbidden,
	FeatureDisabled,
	WorkflowNotFound,
	WorkflowInvalidTransition,
	TranslationMissing,
	ContentTypeSchemaBreaking,
	PathConflict,
	Conflict,
	ServiceUnavailable,
	RateLimited,
	InvalidFeatureConfig,
	VersionConflict,
	BindingConflict,
	RollbackVersionNotFound,
	ContextCanceled,
	InternalError,
}

impl TextCode {
	pub const ALL: [TextCode; 18] = [
		TextCode::ValidationError,
		TextCode::NotFound,
		TextCode::Forbidden,
		TextCode::FeatureDisabled,
		TextCode::WorkflowNotFound,
		TextCode::WorkflowInvalidTransition,
		TextCode::TranslationMissing,
		TextCode::ContentTypeSchemaBreaking,
		TextCode::PathConflict,
		TextCode::Conflict,
		TextCode::ServiceUnavailable,
		TextCode::RateLimited,
		TextCode::InvalidFeatureConfig,
		TextCode::VersionConflict,
		TextCode::BindingConflict,
		TextCode::RollbackVersionNotFound,
		TextCode::ContextCanceled,
		TextCode::InternalError,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			TextCode::ValidationError => "VALIDATION_ERROR",
			TextCode::NotFound => "NOT_FOUND",
			TextCode::Forbidden => "FORBIDDEN",
			TextCode::FeatureDisabled => "FEATURE_DISABLED",
			TextCode::WorkflowNotFound => "WORKFLOW_NOT_FOUND",
			TextCode::WorkflowInvalidTransition => "WORKFLOW_INVALID_TRANSITION",
			TextCode::TranslationMissing => "TRANSLATION_MISSING",
			TextCode::ContentTypeSchemaBreaking => "CONTENT_TYPE_SCHEMA_BREAKING",
			TextCode::PathConflict => "PATH_CONFLICT",
			TextCode::Conflict => "CONFLICT",
			TextCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
			TextCode::RateLimited => "RATE_LIMITED",
			TextCode::InvalidFeatureConfig => "INVALID_FEATURE_CONFIG",
			TextCode::VersionConflict => "VERSION_CONFLICT",
			TextCode::BindingConflict => "BINDING_CONFLICT",
			TextCode::RollbackVersionNotFound => "ROLLBACK_VERSION_NOT_FOUND",
			TextCode::ContextCanceled => "CONTEXT_CANCELED",
			TextCode::InternalError => "INTERNAL_ERROR",
		}
	}

	/// Looks a code up by its wire name.
	pub fn parse(value: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|code| code.as_str() == value)
	}

	pub fn kind(self) -> ErrorKind {
		match self {
			TextCode::ValidationError
			| TextCode::WorkflowInvalidTransition
			| TextCode::TranslationMissing => ErrorKind::Validation,
			TextCode::NotFound | TextCode::WorkflowNotFound | TextCode::RollbackVersionNotFound => {
				ErrorKind::NotFound
			}
			TextCode::Forbidden => ErrorKind::Forbidden,
			TextCode::FeatureDisabled => ErrorKind::FeatureDisabled,
			TextCode::ContentTypeSchemaBreaking
			| TextCode::PathConflict
			| TextCode::Conflict
			| TextCode::VersionConflict
			| TextCode::BindingConflict => ErrorKind::Conflict,
			TextCode::ServiceUnavailable => ErrorKind::ServiceUnavailable,
			TextCode::RateLimited => ErrorKind::RateLimited,
			TextCode::InvalidFeatureConfig | TextCode::InternalError => ErrorKind::Internal,
			TextCode::ContextCanceled => ErrorKind::Cancelled,
		}
	}

	/// Default HTTP status for the code.
	pub fn status(self) -> u16 {
		match self {
			TextCode::ValidationError
			| TextCode::WorkflowInvalidTransition
			| TextCode::TranslationMissing => 400,
			TextCode::Forbidden | TextCode::FeatureDisabled => 403,
			TextCode::NotFound | TextCode::WorkflowNotFound | TextCode::RollbackVersionNotFound => 404,
			TextCode::ContentTypeSchemaBreaking
			| TextCode::PathConflict
			| TextCode::Conflict
			| TextCode::VersionConflict
			| TextCode::BindingConflict => 409,
			TextCode::RateLimited => 429,
			TextCode::ContextCanceled => 499,
			TextCode::InvalidFeatureConfig | TextCode::InternalError => 500,
			TextCode::ServiceUnavailable => 503,
		}
	}
}

impl fmt::Display for TextCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Error type carried across every back-office boundary.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct BackofficeError {
	kind: ErrorKind,
	text_code: TextCode,
	status: u16,
	message: String,
	metadata: Map<String, Value>,
}

impl BackofficeError {
	/// Creates an error whose kind and status follow the text code.
	pub fn new(text_code: TextCode, message: impl Into<String>) -> Self {
		Self {
			kind: text_code.kind(),
			text_code,
			status: text_code.status(),
			message: message.into(),
			metadata: Map::new(),
		}
	}

	pub fn validation(message: impl Into<String>) -> Self {
		Self::new(TextCode::ValidationError, message)
	}

	/// Validation error with `metadata.fields` = {field -> message}.
	pub fn validation_fields<I, K, V>(message: impl Into<String>, fields: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let fields: Map<String, Value> = fields
			.into_iter()
			.map(|(k, v)| (k.into(), Value::String(v.into())))
			.collect();
		Self::validation(message).with_metadata("fields", Value::Object(fields))
	}

	pub fn not_found(message: impl Into<String>) -> Self {
		Self::new(TextCode::NotFound, message)
	}

	pub fn forbidden(message: impl Into<String>) -> Self {
		Self::new(TextCode::Forbidden, message)
	}

	pub fn conflict(message: impl Into<String>) -> Self {
		Self::new(TextCode::Conflict, message)
	}

	pub fn rate_limited(message: impl Into<String>) -> Self {
		Self::new(TextCode::RateLimited, message)
	}

	/// A collaborator is missing or misconfigured; `component` names it.
	pub fn service_unavailable(component: &str, message: impl Into<String>) -> Self {
		Self::new(TextCode::ServiceUnavailable, message).with_metadata("component", component)
	}

	pub fn feature_disabled(feature: &str) -> Self {
		Self::new(
			TextCode::FeatureDisabled,
			format!("feature '{}' is disabled", feature),
		)
		.with_metadata("feature", feature)
	}

	pub fn invalid_feature_config(message: impl Into<String>) -> Self {
		Self::new(TextCode::InvalidFeatureConfig, message)
	}

	pub fn internal(message: impl Into<String>) -> Self {
		Self::new(TextCode::InternalError, message)
	}

	pub fn cancelled() -> Self {
		Self::new(TextCode::ContextCanceled, "context canceled")
	}

	/// Attaches a metadata entry. Values that fail to serialize are stored as `null`.
	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
		let value = serde_json::to_value(value).unwrap_or(Value::Null);
		self.metadata.insert(key.into(), value);
		self
	}

	/// Merges every entry of `metadata` into the error.
	pub fn with_metadata_map(mut self, metadata: Map<String, Value>) -> Self {
		self.metadata.extend(metadata);
		self
	}

	pub fn with_status(mut self, status: u16) -> Self {
		self.status = status;
		self
	}

	pub fn kind(&self) -> ErrorKind {
		self.kind
	}

	pub fn text_code(&self) -> TextCode {
		self.text_code
	}

	pub fn status(&self) -> u16 {
		self.status
	}

	pub fn message(&self) -> &str {
		&self.message
	}

	pub fn metadata(&self) -> &Map<String, Value> {
		&self.metadata
	}

	pub fn metadata_value(&self, key: &str) -> Option<&Value> {
		self.metadata.get(key)
	}

	/// Field errors from `metadata.fields`, empty when absent.
	pub fn field_errors(&self) -> BTreeMap<String, String> {
		let Some(Value::Object(fields)) = self.metadata.get("fields") else {
			return BTreeMap::new();
		};
		fields
			.iter()
			.map(|(k, v)| {
				let message = match v {
					Value::String(s) => s.clone(),
					other => other.to_string(),
				};
				(k.clone(), message)
			})
			.collect()
	}

	pub fn is_cancelled(&self) -> bool {
		self.kind == ErrorKind::Cancelled
	}
}

/// Result type for back-office operations
pub type BackofficeResult<T> = Result<T, BackofficeError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case::validation(TextCode::ValidationError, 400, ErrorKind::Validation)]
	#[case::translation(TextCode::TranslationMissing, 400, ErrorKind::Validation)]
	#[case::forbidden(TextCode::Forbidden, 403, ErrorKind::Forbidden)]
	#[case::workflow_missing(TextCode::WorkflowNotFound, 404, ErrorKind::NotFound)]
	#[case::breaking(TextCode::ContentTypeSchemaBreaking, 409, ErrorKind::Conflict)]
	#[case::version(TextCode::VersionConflict, 409, ErrorKind::Conflict)]
	#[case::rate(TextCode::RateLimited, 429, ErrorKind::RateLimited)]
	#[case::canceled(TextCode::ContextCanceled, 499, ErrorKind::Cancelled)]
	#[case::unavailable(TextCode::ServiceUnavailable, 503, ErrorKind::ServiceUnavailable)]
	fn test_text_code_maps_to_status_and_kind(
		#[case] code: TextCode,
		#[case] status: u16,
		#[case] kind: ErrorKind,
	) {
		// Act
		let err = BackofficeError::new(code, "boom");

		// Assert
		assert_eq!(err.status(), status);
		assert_eq!(err.kind(), kind);
		assert_eq!(err.text_code(), code);
	}

	#[rstest]
	fn test_text_code_wire_names_round_trip() {
		// Arrange
		let codes = TextCode::ALL;

		// Act & Assert
		for code in codes {
			let serialized = serde_json::to_value(code).unwrap();
			assert_eq!(serialized, json!(code.as_str()));
			assert_eq!(TextCode::parse(code.as_str()), Some(code));
		}
	}

	#[rstest]
	fn test_validation_fields_are_exposed_as_metadata() {
		// Arrange
		let err = BackofficeError::validation_fields(
			"schema is invalid",
			[("title", "is required"), ("body", "must be a string")],
		);

		// Act
		let fields = err.field_errors();

		// Assert
		assert_eq!(err.text_code(), TextCode::ValidationError);
		assert_eq!(fields.get("title").map(String::as_str), Some("is required"));
		assert_eq!(fields.len(), 2);
		assert_eq!(
			err.metadata_value("fields"),
			Some(&json!({"title": "is required", "body": "must be a string"}))
		);
	}

	#[rstest]
	fn test_service_unavailable_names_component() {
		// Act
		let err = BackofficeError::service_unavailable("url_manager", "missing route");

		// Assert
		assert_eq!(err.metadata_value("component"), Some(&json!("url_manager")));
		assert_eq!(err.status(), 503);
	}

	#[rstest]
	fn test_cancelled_is_not_a_core_kind() {
		// Act
		let err = BackofficeError::cancelled();

		// Assert
		assert!(err.is_cancelled());
		assert_eq!(err.text_code(), TextCode::ContextCanceled);
		assert_eq!(err.to_string(), "context canceled");
	}
}
