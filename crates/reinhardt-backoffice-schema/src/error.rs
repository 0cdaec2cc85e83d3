//! Error types for schema authoring

use crate::breaking::BreakingChange;
use reinhardt_backoffice_core::{BackofficeError, TextCode};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
	/// Guardrail, normalization or compilation failure, keyed by field
	#[error("{message}")]
	Invalid {
		message: String,
		fields: BTreeMap<String, String>,
	},

	#[error("rate limit exceeded for '{key}'")]
	RateLimited { key: String, retry_after_ms: u64 },

	#[error("{} breaking schema change(s)", .0.len())]
	Breaking(Vec<BreakingChange>),

	/// No form generator is configured
	#[error("form generator unavailable: {0}")]
	GeneratorUnavailable(String),

	#[error("block definition '{0}' not found")]
	BlockNotFound(String),

	#[error("{0}")]
	Conflict(String),

	#[error(transparent)]
	Core(#[from] BackofficeError),
}

impl SchemaError {
	pub fn invalid<K, V>(message: impl Into<String>, field: K, reason: V) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		SchemaError::Invalid {
			message: message.into(),
			fields: BTreeMap::from([(field.into(), reason.into())]),
		}
	}

	/// Field errors for `Invalid`, empty otherwise.
	pub fn fields(&self) -> BTreeMap<String, String> {
		match self {
			SchemaError::Invalid { fields, .. } => fields.clone(),
			SchemaError::Core(err) => err.field_errors(),
			_ => BTreeMap::new(),
		}
	}
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

impl From<SchemaError> for BackofficeError {
	fn from(err: SchemaError) -> Self {
		match err {
			SchemaError::Invalid { message, fields } => {
				BackofficeError::validation_fields(message, fields)
			}
			SchemaError::RateLimited {
				key,
				retry_after_ms,
			} => BackofficeError::rate_limited(format!("too many requests for '{}'", key))
				.with_metadata("retry_after_ms", retry_after_ms),
			SchemaError::Breaking(changes) => {
				let summary = changes
					.iter()
					.map(BreakingChange::describe)
					.collect::<Vec<_>>()
					.join("; ");
				BackofficeError::new(
					TextCode::ContentTypeSchemaBreaking,
					format!("schema change breaks existing content: {}", summary),
				)
				.with_metadata("changes", &changes)
			}
			SchemaError::GeneratorUnavailable(msg) => {
				BackofficeError::service_unavailable("form_generator", msg)
			}
			SchemaError::BlockNotFound(slug) => {
				BackofficeError::not_found(format!("block definition '{}' not found", slug))
					.with_metadata("slug", slug)
			}
			SchemaError::Conflict(msg) => BackofficeError::conflict(msg),
			SchemaError::Core(err) => err,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use reinhardt_backoffice_core::ErrorKind;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_invalid_maps_to_validation_error_with_fields() {
		// Arrange
		let err = SchemaError::invalid("schema is invalid", "title", "is required");

		// Act
		let mapped = BackofficeError::from(err);

		// Assert
		assert_eq!(mapped.text_code(), TextCode::ValidationError);
		assert_eq!(mapped.kind(), ErrorKind::Validation);
		assert_eq!(mapped.metadata_value("fields"), Some(&json!({"title": "is required"})));
	}

	#[rstest]
	fn test_rate_limited_maps_to_429() {
		// Arrange
		let err = SchemaError::RateLimited {
			key: "10.0.0.1:42".to_string(),
			retry_after_ms: 30,
		};

		// Act
		let mapped = BackofficeError::from(err);

		// Assert
		assert_eq!(mapped.status(), 429);
		assert_eq!(mapped.text_code(), TextCode::RateLimited);
		assert_eq!(mapped.metadata_value("retry_after_ms"), Some(&json!(30)));
	}

	#[rstest]
	fn test_breaking_maps_to_conflict_code() {
		// Arrange
		let err = SchemaError::Breaking(vec![BreakingChange::PropertyRemoved {
			path: "title".to_string(),
		}]);

		// Act
		let mapped = BackofficeError::from(err);

		// Assert
		assert_eq!(mapped.text_code(), TextCode::ContentTypeSchemaBreaking);
		assert_eq!(mapped.status(), 409);
		assert_eq!(mapped.metadata_value("changes").unwrap()[0]["path"], json!("title"));
	}
}
