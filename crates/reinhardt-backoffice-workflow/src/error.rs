//! Error types for the workflow runtime

use crate::binding::BindingKey;
use crate::translation::MissingTranslations;
use reinhardt_backoffice_core::{BackofficeError, TextCode};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
	#[error("workflow '{0}' not found")]
	WorkflowNotFound(String),

	/// No active binding matched the entity
	#[error("no workflow bound to '{content_type}' in environment '{environment}'")]
	Unbound {
		content_type: String,
		environment: String,
	},

	#[error("workflow binding '{0}' not found")]
	BindingNotFound(String),

	#[error("version conflict on {entity} '{id}': expected {expected}, found {actual}")]
	VersionConflict {
		entity: &'static str,
		id: String,
		expected: u64,
		actual: u64,
	},

	#[error("an active binding already exists for {key} ('{existing_id}')")]
	BindingConflict { existing_id: String, key: BindingKey },

	#[error("workflow '{id}' has no version {version}")]
	RollbackVersionNotFound { id: String, version: u64 },

	#[error("{message}")]
	InvalidTransition {
		message: String,
		workflow_id: String,
		from: String,
		to: String,
		transition: Option<String>,
	},

	#[error("{message}")]
	InvalidDefinition {
		message: String,
		fields: BTreeMap<String, String>,
	},

	#[error("missing translations for {}: {}", .0.entity_id, .0.missing_locales.join(", "))]
	MissingTranslations(Box<MissingTranslations>),

	#[error("assignment '{0}' not found")]
	AssignmentNotFound(String),

	#[error(transparent)]
	Core(#[from] BackofficeError),
}

impl WorkflowError {
	pub fn invalid_definition<K, V>(message: impl Into<String>, field: K, reason: V) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		WorkflowError::InvalidDefinition {
			message: message.into(),
			fields: BTreeMap::from([(field.into(), reason.into())]),
		}
	}

	pub fn missing_translations(&self) -> Option<&MissingTranslations> {
		match self {
			WorkflowError::MissingTranslations(missing) => Some(missing),
			_ => None,
		}
	}
}

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl From<WorkflowError> for BackofficeError {
	fn from(err: WorkflowError) -> Self {
		let message = err.to_string();
		match err {
			WorkflowError::WorkflowNotFound(id) => {
				BackofficeError::new(TextCode::WorkflowNotFound, message).with_metadata("workflow_id", id)
			}
			WorkflowError::Unbound {
				content_type,
				environment,
			} => BackofficeError::new(TextCode::WorkflowNotFound, message)
				.with_metadata("content_type", content_type)
				.with_metadata("environment", environment),
			WorkflowError::BindingNotFound(id) => {
				BackofficeError::not_found(message).with_metadata("binding_id", id)
			}
			WorkflowError::VersionConflict {
				entity,
				id,
				expected,
				actual,
			} => BackofficeError::new(TextCode::VersionConflict, message)
				.with_metadata("entity", entity)
				.with_metadata("id", id)
				.with_metadata("expected_version", expected)
				.with_metadata("actual_version", actual),
			WorkflowError::BindingConflict { existing_id, key } => {
				BackofficeError::new(TextCode::BindingConflict, message)
					.with_metadata("existing_binding_id", existing_id)
					.with_metadata("scope_type", key.scope_type.as_str())
					.with_metadata("scope_ref", key.scope_ref)
					.with_metadata("priority", key.priority)
					.with_metadata("environment", key.environment)
			}
			WorkflowError::RollbackVersionNotFound { id, version } => {
				BackofficeError::new(TextCode::RollbackVersionNotFound, message)
					.with_metadata("workflow_id", id)
					.with_metadata("rollback_to_version", version)
			}
			WorkflowError::InvalidTransition {
				workflow_id,
				from,
				to,
				transition,
				..
			} => BackofficeError::new(TextCode::WorkflowInvalidTransition, message)
				.with_metadata("workflow_id", workflow_id)
				.with_metadata("from_state", from)
				.with_metadata("to_state", to)
				.with_metadata("transition", transition),
			WorkflowError::InvalidDefinition { message, fields } => {
				BackofficeError::validation_fields(message, fields)
			}
			WorkflowError::MissingTranslations(missing) => {
				let metadata = match serde_json::to_value(&*missing) {
					Ok(serde_json::Value::Object(map)) => map,
					_ => serde_json::Map::new(),
				};
				BackofficeError::new(TextCode::TranslationMissing, message).with_metadata_map(metadata)
			}
			WorkflowError::AssignmentNotFound(id) => {
				BackofficeError::not_found(message).with_metadata("assignment_id", id)
			}
			WorkflowError::Core(err) => err,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::binding::ScopeType;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_version_conflict_carries_both_versions() {
		// Arrange
		let err = WorkflowError::VersionConflict {
			entity: "workflow",
			id: "w1".into(),
			expected: 2,
			actual: 3,
		};

		// Act
		let mapped = BackofficeError::from(err);

		// Assert
		assert_eq!(mapped.text_code(), TextCode::VersionConflict);
		assert_eq!(mapped.status(), 409);
		assert_eq!(mapped.metadata_value("expected_version"), Some(&json!(2)));
		assert_eq!(mapped.metadata_value("actual_version"), Some(&json!(3)));
	}

	#[rstest]
	fn test_binding_conflict_names_existing_binding() {
		// Arrange
		let err = WorkflowError::BindingConflict {
			existing_id: "b1".into(),
			key: BindingKey {
				scope_type: ScopeType::Trait,
				scope_ref: "editorial".into(),
				priority: 10,
				environment: String::new(),
			},
		};

		// Act
		let mapped = BackofficeError::from(err);

		// Assert
		assert_eq!(mapped.text_code(), TextCode::BindingConflict);
		assert_eq!(mapped.metadata_value("existing_binding_id"), Some(&json!("b1")));
		assert_eq!(mapped.metadata_value("scope_type"), Some(&json!("trait")));
	}

	#[rstest]
	fn test_invalid_transition_maps_to_400() {
		// Arrange
		let err = WorkflowError::InvalidTransition {
			message: "no transition from draft to archived".into(),
			workflow_id: "w1".into(),
			from: "draft".into(),
			to: "archived".into(),
			transition: None,
		};

		// Act
		let mapped = BackofficeError::from(err);

		// Assert
		assert_eq!(mapped.text_code(), TextCode::WorkflowInvalidTransition);
		assert_eq!(mapped.status(), 400);
		assert_eq!(mapped.metadata_value("from_state"), Some(&json!("draft")));
	}
}
