//! Error types for dynamic panels

use crate::panel::PanelAction;
use reinhardt_backoffice_core::{BackofficeError, TextCode};
use reinhardt_backoffice_schema::SchemaError;
use reinhardt_backoffice_workflow::WorkflowError;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
	#[error("panel '{0}' is not registered")]
	PanelNotFound(String),

	#[error("record '{id}' not found in panel '{panel_id}'")]
	RecordNotFound { panel_id: String, id: String },

	#[error("not allowed to {} in panel '{panel_id}'", .action.as_str())]
	Forbidden { panel_id: String, action: PanelAction },

	#[error("path '{path}' is already used by record '{existing_id}'")]
	PathConflict {
		panel_id: String,
		path: String,
		existing_id: String,
	},

	/// Autosave token mismatch
	#[error("record '{id}' changed since version {expected} (now {actual})")]
	StaleVersion {
		panel_id: String,
		id: String,
		expected: u64,
		actual: u64,
		latest_server_state: Value,
	},

	#[error("{message}")]
	Invalid {
		message: String,
		fields: BTreeMap<String, String>,
	},

	/// A registration sub-step failed; partial state was rolled back
	#[error("registering panel '{panel_id}' failed at {step}: {message}")]
	Registration {
		panel_id: String,
		step: &'static str,
		message: String,
	},

	#[error(transparent)]
	Schema(#[from] SchemaError),

	#[error(transparent)]
	Workflow(#[from] WorkflowError),

	#[error(transparent)]
	Core(#[from] BackofficeError),
}

impl PanelError {
	pub fn invalid<K, V>(message: impl Into<String>, field: K, reason: V) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		PanelError::Invalid {
			message: message.into(),
			fields: BTreeMap::from([(field.into(), reason.into())]),
		}
	}

	pub fn is_cancelled(&self) -> bool {
		match self {
			PanelError::Core(err) => err.is_cancelled(),
			PanelError::Workflow(WorkflowError::Core(err)) => err.is_cancelled(),
			_ => false,
		}
	}
}

/// Result type for panel operations
pub type PanelResult<T> = Result<T, PanelError>;

/// Path clients re-read after an autosave conflict.
pub fn latest_state_path(panel_id: &str, id: &str) -> String {
	format!("/api/{}/{}", panel_id, id)
}

impl From<PanelError> for BackofficeError {
	fn from(err: PanelError) -> Self {
		let message = err.to_string();
		match err {
			PanelError::PanelNotFound(panel_id) => {
				BackofficeError::not_found(message).with_metadata("panel", panel_id)
			}
			PanelError::RecordNotFound { panel_id, id } => BackofficeError::not_found(message)
				.with_metadata("panel", panel_id)
				.with_metadata("id", id),
			PanelError::Forbidden { panel_id, action } => BackofficeError::forbidden(message)
				.with_metadata("panel", panel_id)
				.with_metadata("action", action.as_str()),
			PanelError::PathConflict {
				panel_id,
				path,
				existing_id,
			} => BackofficeError::new(TextCode::PathConflict, message)
				.with_metadata("panel", panel_id)
				.with_metadata("path", path)
				.with_metadata("existing_id", existing_id),
			PanelError::StaleVersion {
				panel_id,
				id,
				expected,
				actual,
				latest_server_state,
			} => BackofficeError::conflict(message)
				.with_metadata("latest_state_path", latest_state_path(&panel_id, &id))
				.with_metadata("latest_server_state", latest_server_state)
				.with_metadata("expected_version", expected)
				.with_metadata("actual_version", actual)
				.with_metadata("panel", panel_id)
				.with_metadata("id", id),
			PanelError::Invalid { message, fields } => {
				BackofficeError::validation_fields(message, fields)
			}
			PanelError::Registration { panel_id, step, .. } => {
				BackofficeError::internal(message)
					.with_metadata("panel", panel_id)
					.with_metadata("step", step)
			}
			PanelError::Schema(err) => err.into(),
			PanelError::Workflow(err) => err.into(),
			PanelError::Core(err) => err,
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
	fn test_stale_version_points_at_latest_state() {
		// Arrange
		let err = PanelError::StaleVersion {
			panel_id: "article".into(),
			id: "a1".into(),
			expected: 1,
			actual: 2,
			latest_server_state: json!({"id": "a1", "version": 2}),
		};

		// Act
		let mapped = BackofficeError::from(err);

		// Assert
		assert_eq!(mapped.text_code(), TextCode::Conflict);
		assert_eq!(
			mapped.metadata_value("latest_state_path"),
			Some(&json!("/api/article/a1"))
		);
		assert_eq!(
			mapped.metadata_value("latest_server_state"),
			Some(&json!({"id": "a1", "version": 2}))
		);
	}

	#[rstest]
	#[case(PanelError::PanelNotFound("x".into()), TextCode::NotFound)]
	#[case(
		PanelError::Forbidden { panel_id: "x".into(), action: PanelAction::Delete },
		TextCode::Forbidden
	)]
	#[case(
		PanelError::PathConflict { panel_id: "x".into(), path: "/a".into(), existing_id: "1".into() },
		TextCode::PathConflict
	)]
	fn test_text_codes(#[case] err: PanelError, #[case] expected: TextCode) {
		assert_eq!(BackofficeError::from(err).text_code(), expected);
	}

	#[rstest]
	fn test_registration_failure_is_internal() {
		// Arrange
		let err = PanelError::Registration {
			panel_id: "article".into(),
			step: "permissions",
			message: "backend offline".into(),
		};

		// Act
		let mapped = BackofficeError::from(err);

		// Assert
		assert_eq!(mapped.kind(), ErrorKind::Internal);
		assert_eq!(mapped.metadata_value("step"), Some(&json!("permissions")));
	}
}
