//! Content-type model
//!
//! A content type is a user-authored JSON schema that materializes into an
//! admin panel. Its slug doubles as the panel id.

use crate::error::{BackofficeError, BackofficeResult};
use crate::text::is_valid_slug;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTypeStatus {
	#[default]
	Draft,
	Active,
	Deprecated,
}

impl ContentTypeStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			ContentTypeStatus::Draft => "draft",
			ContentTypeStatus::Active => "active",
			ContentTypeStatus::Deprecated => "deprecated",
		}
	}

	/// `draft -> active -> deprecated`, plus `draft -> deprecated`.
	pub fn can_transition_to(self, next: ContentTypeStatus) -> bool {
		use ContentTypeStatus::*;
		matches!(
			(self, next),
			(Draft, Draft)
				| (Active, Active)
				| (Deprecated, Deprecated)
				| (Draft, Active)
				| (Draft, Deprecated)
				| (Active, Deprecated)
		)
	}
}

impl fmt::Display for ContentTypeStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Optional behaviour switched on per content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
	/// Traits used for workflow binding resolution
	pub traits: Vec<String>,
	/// Register a search adapter with the panel
	pub search: bool,
	/// Run workflow transitions on state changes
	pub workflow: bool,
	/// Gate transitions on translation coverage
	pub translations: bool,
}

impl Default for Capabilities {
	fn default() -> Self {
		Self {
			traits: Vec::new(),
			search: true,
			workflow: true,
			translations: false,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
	pub id: String,
	pub slug: String,
	pub name: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub icon: Option<String>,
	pub schema: Value,
	#[serde(default)]
	pub ui_schema: Option<Value>,
	#[serde(default)]
	pub capabilities: Capabilities,
	#[serde(default)]
	pub status: ContentTypeStatus,
	#[serde(default)]
	pub allow_breaking_changes: bool,
	#[serde(default = "chrono::Utc::now")]
	pub created_at: DateTime<Utc>,
	#[serde(default = "chrono::Utc::now")]
	pub updated_at: DateTime<Utc>,
}

impl ContentType {
	/// New draft content type with a random id.
	pub fn new(slug: impl Into<String>, name: impl Into<String>, schema: Value) -> Self {
		let now = Utc::now();
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			slug: slug.into(),
			name: name.into(),
			description: None,
			icon: None,
			schema,
			ui_schema: None,
			capabilities: Capabilities::default(),
			status: ContentTypeStatus::Draft,
			allow_breaking_changes: false,
			created_at: now,
			updated_at: now,
		}
	}

	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = id.into();
		self
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
		self.icon = Some(icon.into());
		self
	}

	pub fn with_ui_schema(mut self, ui_schema: Value) -> Self {
		self.ui_schema = Some(ui_schema);
		self
	}

	pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
		self.capabilities = capabilities;
		self
	}

	pub fn with_traits<I, S>(mut self, traits: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.capabilities.traits = traits.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_status(mut self, status: ContentTypeStatus) -> Self {
		self.status = status;
		self
	}

	pub fn allowing_breaking_changes(mut self) -> Self {
		self.allow_breaking_changes = true;
		self
	}

	pub fn panel_id(&self) -> &str {
		&self.slug
	}

	pub fn is_active(&self) -> bool {
		self.status == ContentTypeStatus::Active
	}

	pub fn validate_slug(&self) -> BackofficeResult<()> {
		if is_valid_slug(&self.slug) {
			return Ok(());
		}
		Err(BackofficeError::validation_fields(
			"invalid content type slug",
			[(
				"slug",
				"must start with a lowercase letter and contain only a-z, 0-9, '-' or '_'",
			)],
		))
	}

	/// Moves to `next`, rejecting transitions the status machine forbids.
	pub fn transition_status(&mut self, next: ContentTypeStatus) -> BackofficeResult<()> {
		if !self.status.can_transition_to(next) {
			return Err(BackofficeError::validation_fields(
				format!("cannot move content type from {} to {}", self.status, next),
				[("status", format!("invalid transition {} -> {}", self.status, next))],
			));
		}
		self.status = next;
		self.updated_at = Utc::now();
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TextCode;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case(ContentTypeStatus::Draft, ContentTypeStatus::Active, true)]
	#[case(ContentTypeStatus::Draft, ContentTypeStatus::Deprecated, true)]
	#[case(ContentTypeStatus::Active, ContentTypeStatus::Deprecated, true)]
	#[case(ContentTypeStatus::Active, ContentTypeStatus::Draft, false)]
	#[case(ContentTypeStatus::Deprecated, ContentTypeStatus::Active, false)]
	fn test_status_machine(
		#[case] from: ContentTypeStatus,
		#[case] to: ContentTypeStatus,
		#[case] allowed: bool,
	) {
		assert_eq!(from.can_transition_to(to), allowed);
	}

	#[rstest]
	fn test_transition_status_rejects_reactivation() {
		// Arrange
		let mut ct = ContentType::new("article", "Article", json!({"type": "object"}))
			.with_status(ContentTypeStatus::Deprecated);

		// Act
		let err = ct.transition_status(ContentTypeStatus::Active).unwrap_err();

		// Assert
		assert_eq!(err.text_code(), TextCode::ValidationError);
		assert!(err.field_errors().contains_key("status"));
		assert_eq!(ct.status, ContentTypeStatus::Deprecated);
	}

	#[rstest]
	fn test_deserialize_applies_defaults() {
		// Arrange
		let raw = json!({
			"id": "ct_1",
			"slug": "article",
			"name": "Article",
			"schema": {"type": "object"}
		});

		// Act
		let ct: ContentType = serde_json::from_value(raw).unwrap();

		// Assert
		assert_eq!(ct.status, ContentTypeStatus::Draft);
		assert!(ct.capabilities.search);
		assert!(!ct.allow_breaking_changes);
		assert_eq!(ct.panel_id(), "article");
	}

	#[rstest]
	#[case("Article")]
	#[case("9lives")]
	fn test_validate_slug_rejects(#[case] slug: &str) {
		// Arrange
		let ct = ContentType::new(slug, "X", json!({}));

		// Act & Assert
		assert!(ct.validate_slug().is_err());
	}
}
