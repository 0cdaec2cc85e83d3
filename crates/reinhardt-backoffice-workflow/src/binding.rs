//! Workflow bindings
//!
//! A binding maps a scope (`global`, a content type, or a trait) to a
//! workflow. Among active bindings the `(scope_type, scope_ref, priority,
//! environment)` key is unique.

use crate::error::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
	Global,
	ContentType,
	Trait,
}

impl ScopeType {
	pub fn as_str(&self) -> &'static str {
		match self {
			ScopeType::Global => "global",
			ScopeType::ContentType => "content_type",
			ScopeType::Trait => "trait",
		}
	}

	/// Resolution tier; lower is more specific.
	pub fn specificity(&self) -> u8 {
		match self {
			ScopeType::ContentType => 0,
			ScopeType::Trait => 1,
			ScopeType::Global => 2,
		}
	}
}

impl fmt::Display for ScopeType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingStatus {
	#[default]
	Active,
	Inactive,
}

/// Uniqueness key among active bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingKey {
	pub scope_type: ScopeType,
	pub scope_ref: String,
	pub priority: i32,
	/// Empty for environment-less bindings
	pub environment: String,
}

impl fmt::Display for BindingKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}:{} (priority {}, environment '{}')",
			self.scope_type, self.scope_ref, self.priority, self.environment
		)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowBinding {
	pub id: String,
	pub scope_type: ScopeType,
	#[serde(default)]
	pub scope_ref: String,
	pub workflow_id: String,
	#[serde(default)]
	pub priority: i32,
	#[serde(default)]
	pub status: BindingStatus,
	/// `None` binds in every environment
	#[serde(default)]
	pub environment: Option<String>,
	#[serde(default)]
	pub version: u64,
	#[serde(default = "chrono::Utc::now")]
	pub created_at: DateTime<Utc>,
	#[serde(default = "chrono::Utc::now")]
	pub updated_at: DateTime<Utc>,
}

impl WorkflowBinding {
	fn new(scope_type: ScopeType, scope_ref: &str, workflow_id: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			scope_type,
			scope_ref: scope_ref.to_string(),
			workflow_id: workflow_id.into(),
			priority: 0,
			status: BindingStatus::Active,
			environment: None,
			version: 0,
			created_at: now,
			updated_at: now,
		}
	}

	pub fn global(workflow_id: impl Into<String>) -> Self {
		Self::new(ScopeType::Global, "", workflow_id)
	}

	pub fn content_type(content_type: &str, workflow_id: impl Into<String>) -> Self {
		Self::new(ScopeType::ContentType, content_type, workflow_id)
	}

	pub fn for_trait(trait_name: &str, workflow_id: impl Into<String>) -> Self {
		Self::new(ScopeType::Trait, trait_name, workflow_id)
	}

	pub fn with_id(mut self, id: impl Into<String>) -> Self {
		self.id = id.into();
		self
	}

	pub fn with_priority(mut self, priority: i32) -> Self {
		self.priority = priority;
		self
	}

	pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
		self.environment = Some(environment.into());
		self
	}

	pub fn with_status(mut self, status: BindingStatus) -> Self {
		self.status = status;
		self
	}

	pub fn is_active(&self) -> bool {
		self.status == BindingStatus::Active
	}

	pub fn key(&self) -> BindingKey {
		BindingKey {
			scope_type: self.scope_type,
			scope_ref: match self.scope_type {
				ScopeType::Global => String::new(),
				_ => self.scope_ref.trim().to_lowercase(),
			},
			priority: self.priority,
			environment: self.environment.clone().unwrap_or_default(),
		}
	}

	/// Bound in `environment` directly or through an environment-less binding.
	pub fn applies_to_environment(&self, environment: &str) -> bool {
		match &self.environment {
			None => true,
			Some(env) => env.is_empty() || env == environment,
		}
	}

	pub fn validate(&self) -> WorkflowResult<()> {
		if self.workflow_id.trim().is_empty() {
			return Err(WorkflowError::invalid_definition(
				"binding must reference a workflow",
				"workflow_id",
				"must not be empty",
			));
		}
		if self.scope_type != ScopeType::Global && self.scope_ref.trim().is_empty() {
			return Err(WorkflowError::invalid_definition(
				format!("{} binding requires a scope reference", self.scope_type),
				"scope_ref",
				"must not be empty",
			));
		}
		Ok(())
	}
}
