//! Workflow definitions
//!
//! A workflow is a state machine of named transitions between string
//! states. Persisted workflows are versioned; every stored revision is kept
//! so earlier versions can be restored.

use crate::error::{WorkflowError, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowTransition {
	pub name: String,
	pub from: String,
	pub to: String,
}

impl WorkflowTransition {
	pub fn new(name: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			from: from.into(),
			to: to.into(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
	pub initial_state: String,
	#[serde(default)]
	pub transitions: Vec<WorkflowTransition>,
}

impl WorkflowDefinition {
	pub fn new(initial_state: impl Into<String>) -> Self {
		Self {
			initial_state: initial_state.into(),
			transitions: Vec::new(),
		}
	}

	pub fn with_transition(
		mut self,
		name: impl Into<String>,
		from: impl Into<String>,
		to: impl Into<String>,
	) -> Self {
		self.transitions.push(WorkflowTransition::new(name, from, to));
		self
	}

	/// Every state named by the definition.
	pub fn states(&self) -> BTreeSet<&str> {
		let mut states = BTreeSet::from([self.initial_state.as_str()]);
		for t in &self.transitions {
			states.insert(t.from.as_str());
			states.insert(t.to.as_str());
		}
		states
	}

	/// Transitions leaving `state`.
	pub fn available_from(&self, state: &str) -> Vec<&WorkflowTransition> {
		self.transitions.iter().filter(|t| t.from == state).collect()
	}

	pub fn validate(&self) -> WorkflowResult<()> {
		let mut fields = BTreeMap::new();
		if self.initial_state.trim().is_empty() {
			fields.insert(
				"initial_state".to_string(),
				"initial state is required".to_string(),
			);
		}
		let mut seen = HashSet::new();
		for (idx, t) in self.transitions.iter().enumerate() {
			if t.name.trim().is_empty() || t.from.trim().is_empty() || t.to.trim().is_empty() {
				fields.insert(
					format!("transitions.{}", idx),
					"name, from and to are required".to_string(),
				);
				continue;
			}
			if !seen.insert((t.name.as_str(), t.from.as_str())) {
				fields.insert(
					format!("transitions.{}", idx),
					format!("duplicate transition '{}' from '{}'", t.name, t.from),
				);
			}
		}
		if fields.is_empty() {
			Ok(())
		} else {
			Err(WorkflowError::InvalidDefinition {
				message: "invalid workflow definition".to_string(),
				fields,
			})
		}
	}

	/// Picks the transition to run.
	///
	/// With a name, the named transition leaving `current` is used (and
	/// must land on `target` when one is given). Without a name, the single
	/// transition `current -> target` is used; none or several is an error.
	pub fn select_transition(
		&self,
		workflow_id: &str,
		current: &str,
		target: &str,
		name: Option<&str>,
	) -> WorkflowResult<&WorkflowTransition> {
		let invalid = |message: String| WorkflowError::InvalidTransition {
			message,
			workflow_id: workflow_id.to_string(),
			from: current.to_string(),
			to: target.to_string(),
			transition: name.map(str::to_string),
		};

		if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
			let transition = self
				.transitions
				.iter()
				.find(|t| t.name == name && t.from == current)
				.ok_or_else(|| {
					invalid(format!(
						"transition '{}' is not available from '{}'",
						name, current
					))
				})?;
			if !target.is_empty() && transition.to != target {
				return Err(invalid(format!(
					"transition '{}' leads to '{}', not '{}'",
					name, transition.to, target
				)));
			}
			return Ok(transition);
		}

		let mut matching = self
			.transitions
			.iter()
			.filter(|t| t.from == current && t.to == target);
		match (matching.next(), matching.next()) {
			(Some(transition), None) => Ok(transition),
			(None, _) => Err(invalid(format!(
				"no transition from '{}' to '{}'",
				current, target
			))),
			(Some(_), Some(_)) => Err(invalid(format!(
				"transition from '{}' to '{}' is ambiguous; name it explicitly",
				current, target
			))),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
	#[default]
	Draft,
	Active,
	Deprecated,
}

impl WorkflowStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			WorkflowStatus::Draft => "draft",
			WorkflowStatus::Active => "active",
			WorkflowStatus::Deprecated => "deprecated",
		}
	}

	/// `draft -> active -> deprecated`; staying put is always allowed.
	pub fn can_transition_to(self, next: WorkflowStatus) -> bool {
		use WorkflowStatus::*;
		self == next || matches!((self, next), (Draft, Active) | (Active, Deprecated))
	}
}

impl fmt::Display for WorkflowStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedWorkflow {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub environment: Option<String>,
	pub definition: WorkflowDefinition,
	#[serde(default)]
	pub status: WorkflowStatus,
	#[serde(default)]
	pub version: u64,
	#[serde(default = "chrono::Utc::now")]
	pub created_at: DateTime<Utc>,
	#[serde(default = "chrono::Utc::now")]
	pub updated_at: DateTime<Utc>,
}

impl PersistedWorkflow {
	pub fn new(id: impl Into<String>, name: impl Into<String>, definition: WorkflowDefinition) -> Self {
		let now = Utc::now();
		Self {
			id: id.into(),
			name: name.into(),
			environment: None,
			definition,
			status: WorkflowStatus::Draft,
			version: 0,
			created_at: now,
			updated_at: now,
		}
	}

	pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
		self.environment = Some(environment.into());
		self
	}

	pub fn with_status(mut self, status: WorkflowStatus) -> Self {
		self.status = status;
		self
	}

	pub fn validate(&self) -> WorkflowResult<()> {
		if self.id.trim().is_empty() {
			return Err(WorkflowError::invalid_definition(
				"workflow id is required",
				"id",
				"must not be empty",
			));
		}
		self.definition.validate()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	#[fixture]
	fn editorial() -> WorkflowDefinition {
		WorkflowDefinition::new("draft")
			.with_transition("submit", "draft", "review")
			.with_transition("publish", "review", "published")
			.with_transition("fast_publish", "draft", "published")
			.with_transition("reject", "review", "draft")
	}

	#[rstest]
	fn test_select_by_states(editorial: WorkflowDefinition) {
		// Act
		let transition = editorial
			.select_transition("w1", "review", "published", None)
			.unwrap();

		// Assert
		assert_eq!(transition.name, "publish");
	}

	#[rstest]
	fn test_select_by_name_checks_target(editorial: WorkflowDefinition) {
		// Act
		let err = editorial
			.select_transition("w1", "review", "published", Some("reject"))
			.unwrap_err();

		// Assert
		assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
	}

	#[rstest]
	fn test_ambiguous_selection_is_rejected() {
		// Arrange
		let definition = WorkflowDefinition::new("draft")
			.with_transition("publish", "draft", "live")
			.with_transition("force_publish", "draft", "live");

		// Act
		let err = definition
			.select_transition("w1", "draft", "live", None)
			.unwrap_err();

		// Assert
		assert!(err.to_string().contains("ambiguous"));
		let named = definition
			.select_transition("w1", "draft", "live", Some("force_publish"))
			.unwrap();
		assert_eq!(named.name, "force_publish");
	}

	#[rstest]
	fn test_validate_rejects_duplicates_and_blanks() {
		// Arrange
		let definition = WorkflowDefinition::new("")
			.with_transition("go", "a", "b")
			.with_transition("go", "a", "c")
			.with_transition("", "a", "d");

		// Act
		let err = definition.validate().unwrap_err();

		// Assert
		match err {
			WorkflowError::InvalidDefinition { fields, .. } => {
				assert!(fields.contains_key("initial_state"));
				assert!(fields.contains_key("transitions.1"));
				assert!(fields.contains_key("transitions.2"));
			}
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[rstest]
	#[case(WorkflowStatus::Draft, WorkflowStatus::Active, true)]
	#[case(WorkflowStatus::Active, WorkflowStatus::Deprecated, true)]
	#[case(WorkflowStatus::Draft, WorkflowStatus::Deprecated, false)]
	#[case(WorkflowStatus::Deprecated, WorkflowStatus::Active, false)]
	fn test_status_machine(
		#[case] from: WorkflowStatus,
		#[case] to: WorkflowStatus,
		#[case] allowed: bool,
	) {
		assert_eq!(from.can_transition_to(to), allowed);
	}

	#[rstest]
	fn test_states(editorial: WorkflowDefinition) {
		assert_eq!(
			editorial.states().into_iter().collect::<Vec<_>>(),
			vec!["draft", "published", "review"]
		);
	}
}
