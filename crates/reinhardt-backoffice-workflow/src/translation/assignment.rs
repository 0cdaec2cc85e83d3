//! Translation assignments
//!
//! At most one active assignment exists per `(translation_group_id,
//! target_locale)`; [`AssignmentRepository::create_or_reuse_active`] enforces
//! that atomically.

use crate::error::{WorkflowError, WorkflowResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reinhardt_backoffice_core::text::normalize_locale;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
	#[default]
	Pending,
	Claimed,
	InProgress,
	Review,
	Completed,
	Cancelled,
}

impl AssignmentStatus {
	/// Terminal assignments no longer block new ones.
	pub fn is_active(&self) -> bool {
		!matches!(self, AssignmentStatus::Completed | AssignmentStatus::Cancelled)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
	#[default]
	OpenPool,
	Direct,
}

impl AssignmentType {
	pub fn as_str(&self) -> &'static str {
		match self {
			AssignmentType::OpenPool => "open_pool",
			AssignmentType::Direct => "direct",
		}
	}
}

impl FromStr for AssignmentType {
	type Err = WorkflowError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"open_pool" => Ok(AssignmentType::OpenPool),
			"direct" => Ok(AssignmentType::Direct),
			other => Err(WorkflowError::invalid_definition(
				format!("unknown assignment type '{}'", other),
				"assignment_type",
				"expected 'open_pool' or 'direct'",
			)),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentPriority {
	Low,
	#[default]
	Normal,
	High,
	Urgent,
}

impl fmt::Display for AssignmentPriority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			AssignmentPriority::Low => "low",
			AssignmentPriority::Normal => "normal",
			AssignmentPriority::High => "high",
			AssignmentPriority::Urgent => "urgent",
		})
	}
}

impl FromStr for AssignmentPriority {
	type Err = WorkflowError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"low" => Ok(AssignmentPriority::Low),
			"normal" => Ok(AssignmentPriority::Normal),
			"high" => Ok(AssignmentPriority::High),
			"urgent" => Ok(AssignmentPriority::Urgent),
			other => Err(WorkflowError::invalid_definition(
				format!("unknown assignment priority '{}'", other),
				"priority",
				"expected low, normal, high or urgent",
			)),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationAssignment {
	pub id: String,
	pub translation_group_id: String,
	pub entity_type: String,
	pub source_record_id: String,
	pub source_locale: String,
	pub target_locale: String,
	pub status: AssignmentStatus,
	pub assignment_type: AssignmentType,
	pub priority: AssignmentPriority,
	#[serde(default)]
	pub assignee_id: Option<String>,
	#[serde(default)]
	pub source_title: String,
	#[serde(default)]
	pub source_path: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub version: u64,
}

impl TranslationAssignment {
	/// Pending open-pool candidate; locales are lowercased.
	pub fn candidate(
		translation_group_id: impl Into<String>,
		entity_type: impl Into<String>,
		source_record_id: impl Into<String>,
		source_locale: &str,
		target_locale: &str,
	) -> Self {
		let now = Utc::now();
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			translation_group_id: translation_group_id.into(),
			entity_type: entity_type.into(),
			source_record_id: source_record_id.into(),
			source_locale: normalize_locale(source_locale),
			target_locale: normalize_locale(target_locale),
			status: AssignmentStatus::Pending,
			assignment_type: AssignmentType::OpenPool,
			priority: AssignmentPriority::Normal,
			assignee_id: None,
			source_title: String::new(),
			source_path: String::new(),
			created_at: now,
			updated_at: now,
			version: 0,
		}
	}

	pub fn is_active(&self) -> bool {
		self.status.is_active()
	}

	fn same_slot(&self, other: &TranslationAssignment) -> bool {
		self.translation_group_id == other.translation_group_id
			&& self.target_locale == other.target_locale
	}
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
	/// Returns the active assignment for the candidate's group and target
	/// locale, inserting the candidate when there is none. The flag is
	/// `true` when the candidate was inserted.
	async fn create_or_reuse_active(
		&self,
		candidate: TranslationAssignment,
	) -> WorkflowResult<(TranslationAssignment, bool)>;

	async fn get(&self, id: &str) -> WorkflowResult<TranslationAssignment>;

	async fn list_by_group(&self, translation_group_id: &str) -> WorkflowResult<Vec<TranslationAssignment>>;

	/// CAS status change.
	async fn update_status(
		&self,
		id: &str,
		status: AssignmentStatus,
		expected_version: u64,
	) -> WorkflowResult<TranslationAssignment>;
}

#[derive(Debug, Default)]
pub struct InMemoryAssignmentRepository {
	assignments: Mutex<Vec<TranslationAssignment>>,
}

impl InMemoryAssignmentRepository {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn all(&self) -> Vec<TranslationAssignment> {
		self.assignments.lock().clone()
	}

	pub fn len(&self) -> usize {
		self.assignments.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.assignments.lock().is_empty()
	}
}

#[async_trait]
impl AssignmentRepository for InMemoryAssignmentRepository {
	async fn create_or_reuse_active(
		&self,
		mut candidate: TranslationAssignment,
	) -> WorkflowResult<(TranslationAssignment, bool)> {
		candidate.target_locale = normalize_locale(&candidate.target_locale);
		candidate.source_locale = normalize_locale(&candidate.source_locale);

		let mut assignments = self.assignments.lock();
		if let Some(existing) = assignments
			.iter()
			.find(|a| a.is_active() && a.same_slot(&candidate))
		{
			return Ok((existing.clone(), false));
		}
		let now = Utc::now();
		candidate.version = 1;
		candidate.created_at = now;
		candidate.updated_at = now;
		assignments.push(candidate.clone());
		Ok((candidate, true))
	}

	async fn get(&self, id: &str) -> WorkflowResult<TranslationAssignment> {
		self.assignments
			.lock()
			.iter()
			.find(|a| a.id == id)
			.cloned()
			.ok_or_else(|| WorkflowError::AssignmentNotFound(id.to_string()))
	}

	async fn list_by_group(&self, translation_group_id: &str) -> WorkflowResult<Vec<TranslationAssignment>> {
		Ok(self
			.assignments
			.lock()
			.iter()
			.filter(|a| a.translation_group_id == translation_group_id)
			.cloned()
			.collect())
	}

	async fn update_status(
		&self,
		id: &str,
		status: AssignmentStatus,
		expected_version: u64,
	) -> WorkflowResult<TranslationAssignment> {
		let mut assignments = self.assignments.lock();
		let assignment = assignments
			.iter_mut()
			.find(|a| a.id == id)
			.ok_or_else(|| WorkflowError::AssignmentNotFound(id.to_string()))?;
		if assignment.version != expected_version {
			return Err(WorkflowError::VersionConflict {
				entity: "translation_assignment",
				id: id.to_string(),
				expected: expected_version,
				actual: assignment.version,
			});
		}
		assignment.status = status;
		assignment.version += 1;
		assignment.updated_at = Utc::now();
		Ok(assignment.clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn candidate(locale: &str) -> TranslationAssignment {
		TranslationAssignment::candidate("tg_1", "article", "a1", "en", locale)
	}

	#[rstest]
	#[tokio::test]
	async fn test_create_then_reuse() {
		// Arrange
		let repo = InMemoryAssignmentRepository::new();

		// Act
		let (first, created) = repo.create_or_reuse_active(candidate("es")).await.unwrap();
		let (second, created_again) = repo.create_or_reuse_active(candidate("ES")).await.unwrap();

		// Assert
		assert!(created);
		assert!(!created_again);
		assert_eq!(first.id, second.id);
		assert_eq!(repo.len(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_terminal_assignment_frees_the_slot() {
		// Arrange
		let repo = InMemoryAssignmentRepository::new();
		let (first, _) = repo.create_or_reuse_active(candidate("fr")).await.unwrap();
		repo.update_status(&first.id, AssignmentStatus::Completed, 1)
			.await
			.unwrap();

		// Act
		let (second, created) = repo.create_or_reuse_active(candidate("fr")).await.unwrap();

		// Assert
		assert!(created);
		assert_ne!(first.id, second.id);
		assert_eq!(repo.list_by_group("tg_1").await.unwrap().len(), 2);
	}

	#[rstest]
	#[tokio::test]
	async fn test_update_status_is_compare_and_swap() {
		// Arrange
		let repo = InMemoryAssignmentRepository::new();
		let (assignment, _) = repo.create_or_reuse_active(candidate("de")).await.unwrap();

		// Act
		let err = repo
			.update_status(&assignment.id, AssignmentStatus::Claimed, 5)
			.await
			.unwrap_err();

		// Assert
		assert!(matches!(
			err,
			WorkflowError::VersionConflict {
				expected: 5,
				actual: 1,
				..
			}
		));
	}

	#[rstest]
	#[case("open_pool", AssignmentType::OpenPool)]
	#[case("direct", AssignmentType::Direct)]
	fn test_assignment_type_parse(#[case] raw: &str, #[case] expected: AssignmentType) {
		assert_eq!(raw.parse::<AssignmentType>().unwrap(), expected);
	}
}
