//! Translation queue auto-create hook
//!
//! Runs after the gate blocks a transition and files one assignment per
//! missing locale. The hook never changes the caller's outcome: repository
//! errors and panics are logged and counted, then dropped.

use crate::error::WorkflowResult;
use crate::translation::assignment::{
	AssignmentPriority, AssignmentRepository, AssignmentType, TranslationAssignment,
};
use crate::translation::gate::MissingTranslations;
use futures::FutureExt;
use reinhardt_backoffice_core::activity::{self, ActivityAction, ActivityEvent, ActivitySink};
use reinhardt_backoffice_core::settings::TranslationSettings;
use reinhardt_backoffice_core::text::normalize_locale;
use reinhardt_backoffice_core::{Context, NoopActivitySink, metrics};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

const HOOK_NAME: &str = "translation_queue";

/// Source record details copied onto every assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationSource {
	/// Falls back to the entity id when empty
	#[serde(default)]
	pub translation_group_id: Option<String>,
	pub source_locale: String,
	#[serde(default)]
	pub source_title: String,
	#[serde(default)]
	pub source_path: String,
}

impl TranslationSource {
	pub fn new(source_locale: impl Into<String>) -> Self {
		Self {
			source_locale: source_locale.into(),
			..Self::default()
		}
	}

	pub fn with_group(mut self, translation_group_id: impl Into<String>) -> Self {
		self.translation_group_id = Some(translation_group_id.into());
		self
	}

	pub fn with_title(mut self, title: impl Into<String>) -> Self {
		self.source_title = title.into();
		self
	}

	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.source_path = path.into();
		self
	}
}

/// What one hook run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueOutcome {
	pub created: usize,
	pub reused: usize,
	pub failed: usize,
	pub assignment_ids: Vec<String>,
}

#[derive(Clone)]
pub struct TranslationQueueHook {
	repository: Arc<dyn AssignmentRepository>,
	assignment_type: AssignmentType,
	priority: AssignmentPriority,
	activity: Arc<dyn ActivitySink>,
}

impl TranslationQueueHook {
	pub fn new(repository: Arc<dyn AssignmentRepository>) -> Self {
		Self {
			repository,
			assignment_type: AssignmentType::OpenPool,
			priority: AssignmentPriority::Normal,
			activity: Arc::new(NoopActivitySink),
		}
	}

	pub fn from_settings(
		repository: Arc<dyn AssignmentRepository>,
		settings: &TranslationSettings,
	) -> WorkflowResult<Self> {
		Ok(Self::new(repository)
			.with_assignment_type(settings.assignment_type.parse()?)
			.with_priority(settings.priority.parse()?))
	}

	pub fn with_assignment_type(mut self, assignment_type: AssignmentType) -> Self {
		self.assignment_type = assignment_type;
		self
	}

	pub fn with_priority(mut self, priority: AssignmentPriority) -> Self {
		self.priority = priority;
		self
	}

	pub fn with_activity(mut self, activity: Arc<dyn ActivitySink>) -> Self {
		self.activity = activity;
		self
	}

	/// Create or reuse an assignment for every missing locale except the
	/// source locale.
	pub async fn handle(
		&self,
		ctx: &Context,
		missing: &MissingTranslations,
		source: &TranslationSource,
	) -> QueueOutcome {
		match AssertUnwindSafe(self.enqueue(ctx, missing, source))
			.catch_unwind()
			.await
		{
			Ok(outcome) => outcome,
			Err(_) => {
				tracing::error!(
					entity_id = %missing.entity_id,
					entity_type = %missing.entity_type,
					"translation queue hook panicked"
				);
				metrics::record_side_effect_failure(HOOK_NAME);
				QueueOutcome {
					failed: 1,
					..QueueOutcome::default()
				}
			}
		}
	}

	async fn enqueue(
		&self,
		ctx: &Context,
		missing: &MissingTranslations,
		source: &TranslationSource,
	) -> QueueOutcome {
		let source_locale = normalize_locale(&source.source_locale);
		let group = source
			.translation_group_id
			.as_deref()
			.map(str::trim)
			.filter(|g| !g.is_empty())
			.unwrap_or(missing.entity_id.as_str());

		let mut targets: Vec<String> = Vec::new();
		for locale in &missing.missing_locales {
			let locale = normalize_locale(locale);
			if locale.is_empty() || locale == source_locale || targets.contains(&locale) {
				continue;
			}
			targets.push(locale);
		}

		let mut outcome = QueueOutcome::default();
		for target in targets {
			let mut candidate = TranslationAssignment::candidate(
				group,
				&missing.entity_type,
				&missing.entity_id,
				&source_locale,
				&target,
			);
			candidate.assignment_type = self.assignment_type;
			candidate.priority = self.priority;
			candidate.source_title = source.source_title.clone();
			candidate.source_path = source.source_path.clone();

			match ctx
				.run(self.repository.create_or_reuse_active(candidate))
				.await
			{
				Ok((assignment, is_new)) => {
					let (label, action) = if is_new {
						outcome.created += 1;
						("created", ActivityAction::AssignmentCreated)
					} else {
						outcome.reused += 1;
						("reused", ActivityAction::AssignmentReused)
					};
					metrics::record_assignment(label);
					tracing::info!(
						assignment_id = %assignment.id,
						translation_group_id = %assignment.translation_group_id,
						target_locale = %assignment.target_locale,
						outcome = label,
						"translation assignment queued"
					);
					activity::emit(
						self.activity.as_ref(),
						ActivityEvent::new(action, "translation_assignment", assignment.id.clone())
							.with_actor(ctx.actor())
							.with_metadata("translation_group_id", assignment.translation_group_id.clone())
							.with_metadata("target_locale", assignment.target_locale.clone())
							.with_metadata("entity_type", assignment.entity_type.clone())
							.with_metadata("source_record_id", assignment.source_record_id.clone()),
					)
					.await;
					outcome.assignment_ids.push(assignment.id);
				}
				Err(err) => {
					outcome.failed += 1;
					metrics::record_assignment("failed");
					metrics::record_side_effect_failure(HOOK_NAME);
					tracing::warn!(
						translation_group_id = %group,
						target_locale = %target,
						error = %err,
						"translation assignment could not be queued"
					);
				}
			}
		}
		outcome
	}
}
