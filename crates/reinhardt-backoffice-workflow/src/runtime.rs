//! Transition evaluation
//!
//! A transition runs in a fixed order: resolve the bound workflow, load its
//! definition, select the transition, check translations, and on a
//! translation block run the queue hook before returning the error. The
//! caller persists the state change.

use crate::definition::WorkflowStatus;
use crate::error::{WorkflowError, WorkflowResult};
use crate::repository::WorkflowDefinitionRepository;
use crate::resolver::{ResolutionSource, ResolveInput, WorkflowResolver};
use crate::translation::{GateInput, TranslationGate, TranslationQueueHook, TranslationSource};
use reinhardt_backoffice_core::activity::{self, ActivityAction, ActivityEvent, ActivitySink};
use reinhardt_backoffice_core::{Context, Feature, FeatureGate, NoopActivitySink};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
	pub entity_type: String,
	pub entity_id: String,
	#[serde(default)]
	pub traits: Vec<String>,
	pub current_state: String,
	pub target_state: String,
	#[serde(default)]
	pub transition_name: Option<String>,
	/// Overrides the context environment
	#[serde(default)]
	pub environment: Option<String>,
	#[serde(default)]
	pub requested_locale: Option<String>,
	/// Entity name translation policies are declared against; defaults to
	/// `entity_type`
	#[serde(default)]
	pub policy_entity: Option<String>,
	#[serde(default)]
	pub translation_source: Option<TranslationSource>,
	#[serde(default)]
	pub allow_missing_translations: bool,
}

impl TransitionRequest {
	pub fn new(
		entity_type: impl Into<String>,
		entity_id: impl Into<String>,
		current_state: impl Into<String>,
		target_state: impl Into<String>,
	) -> Self {
		Self {
			entity_type: entity_type.into(),
			entity_id: entity_id.into(),
			current_state: current_state.into(),
			target_state: target_state.into(),
			..Self::default()
		}
	}

	pub fn with_traits<I, S>(mut self, traits: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.traits = traits.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_transition(mut self, name: impl Into<String>) -> Self {
		self.transition_name = Some(name.into());
		self
	}

	pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
		self.environment = Some(environment.into());
		self
	}

	pub fn with_requested_locale(mut self, locale: impl Into<String>) -> Self {
		self.requested_locale = Some(locale.into());
		self
	}

	pub fn with_policy_entity(mut self, entity: impl Into<String>) -> Self {
		self.policy_entity = Some(entity.into());
		self
	}

	pub fn with_translation_source(mut self, source: TranslationSource) -> Self {
		self.translation_source = Some(source);
		self
	}

	pub fn allow_missing_translations(mut self, allow: bool) -> Self {
		self.allow_missing_translations = allow;
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResult {
	pub from_state: String,
	pub to_state: String,
	pub transition_name: String,
	pub workflow_id: String,
	pub workflow_version: u64,
	pub source: ResolutionSource,
}

#[derive(Clone)]
pub struct WorkflowRuntime {
	resolver: WorkflowResolver,
	workflows: Arc<dyn WorkflowDefinitionRepository>,
	gate: Option<TranslationGate>,
	queue_hook: Option<TranslationQueueHook>,
	features: FeatureGate,
	activity: Arc<dyn ActivitySink>,
}

impl WorkflowRuntime {
	pub fn new(resolver: WorkflowResolver, workflows: Arc<dyn WorkflowDefinitionRepository>) -> Self {
		Self {
			resolver,
			workflows,
			gate: None,
			queue_hook: None,
			features: FeatureGate::all(),
			activity: Arc::new(NoopActivitySink),
		}
	}

	pub fn with_gate(mut self, gate: TranslationGate) -> Self {
		self.gate = Some(gate);
		self
	}

	pub fn with_queue_hook(mut self, hook: TranslationQueueHook) -> Self {
		self.queue_hook = Some(hook);
		self
	}

	pub fn with_features(mut self, features: FeatureGate) -> Self {
		self.features = features;
		self
	}

	pub fn with_activity(mut self, activity: Arc<dyn ActivitySink>) -> Self {
		self.activity = activity;
		self
	}

	pub fn resolver(&self) -> &WorkflowResolver {
		&self.resolver
	}

	pub fn features(&self) -> &FeatureGate {
		&self.features
	}

	pub async fn transition(
		&self,
		ctx: &Context,
		request: &TransitionRequest,
	) -> WorkflowResult<TransitionResult> {
		self.features.require(Feature::Workflows)?;
		ctx.check()?;

		let environment = request
			.environment
			.as_deref()
			.map(str::trim)
			.filter(|e| !e.is_empty())
			.unwrap_or_else(|| ctx.environment())
			.to_string();

		let input = ResolveInput {
			content_type: request.entity_type.clone(),
			traits: request.traits.clone(),
			environment: Some(environment.clone()),
		};
		let resolution = self.resolver.resolve(ctx, &input).await?;

		let workflow = ctx.run(self.workflows.get(&resolution.workflow_id)).await?;
		// Draft workflows are not runnable yet.
		if workflow.status == WorkflowStatus::Draft {
			return Err(WorkflowError::WorkflowNotFound(workflow.id));
		}

		let transition = workflow.definition.select_transition(
			&workflow.id,
			&request.current_state,
			&request.target_state,
			request.transition_name.as_deref(),
		)?;

		if let Some(gate) = &self.gate
			&& self.features.is_enabled(Feature::Translations)
			&& !request.allow_missing_translations
		{
			let gate_input = GateInput {
				entity_type: request.entity_type.clone(),
				entity_id: request.entity_id.clone(),
				policy_entity: request
					.policy_entity
					.clone()
					.unwrap_or_else(|| request.entity_type.clone()),
				transition: transition.name.clone(),
				state: transition.to.clone(),
				environment: environment.clone(),
				requested_locale: request
					.requested_locale
					.clone()
					.or_else(|| ctx.locale().map(str::to_string)),
			};
			if let Err(err) = gate.check(ctx, &gate_input).await {
				if let Some(missing) = err.missing_translations()
					&& let Some(hook) = &self.queue_hook
					&& self.features.is_enabled(Feature::TranslationQueue)
				{
					let source = request.translation_source.clone().unwrap_or_else(|| {
						TranslationSource::new(gate_input.requested_locale.clone().unwrap_or_default())
					});
					let outcome = hook.handle(ctx, missing, &source).await;
					tracing::debug!(
						entity_id = %request.entity_id,
						created = outcome.created,
						reused = outcome.reused,
						failed = outcome.failed,
						"translation queue hook finished"
					);
				}
				return Err(err);
			}
		}

		let result = TransitionResult {
			from_state: transition.from.clone(),
			to_state: transition.to.clone(),
			transition_name: transition.name.clone(),
			workflow_id: workflow.id.clone(),
			workflow_version: workflow.version,
			source: resolution.source,
		};

		tracing::info!(
			entity_type = %request.entity_type,
			entity_id = %request.entity_id,
			workflow_id = %result.workflow_id,
			transition = %result.transition_name,
			from = %result.from_state,
			to = %result.to_state,
			"workflow transition applied"
		);
		activity::emit(
			self.activity.as_ref(),
			ActivityEvent::new(
				ActivityAction::WorkflowTransitioned,
				request.entity_type.clone(),
				request.entity_id.clone(),
			)
			.with_actor(ctx.actor())
			.with_metadata("workflow_id", result.workflow_id.clone())
			.with_metadata("transition", result.transition_name.clone())
			.with_metadata("from_state", result.from_state.clone())
			.with_metadata("to_state", result.to_state.clone()),
		)
		.await;

		Ok(result)
	}
}
