//! Workflow and binding management
//!
//! Thin command layer over the repositories: every mutation carries the
//! version the caller last read, and rollbacks are written as new versions.

use crate::binding::{BindingStatus, ScopeType, WorkflowBinding};
use crate::definition::{PersistedWorkflow, WorkflowDefinition, WorkflowStatus};
use crate::error::{WorkflowError, WorkflowResult};
use crate::repository::{WorkflowBindingRepository, WorkflowDefinitionRepository};
use crate::resolver::{Resolution, ResolveInput, WorkflowResolver};
use reinhardt_backoffice_core::{Context, Feature, FeatureGate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Partial update of a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowUpdate {
	pub expected_version: u64,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub definition: Option<WorkflowDefinition>,
	#[serde(default)]
	pub status: Option<WorkflowStatus>,
	/// Restore the name and definition of this earlier version
	#[serde(default)]
	pub rollback_to_version: Option<u64>,
}

impl WorkflowUpdate {
	pub fn new(expected_version: u64) -> Self {
		Self {
			expected_version,
			..Self::default()
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn with_definition(mut self, definition: WorkflowDefinition) -> Self {
		self.definition = Some(definition);
		self
	}

	pub fn with_status(mut self, status: WorkflowStatus) -> Self {
		self.status = Some(status);
		self
	}

	pub fn rollback_to(mut self, version: u64) -> Self {
		self.rollback_to_version = Some(version);
		self
	}
}

/// Partial update of a binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingUpdate {
	pub expected_version: u64,
	#[serde(default)]
	pub scope_type: Option<ScopeType>,
	#[serde(default)]
	pub scope_ref: Option<String>,
	#[serde(default)]
	pub workflow_id: Option<String>,
	#[serde(default)]
	pub priority: Option<i32>,
	#[serde(default)]
	pub status: Option<BindingStatus>,
	/// `Some("")` clears the environment
	#[serde(default)]
	pub environment: Option<String>,
}

impl BindingUpdate {
	pub fn new(expected_version: u64) -> Self {
		Self {
			expected_version,
			..Self::default()
		}
	}

	pub fn with_status(mut self, status: BindingStatus) -> Self {
		self.status = Some(status);
		self
	}

	pub fn with_priority(mut self, priority: i32) -> Self {
		self.priority = Some(priority);
		self
	}

	pub fn with_workflow(mut self, workflow_id: impl Into<String>) -> Self {
		self.workflow_id = Some(workflow_id.into());
		self
	}
}

#[derive(Clone)]
pub struct WorkflowService {
	workflows: Arc<dyn WorkflowDefinitionRepository>,
	bindings: Arc<dyn WorkflowBindingRepository>,
	resolver: WorkflowResolver,
	features: FeatureGate,
}

impl WorkflowService {
	pub fn new(
		workflows: Arc<dyn WorkflowDefinitionRepository>,
		bindings: Arc<dyn WorkflowBindingRepository>,
	) -> Self {
		let resolver = WorkflowResolver::new(bindings.clone());
		Self {
			workflows,
			bindings,
			resolver,
			features: FeatureGate::all(),
		}
	}

	pub fn with_features(mut self, features: FeatureGate) -> Self {
		self.features = features;
		self
	}

	pub fn resolver(&self) -> &WorkflowResolver {
		&self.resolver
	}

	pub fn workflows(&self) -> Arc<dyn WorkflowDefinitionRepository> {
		self.workflows.clone()
	}

	fn enabled(&self, ctx: &Context) -> WorkflowResult<()> {
		self.features.require(Feature::Workflows)?;
		ctx.check()?;
		Ok(())
	}

	pub async fn create_workflow(
		&self,
		ctx: &Context,
		workflow: PersistedWorkflow,
	) -> WorkflowResult<PersistedWorkflow> {
		self.enabled(ctx)?;
		let created = ctx.run(self.workflows.create(workflow)).await?;
		tracing::info!(workflow_id = %created.id, version = created.version, "workflow created");
		Ok(created)
	}

	pub async fn get_workflow(&self, ctx: &Context, id: &str) -> WorkflowResult<PersistedWorkflow> {
		self.enabled(ctx)?;
		ctx.run(self.workflows.get(id)).await
	}

	pub async fn list_workflows(
		&self,
		ctx: &Context,
		environment: Option<&str>,
	) -> WorkflowResult<Vec<PersistedWorkflow>> {
		self.enabled(ctx)?;
		ctx.run(self.workflows.list(environment)).await
	}

	/// Applies `update` on top of the current revision.
	///
	/// A rollback copies the name and definition of the requested version;
	/// the stored result is always a new version.
	pub async fn update_workflow(
		&self,
		ctx: &Context,
		id: &str,
		update: WorkflowUpdate,
	) -> WorkflowResult<PersistedWorkflow> {
		self.enabled(ctx)?;
		let current = ctx.run(self.workflows.get(id)).await?;
		if current.version != update.expected_version {
			return Err(WorkflowError::VersionConflict {
				entity: "workflow",
				id: id.to_string(),
				expected: update.expected_version,
				actual: current.version,
			});
		}

		let mut next = current.clone();
		if let Some(version) = update.rollback_to_version {
			let restored = ctx.run(self.workflows.get_version(id, version)).await?;
			next.name = restored.name;
			next.definition = restored.definition;
		}
		if let Some(name) = update.name {
			next.name = name;
		}
		if let Some(definition) = update.definition {
			next.definition = definition;
		}
		if let Some(status) = update.status {
			if !current.status.can_transition_to(status) {
				return Err(WorkflowError::invalid_definition(
					format!(
						"workflow cannot move from {} to {}",
						current.status, status
					),
					"status",
					format!("{} -> {} is not allowed", current.status, status),
				));
			}
			next.status = status;
		}

		let saved = ctx
			.run(self.workflows.update(next, update.expected_version))
			.await?;
		tracing::info!(
			workflow_id = %saved.id,
			version = saved.version,
			rollback_to_version = ?update.rollback_to_version,
			"workflow updated"
		);
		Ok(saved)
	}

	pub async fn create_binding(
		&self,
		ctx: &Context,
		binding: WorkflowBinding,
	) -> WorkflowResult<WorkflowBinding> {
		self.enabled(ctx)?;
		// Binding a missing workflow is rejected up front.
		ctx.run(self.workflows.get(&binding.workflow_id)).await?;
		let created = ctx.run(self.bindings.create(binding)).await?;
		tracing::info!(
			binding_id = %created.id,
			scope_type = created.scope_type.as_str(),
			scope_ref = %created.scope_ref,
			workflow_id = %created.workflow_id,
			"workflow binding created"
		);
		Ok(created)
	}

	pub async fn get_binding(&self, ctx: &Context, id: &str) -> WorkflowResult<WorkflowBinding> {
		self.enabled(ctx)?;
		ctx.run(self.bindings.get(id)).await
	}

	pub async fn list_bindings(&self, ctx: &Context) -> WorkflowResult<Vec<WorkflowBinding>> {
		self.enabled(ctx)?;
		ctx.run(self.bindings.list()).await
	}

	pub async fn update_binding(
		&self,
		ctx: &Context,
		id: &str,
		update: BindingUpdate,
	) -> WorkflowResult<WorkflowBinding> {
		self.enabled(ctx)?;
		let mut binding = ctx.run(self.bindings.get(id)).await?;
		if let Some(scope_type) = update.scope_type {
			binding.scope_type = scope_type;
		}
		if let Some(scope_ref) = update.scope_ref {
			binding.scope_ref = scope_ref;
		}
		if let Some(workflow_id) = update.workflow_id {
			ctx.run(self.workflows.get(&workflow_id)).await?;
			binding.workflow_id = workflow_id;
		}
		if let Some(priority) = update.priority {
			binding.priority = priority;
		}
		if let Some(status) = update.status {
			binding.status = status;
		}
		if let Some(environment) = update.environment {
			binding.environment = Some(environment).filter(|e| !e.trim().is_empty());
		}
		ctx.run(self.bindings.update(binding, update.expected_version))
			.await
	}

	pub async fn delete_binding(&self, ctx: &Context, id: &str) -> WorkflowResult<()> {
		self.enabled(ctx)?;
		ctx.run(self.bindings.delete(id)).await
	}

	pub async fn resolve(&self, ctx: &Context, input: &ResolveInput) -> WorkflowResult<Resolution> {
		self.enabled(ctx)?;
		self.resolver.resolve(ctx, input).await
	}
}
