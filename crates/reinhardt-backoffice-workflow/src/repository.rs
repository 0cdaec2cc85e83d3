//! Workflow and binding repositories
//!
//! Every update is a compare-and-swap on `version`. The in-memory
//! implementations hold the write lock across the check and the write, so
//! the version check and the active-binding uniqueness check happen in the
//! same critical section as the mutation.

use crate::binding::WorkflowBinding;
use crate::definition::PersistedWorkflow;
use crate::error::{WorkflowError, WorkflowResult};
use async_trait::async_trait;
use chrono::Utc;
use reinhardt_backoffice_core::BackofficeError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait WorkflowDefinitionRepository: Send + Sync {
	/// Stores a new workflow at version 1.
	async fn create(&self, workflow: PersistedWorkflow) -> WorkflowResult<PersistedWorkflow>;

	async fn get(&self, id: &str) -> WorkflowResult<PersistedWorkflow>;

	/// A past revision, `RollbackVersionNotFound` when absent.
	async fn get_version(&self, id: &str, version: u64) -> WorkflowResult<PersistedWorkflow>;

	/// Workflows visible in `environment` (all when `None`).
	async fn list(&self, environment: Option<&str>) -> WorkflowResult<Vec<PersistedWorkflow>>;

	/// Replaces the workflow if its stored version equals
	/// `expected_version`; the result carries `expected_version + 1`.
	async fn update(
		&self,
		workflow: PersistedWorkflow,
		expected_version: u64,
	) -> WorkflowResult<PersistedWorkflow>;
}

#[async_trait]
pub trait WorkflowBindingRepository: Send + Sync {
	async fn create(&self, binding: WorkflowBinding) -> WorkflowResult<WorkflowBinding>;

	async fn get(&self, id: &str) -> WorkflowResult<WorkflowBinding>;

	async fn list(&self) -> WorkflowResult<Vec<WorkflowBinding>>;

	/// Active bindings applying to `environment`, environment-less included.
	async fn list_active(&self, environment: &str) -> WorkflowResult<Vec<WorkflowBinding>>;

	async fn update(
		&self,
		binding: WorkflowBinding,
		expected_version: u64,
	) -> WorkflowResult<WorkflowBinding>;

	async fn delete(&self, id: &str) -> WorkflowResult<()>;
}

/// In-memory workflow store keeping every revision.
#[derive(Debug, Default, Clone)]
pub struct InMemoryWorkflowRepository {
	/// Revisions per id, oldest first
	revisions: Arc<RwLock<HashMap<String, Vec<PersistedWorkflow>>>>,
}

impl InMemoryWorkflowRepository {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn len(&self) -> usize {
		self.revisions.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.revisions.read().await.is_empty()
	}

	/// All stored revisions of `id`.
	pub async fn history(&self, id: &str) -> Vec<PersistedWorkflow> {
		self.revisions.read().await.get(id).cloned().unwrap_or_default()
	}
}

#[async_trait]
impl WorkflowDefinitionRepository for InMemoryWorkflowRepository {
	async fn create(&self, mut workflow: PersistedWorkflow) -> WorkflowResult<PersistedWorkflow> {
		workflow.validate()?;
		let mut revisions = self.revisions.write().await;
		if revisions.contains_key(&workflow.id) {
			return Err(BackofficeError::conflict(format!(
				"workflow '{}' already exists",
				workflow.id
			))
			.with_metadata("workflow_id", &workflow.id)
			.into());
		}
		let now = Utc::now();
		workflow.version = 1;
		workflow.created_at = now;
		workflow.updated_at = now;
		revisions.insert(workflow.id.clone(), vec![workflow.clone()]);
		Ok(workflow)
	}

	async fn get(&self, id: &str) -> WorkflowResult<PersistedWorkflow> {
		self.revisions
			.read()
			.await
			.get(id)
			.and_then(|history| history.last())
			.cloned()
			.ok_or_else(|| WorkflowError::WorkflowNotFound(id.to_string()))
	}

	async fn get_version(&self, id: &str, version: u64) -> WorkflowResult<PersistedWorkflow> {
		let revisions = self.revisions.read().await;
		let history = revisions
			.get(id)
			.ok_or_else(|| WorkflowError::WorkflowNotFound(id.to_string()))?;
		history
			.iter()
			.find(|w| w.version == version)
			.cloned()
			.ok_or_else(|| WorkflowError::RollbackVersionNotFound {
				id: id.to_string(),
				version,
			})
	}

	async fn list(&self, environment: Option<&str>) -> WorkflowResult<Vec<PersistedWorkflow>> {
		let revisions = self.revisions.read().await;
		let mut current: Vec<_> = revisions
			.values()
			.filter_map(|history| history.last())
			.filter(|w| match (environment, w.environment.as_deref()) {
				(None, _) | (_, None) => true,
				(Some(requested), Some(own)) => requested == own,
			})
			.cloned()
			.collect();
		current.sort_by(|a, b| a.id.cmp(&b.id));
		Ok(current)
	}

	async fn update(
		&self,
		mut workflow: PersistedWorkflow,
		expected_version: u64,
	) -> WorkflowResult<PersistedWorkflow> {
		workflow.validate()?;
		let mut revisions = self.revisions.write().await;
		let history = revisions
			.get_mut(&workflow.id)
			.ok_or_else(|| WorkflowError::WorkflowNotFound(workflow.id.clone()))?;
		let Some(current) = history.last() else {
			return Err(WorkflowError::WorkflowNotFound(workflow.id.clone()));
		};
		if current.version != expected_version {
			return Err(WorkflowError::VersionConflict {
				entity: "workflow",
				id: workflow.id.clone(),
				expected: expected_version,
				actual: current.version,
			});
		}
		workflow.version = current.version + 1;
		workflow.created_at = current.created_at;
		workflow.updated_at = Utc::now();
		history.push(workflow.clone());
		Ok(workflow)
	}
}

/// In-memory binding store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBindingRepository {
	bindings: Arc<RwLock<HashMap<String, WorkflowBinding>>>,
}

impl InMemoryBindingRepository {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn len(&self) -> usize {
		self.bindings.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.bindings.read().await.is_empty()
	}
}

/// `BindingConflict` if an active binding other than `candidate` shares its key.
fn ensure_unique(
	bindings: &HashMap<String, WorkflowBinding>,
	candidate: &WorkflowBinding,
) -> WorkflowResult<()> {
	if !candidate.is_active() {
		return Ok(());
	}
	let key = candidate.key();
	if let Some(existing) = bindings
		.values()
		.find(|b| b.id != candidate.id && b.is_active() && b.key() == key)
	{
		return Err(WorkflowError::BindingConflict {
			existing_id: existing.id.clone(),
			key,
		});
	}
	Ok(())
}

#[async_trait]
impl WorkflowBindingRepository for InMemoryBindingRepository {
	async fn create(&self, mut binding: WorkflowBinding) -> WorkflowResult<WorkflowBinding> {
		binding.validate()?;
		let mut bindings = self.bindings.write().await;
		if bindings.contains_key(&binding.id) {
			return Err(BackofficeError::conflict(format!(
				"workflow binding '{}' already exists",
				binding.id
			))
			.into());
		}
		ensure_unique(&bindings, &binding)?;
		let now = Utc::now();
		binding.version = 1;
		binding.created_at = now;
		binding.updated_at = now;
		bindings.insert(binding.id.clone(), binding.clone());
		Ok(binding)
	}

	async fn get(&self, id: &str) -> WorkflowResult<WorkflowBinding> {
		self.bindings
			.read()
			.await
			.get(id)
			.cloned()
			.ok_or_else(|| WorkflowError::BindingNotFound(id.to_string()))
	}

	async fn list(&self) -> WorkflowResult<Vec<WorkflowBinding>> {
		let mut all: Vec<_> = self.bindings.read().await.values().cloned().collect();
		all.sort_by(|a, b| a.id.cmp(&b.id));
		Ok(all)
	}

	async fn list_active(&self, environment: &str) -> WorkflowResult<Vec<WorkflowBinding>> {
		let mut active: Vec<_> = self
			.bindings
			.read()
			.await
			.values()
			.filter(|b| b.is_active() && b.applies_to_environment(environment))
			.cloned()
			.collect();
		active.sort_by(|a, b| a.id.cmp(&b.id));
		Ok(active)
	}

	async fn update(
		&self,
		mut binding: WorkflowBinding,
		expected_version: u64,
	) -> WorkflowResult<WorkflowBinding> {
		binding.validate()?;
		let mut bindings = self.bindings.write().await;
		let current = bindings
			.get(&binding.id)
			.ok_or_else(|| WorkflowError::BindingNotFound(binding.id.clone()))?;
		if current.version != expected_version {
			return Err(WorkflowError::VersionConflict {
				entity: "workflow_binding",
				id: binding.id.clone(),
				expected: expected_version,
				actual: current.version,
			});
		}
		binding.version = current.version + 1;
		binding.created_at = current.created_at;
		ensure_unique(&bindings, &binding)?;
		binding.updated_at = Utc::now();
		bindings.insert(binding.id.clone(), binding.clone());
		Ok(binding)
	}

	async fn delete(&self, id: &str) -> WorkflowResult<()> {
		self.bindings
			.write()
			.await
			.remove(id)
			.map(|_| ())
			.ok_or_else(|| WorkflowError::BindingNotFound(id.to_string()))
	}
}
