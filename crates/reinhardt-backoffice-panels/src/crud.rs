//! CRUD surface of registered panels
//!
//! [`PanelCrudService`] checks permissions, validates required fields and
//! routes state changes through the workflow runtime before a record is
//! written.

use crate::error::{PanelError, PanelResult};
use crate::panel::{Panel, PanelAction};
use crate::permissions::PermissionChecker;
use crate::registry::AdminRegistry;
use crate::repository::{ListPage, ListQuery, PATH_FIELD, PanelRecord};
use reinhardt_backoffice_core::Context;
use reinhardt_backoffice_workflow::{
	TransitionRequest, TransitionResult, TranslationSource, WorkflowRuntime,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelCrudOptions {
	/// Skip the translation gate on transitions
	pub allow_missing_translations: bool,
	/// Record field holding the workflow state
	pub state_field: String,
	/// State assumed for records that carry none
	pub initial_state: String,
	pub locale_field: String,
	pub translation_group_field: String,
	pub title_field: String,
}

impl Default for PanelCrudOptions {
	fn default() -> Self {
		Self {
			allow_missing_translations: false,
			state_field: "status".to_string(),
			initial_state: "draft".to_string(),
			locale_field: "locale".to_string(),
			translation_group_field: "translation_group_id".to_string(),
			title_field: "title".to_string(),
		}
	}
}

impl PanelCrudOptions {
	pub fn allow_missing_translations(mut self, allow: bool) -> Self {
		self.allow_missing_translations = allow;
		self
	}

	pub fn with_state_field(mut self, field: impl Into<String>) -> Self {
		self.state_field = field.into();
		self
	}
}

/// Result of an update, with the transition it triggered.
#[derive(Debug, Clone)]
pub struct PanelUpdate {
	pub record: PanelRecord,
	pub transition: Option<TransitionResult>,
}

pub struct PanelCrudService {
	registry: Arc<AdminRegistry>,
	checker: Arc<dyn PermissionChecker>,
	runtime: Option<Arc<WorkflowRuntime>>,
	options: PanelCrudOptions,
}

impl PanelCrudService {
	pub fn new(registry: Arc<AdminRegistry>, checker: Arc<dyn PermissionChecker>) -> Self {
		Self {
			registry,
			checker,
			runtime: None,
			options: PanelCrudOptions::default(),
		}
	}

	pub fn with_runtime(mut self, runtime: Arc<WorkflowRuntime>) -> Self {
		self.runtime = Some(runtime);
		self
	}

	pub fn with_options(mut self, options: PanelCrudOptions) -> Self {
		self.options = options;
		self
	}

	pub fn options(&self) -> &PanelCrudOptions {
		&self.options
	}

	pub fn registry(&self) -> &Arc<AdminRegistry> {
		&self.registry
	}

	pub async fn list(&self, ctx: &Context, panel_id: &str, query: &ListQuery) -> PanelResult<ListPage> {
		let panel = self.authorize(ctx, panel_id, PanelAction::View).await?;
		ctx.run(panel.repository().list(ctx, query)).await
	}

	pub async fn get(&self, ctx: &Context, panel_id: &str, id: &str) -> PanelResult<PanelRecord> {
		let panel = self.authorize(ctx, panel_id, PanelAction::View).await?;
		ctx.run(panel.repository().get(ctx, id)).await
	}

	pub async fn create(
		&self,
		ctx: &Context,
		panel_id: &str,
		mut data: Map<String, Value>,
	) -> PanelResult<PanelRecord> {
		let panel = self.authorize(ctx, panel_id, PanelAction::Create).await?;
		ensure_required(&panel, &data)?;
		if panel.workflow && !data.contains_key(&self.options.state_field) {
			data.insert(
				self.options.state_field.clone(),
				Value::from(self.options.initial_state.clone()),
			);
		}
		let record = ctx.run(panel.repository().create(ctx, data)).await?;
		tracing::debug!(panel_id, id = %record.id, "panel record created");
		Ok(record)
	}

	/// Replaces a record. A changed state field runs the workflow transition
	/// first; the record is only written when the transition is allowed.
	pub async fn update(
		&self,
		ctx: &Context,
		panel_id: &str,
		id: &str,
		data: Map<String, Value>,
		expected_version: Option<u64>,
	) -> PanelResult<PanelUpdate> {
		let panel = self.authorize(ctx, panel_id, PanelAction::Edit).await?;
		ensure_required(&panel, &data)?;
		let current = ctx.run(panel.repository().get(ctx, id)).await?;

		// Stale writers must not trigger transitions or queue translations
		if let Some(expected) = expected_version
			&& expected != current.version
		{
			return Err(PanelError::StaleVersion {
				panel_id: panel.id.clone(),
				id: id.to_string(),
				expected,
				actual: current.version,
				latest_server_state: current.to_json(),
			});
		}

		let transition = self.run_transition(ctx, &panel, &current, &data).await?;
		let record = ctx
			.run(panel.repository().update(ctx, id, data, expected_version))
			.await?;
		Ok(PanelUpdate { record, transition })
	}

	pub async fn delete(&self, ctx: &Context, panel_id: &str, id: &str) -> PanelResult<()> {
		let panel = self.authorize(ctx, panel_id, PanelAction::Delete).await?;
		ctx.run(panel.repository().delete(ctx, id)).await?;
		tracing::debug!(panel_id, id, "panel record deleted");
		Ok(())
	}

	async fn authorize(&self, ctx: &Context, panel_id: &str, action: PanelAction) -> PanelResult<Arc<Panel>> {
		ctx.check()?;
		let panel = self.registry.require(panel_id)?;
		if !self.checker.has_permission(ctx, &panel, action).await {
			tracing::debug!(panel_id, action = action.as_str(), actor = ?ctx.actor(), "permission denied");
			return Err(PanelError::Forbidden {
				panel_id: panel_id.to_string(),
				action,
			});
		}
		Ok(panel)
	}

	async fn run_transition(
		&self,
		ctx: &Context,
		panel: &Panel,
		current: &PanelRecord,
		data: &Map<String, Value>,
	) -> PanelResult<Option<TransitionResult>> {
		let Some(runtime) = self.runtime.as_ref().filter(|_| panel.workflow) else {
			return Ok(None);
		};
		let state_field = self.options.state_field.as_str();
		let Some(target) = data.get(state_field).and_then(Value::as_str) else {
			return Ok(None);
		};
		let from = current
			.str_field(state_field)
			.unwrap_or(self.options.initial_state.as_str());
		if from == target {
			return Ok(None);
		}

		let field = |name: &str| {
			data.get(name)
				.or_else(|| current.field(name))
				.and_then(Value::as_str)
				.map(str::to_string)
		};
		let locale = field(self.options.locale_field.as_str()).or_else(|| ctx.locale().map(str::to_string));
		let mut source = TranslationSource::new(locale.clone().unwrap_or_default());
		if let Some(group) = field(self.options.translation_group_field.as_str()) {
			source = source.with_group(group);
		}
		if let Some(title) = field(self.options.title_field.as_str()) {
			source = source.with_title(title);
		}
		if let Some(path) = field(PATH_FIELD) {
			source = source.with_path(path);
		}

		let mut request = TransitionRequest::new(&panel.content_type, &current.id, from, target)
			.with_traits(panel.traits.iter().cloned())
			.with_environment(ctx.environment())
			.with_translation_source(source)
			.allow_missing_translations(
				self.options.allow_missing_translations || !panel.translations,
			);
		if let Some(locale) = locale {
			request = request.with_requested_locale(locale);
		}

		let result = runtime.transition(ctx, &request).await?;
		Ok(Some(result))
	}
}

fn ensure_required(panel: &Panel, data: &Map<String, Value>) -> PanelResult<()> {
	let missing: BTreeMap<String, String> = panel
		.fields
		.form
		.iter()
		.filter(|f| f.required)
		.filter(|f| data.get(&f.name).is_none_or(Value::is_null))
		.map(|f| (f.name.clone(), "this field is required".to_string()))
		.collect();
	if missing.is_empty() {
		return Ok(());
	}
	Err(PanelError::Invalid {
		message: format!("missing required fields in panel '{}'", panel.id),
		fields: missing,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fields::{FieldType, PanelField};
	use crate::permissions::{AllowAll, StaticPermissionChecker};
	use crate::repository::InMemoryPanelRepository;
	use reinhardt_backoffice_core::{BackofficeError, TextCode};
	use reinhardt_backoffice_workflow::{
		InMemoryBindingRepository, InMemoryWorkflowRepository, PersistedWorkflow,
		WorkflowBinding, WorkflowDefinition, WorkflowService, WorkflowStatus,
	};
	use rstest::rstest;
	use serde_json::json;

	fn data(value: Value) -> Map<String, Value> {
		match value {
			Value::Object(map) => map,
			_ => Map::new(),
		}
	}

	fn registry() -> Arc<AdminRegistry> {
		let registry = Arc::new(AdminRegistry::new());
		let mut panel = Panel::new("article", "Articles", Arc::new(InMemoryPanelRepository::new("article")));
		let mut title = PanelField::new("title", FieldType::Text);
		title.required = true;
		panel.fields.form = vec![title];
		panel.workflow = true;
		registry.register(panel);
		registry
	}

	async fn runtime() -> Arc<WorkflowRuntime> {
		let ctx = Context::new();
		let service = WorkflowService::new(
			Arc::new(InMemoryWorkflowRepository::new()),
			Arc::new(InMemoryBindingRepository::new()),
		);
		service
			.create_workflow(
				&ctx,
				PersistedWorkflow::new(
					"editorial",
					"Editorial",
					WorkflowDefinition::new("draft").with_transition("publish", "draft", "published"),
				)
				.with_status(WorkflowStatus::Active),
			)
			.await
			.unwrap();
		service
			.create_binding(&ctx, WorkflowBinding::content_type("article", "editorial"))
			.await
			.unwrap();
		Arc::new(WorkflowRuntime::new(service.resolver().clone(), service.workflows()))
	}

	#[rstest]
	#[tokio::test]
	async fn test_create_defaults_state_and_checks_required() {
		// Arrange
		let crud = PanelCrudService::new(registry(), Arc::new(AllowAll));
		let ctx = Context::new();

		// Act
		let missing = crud.create(&ctx, "article", data(json!({"body": "x"}))).await;
		let created = crud
			.create(&ctx, "article", data(json!({"title": "Hello"})))
			.await
			.unwrap();

		// Assert
		let err = BackofficeError::from(missing.unwrap_err());
		assert_eq!(err.field_errors().get("title").map(String::as_str), Some("this field is required"));
		assert_eq!(created.str_field("status"), Some("draft"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_state_change_runs_transition() {
		// Arrange
		let crud = PanelCrudService::new(registry(), Arc::new(AllowAll)).with_runtime(runtime().await);
		let ctx = Context::new();
		let created = crud
			.create(&ctx, "article", data(json!({"id": "a1", "title": "Hello"})))
			.await
			.unwrap();

		// Act
		let updated = crud
			.update(
				&ctx,
				"article",
				"a1",
				data(json!({"title": "Hello", "status": "published"})),
				Some(created.version),
			)
			.await
			.unwrap();

		// Assert
		let transition = updated.transition.unwrap();
		assert_eq!(transition.transition_name, "publish");
		assert_eq!(updated.record.str_field("status"), Some("published"));
		assert_eq!(updated.record.version, 2);
	}

	#[rstest]
	#[tokio::test]
	async fn test_invalid_transition_leaves_record_untouched() {
		// Arrange
		let crud = PanelCrudService::new(registry(), Arc::new(AllowAll)).with_runtime(runtime().await);
		let ctx = Context::new();
		crud.create(&ctx, "article", data(json!({"id": "a1", "title": "Hello"})))
			.await
			.unwrap();

		// Act
		let err = crud
			.update(&ctx, "article", "a1", data(json!({"title": "Hello", "status": "archived"})), None)
			.await
			.unwrap_err();

		// Assert
		assert_eq!(BackofficeError::from(err).text_code(), TextCode::WorkflowInvalidTransition);
		let stored = crud.get(&ctx, "article", "a1").await.unwrap();
		assert_eq!(stored.version, 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_stale_token_is_rejected_before_transition() {
		// Arrange
		let crud = PanelCrudService::new(registry(), Arc::new(AllowAll));
		let ctx = Context::new();
		crud.create(&ctx, "article", data(json!({"id": "a1", "title": "One"})))
			.await
			.unwrap();
		crud.update(&ctx, "article", "a1", data(json!({"title": "Two"})), Some(1))
			.await
			.unwrap();

		// Act
		let err = crud
			.update(&ctx, "article", "a1", data(json!({"title": "Three"})), Some(1))
			.await
			.unwrap_err();

		// Assert
		let mapped = BackofficeError::from(err);
		assert_eq!(mapped.text_code(), TextCode::Conflict);
		assert_eq!(mapped.metadata_value("latest_state_path"), Some(&json!("/api/article/a1")));
		assert_eq!(mapped.metadata_value("latest_server_state").unwrap()["title"], json!("Two"));
	}

	#[rstest]
	#[case(PanelAction::View)]
	#[case(PanelAction::Delete)]
	#[tokio::test]
	async fn test_denied_actions_are_forbidden(#[case] action: PanelAction) {
		// Arrange
		let checker = StaticPermissionChecker::new().grant("editor", ["admin.article.create"]);
		let crud = PanelCrudService::new(registry(), Arc::new(checker));
		let ctx = Context::new().with_actor("editor");

		// Act
		let err = match action {
			PanelAction::View => crud.get(&ctx, "article", "a1").await.unwrap_err(),
			_ => crud.delete(&ctx, "article", "a1").await.unwrap_err(),
		};

		// Assert
		assert!(matches!(err, PanelError::Forbidden { action: denied, .. } if denied == action));
	}

	#[rstest]
	#[tokio::test]
	async fn test_unknown_panel() {
		let crud = PanelCrudService::new(registry(), Arc::new(AllowAll));

		let err = crud.list(&Context::new(), "missing", &ListQuery::new()).await.unwrap_err();

		assert_eq!(BackofficeError::from(err).text_code(), TextCode::NotFound);
	}
}
