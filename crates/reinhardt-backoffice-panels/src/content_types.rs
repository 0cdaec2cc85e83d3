//! Content-type commands
//!
//! [`ContentTypeService`] validates and stores content types, then keeps
//! their panels in step: active types get a registered panel, deprecated or
//! deleted types lose it.

use crate::error::{PanelError, PanelResult};
use crate::factory::PanelFactory;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use reinhardt_backoffice_core::activity::{self, ActivityAction, ActivityEvent, ActivitySink};
use reinhardt_backoffice_core::{
	BackofficeError, Capabilities, ContentType, ContentTypeStatus, Context, NoopActivitySink, metrics,
};
use reinhardt_backoffice_schema::{BreakingChangeDetector, SchemaGuardrails};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[async_trait]
pub trait ContentTypeRepository: Send + Sync {
	async fn get(&self, ctx: &Context, id: &str) -> PanelResult<Option<ContentType>>;

	async fn get_by_slug(&self, ctx: &Context, slug: &str) -> PanelResult<Option<ContentType>>;

	async fn list(&self, ctx: &Context) -> PanelResult<Vec<ContentType>>;

	/// Inserts or replaces by id.
	async fn save(&self, ctx: &Context, content_type: ContentType) -> PanelResult<ContentType>;

	async fn delete(&self, ctx: &Context, id: &str) -> PanelResult<Option<ContentType>>;
}

#[derive(Debug, Default)]
pub struct InMemoryContentTypeRepository {
	items: RwLock<BTreeMap<String, ContentType>>,
}

impl InMemoryContentTypeRepository {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl ContentTypeRepository for InMemoryContentTypeRepository {
	async fn get(&self, ctx: &Context, id: &str) -> PanelResult<Option<ContentType>> {
		ctx.check()?;
		Ok(self.items.read().get(id).cloned())
	}

	async fn get_by_slug(&self, ctx: &Context, slug: &str) -> PanelResult<Option<ContentType>> {
		ctx.check()?;
		Ok(self.items.read().values().find(|ct| ct.slug == slug).cloned())
	}

	async fn list(&self, ctx: &Context) -> PanelResult<Vec<ContentType>> {
		ctx.check()?;
		let mut items: Vec<ContentType> = self.items.read().values().cloned().collect();
		items.sort_by(|a, b| a.slug.cmp(&b.slug));
		Ok(items)
	}

	async fn save(&self, ctx: &Context, content_type: ContentType) -> PanelResult<ContentType> {
		ctx.check()?;
		self.items
			.write()
			.insert(content_type.id.clone(), content_type.clone());
		Ok(content_type)
	}

	async fn delete(&self, ctx: &Context, id: &str) -> PanelResult<Option<ContentType>> {
		ctx.check()?;
		Ok(self.items.write().remove(id))
	}
}

/// Partial update of a content type; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentTypeUpdate {
	pub slug: Option<String>,
	pub name: Option<String>,
	pub description: Option<String>,
	pub icon: Option<String>,
	pub schema: Option<Value>,
	pub ui_schema: Option<Value>,
	pub capabilities: Option<Capabilities>,
	pub status: Option<ContentTypeStatus>,
	pub allow_breaking_changes: Option<bool>,
}

impl ContentTypeUpdate {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_schema(mut self, schema: Value) -> Self {
		self.schema = Some(schema);
		self
	}

	pub fn with_status(mut self, status: ContentTypeStatus) -> Self {
		self.status = Some(status);
		self
	}

	pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
		self.slug = Some(slug.into());
		self
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn with_ui_schema(mut self, ui_schema: Value) -> Self {
		self.ui_schema = Some(ui_schema);
		self
	}

	pub fn allow_breaking_changes(mut self, allow: bool) -> Self {
		self.allow_breaking_changes = Some(allow);
		self
	}
}

pub struct ContentTypeService {
	repository: Arc<dyn ContentTypeRepository>,
	factory: Arc<PanelFactory>,
	guardrails: SchemaGuardrails,
	detector: BreakingChangeDetector,
	activity: Arc<dyn ActivitySink>,
}

impl ContentTypeService {
	pub fn new(repository: Arc<dyn ContentTypeRepository>, factory: Arc<PanelFactory>) -> Self {
		Self {
			repository,
			factory,
			guardrails: SchemaGuardrails::default(),
			detector: BreakingChangeDetector::new(),
			activity: Arc::new(NoopActivitySink),
		}
	}

	pub fn with_guardrails(mut self, guardrails: SchemaGuardrails) -> Self {
		self.guardrails = guardrails;
		self
	}

	pub fn with_activity(mut self, activity: Arc<dyn ActivitySink>) -> Self {
		self.activity = activity;
		self
	}

	pub fn factory(&self) -> &Arc<PanelFactory> {
		&self.factory
	}

	pub async fn get(&self, ctx: &Context, id: &str) -> PanelResult<ContentType> {
		ctx.run(self.repository.get(ctx, id))
			.await?
			.ok_or_else(|| not_found(id))
	}

	pub async fn list(&self, ctx: &Context) -> PanelResult<Vec<ContentType>> {
		ctx.run(self.repository.list(ctx)).await
	}

	pub async fn create(&self, ctx: &Context, mut content_type: ContentType) -> PanelResult<ContentType> {
		content_type.validate_slug()?;
		self.guardrails
			.validate_schema(&content_type.schema, content_type.ui_schema.as_ref())?;
		if let Some(existing) = ctx.run(self.repository.get_by_slug(ctx, &content_type.slug)).await? {
			return Err(slug_taken(&content_type.slug, &existing.id));
		}
		let now = Utc::now();
		content_type.created_at = now;
		content_type.updated_at = now;

		let saved = ctx.run(self.repository.save(ctx, content_type)).await?;
		if let Err(err) = self.sync_panel(ctx, &saved, None).await {
			self.restore(&saved.id, None).await;
			return Err(err);
		}
		self.record(ctx, ActivityAction::ContentTypeSaved, &saved).await;
		Ok(saved)
	}

	/// Applies `update`. Publishing or editing an active type rejects
	/// breaking schema changes unless they are explicitly allowed, and the
	/// slug cannot change while the type has a panel.
	pub async fn update(&self, ctx: &Context, id: &str, update: ContentTypeUpdate) -> PanelResult<ContentType> {
		let current = self.get(ctx, id).await?;
		let mut next = current.clone();

		if let Some(slug) = update.slug.filter(|s| *s != current.slug) {
			if self.factory.registry().contains(current.panel_id()) {
				return Err(PanelError::invalid(
					format!("slug of content type '{}' is immutable once its panel exists", current.slug),
					"slug",
					"immutable",
				));
			}
			if let Some(existing) = ctx.run(self.repository.get_by_slug(ctx, &slug)).await? {
				return Err(slug_taken(&slug, &existing.id));
			}
			next.slug = slug;
			next.validate_slug()?;
		}
		if let Some(name) = update.name {
			next.name = name;
		}
		if let Some(description) = update.description {
			next.description = Some(description);
		}
		if let Some(icon) = update.icon {
			next.icon = Some(icon);
		}
		if let Some(schema) = update.schema {
			next.schema = schema;
		}
		if let Some(ui_schema) = update.ui_schema {
			next.ui_schema = Some(ui_schema);
		}
		if let Some(capabilities) = update.capabilities {
			next.capabilities = capabilities;
		}
		if let Some(allow) = update.allow_breaking_changes {
			next.allow_breaking_changes = allow;
		}
		if let Some(status) = update.status.filter(|s| *s != current.status) {
			next.transition_status(status)?;
		}

		self.guardrails
			.validate_schema(&next.schema, next.ui_schema.as_ref())?;
		if next.is_active() && next.schema != current.schema {
			self.detector
				.ensure_compatible(&current.schema, &next.schema, next.allow_breaking_changes)?;
		}
		next.updated_at = Utc::now();

		let saved = ctx.run(self.repository.save(ctx, next)).await?;
		if let Err(err) = self.sync_panel(ctx, &saved, Some(&current)).await {
			self.restore(&saved.id, Some(current)).await;
			return Err(err);
		}
		self.record(ctx, ActivityAction::ContentTypeSaved, &saved).await;
		Ok(saved)
	}

	/// Deletes the type and removes its panel.
	pub async fn delete(&self, ctx: &Context, id: &str) -> PanelResult<ContentType> {
		let current = self.get(ctx, id).await?;
		self.factory.remove_panel(ctx, current.panel_id()).await?;
		ctx.run(self.repository.delete(ctx, id)).await?;
		tracing::info!(content_type = %current.slug, "content type deleted");
		self.record(ctx, ActivityAction::ContentTypeDeleted, &current).await;
		Ok(current)
	}

	async fn sync_panel(&self, ctx: &Context, saved: &ContentType, previous: Option<&ContentType>) -> PanelResult<()> {
		match saved.status {
			ContentTypeStatus::Active if self.factory.registry().contains(saved.panel_id()) => {
				self.factory.refresh_panel(ctx, saved).await
			}
			ContentTypeStatus::Active => self.factory.create_panel(ctx, saved).await.map(|_| ()),
			ContentTypeStatus::Deprecated => {
				let panel_id = previous.map_or(saved.panel_id(), |p| p.panel_id());
				self.factory.remove_panel(ctx, panel_id).await.map(|_| ())
			}
			ContentTypeStatus::Draft => Ok(()),
		}
	}

	/// Puts back the stored row a failed panel sync was based on: the
	/// previous revision, or nothing for a fresh create.
	async fn restore(&self, id: &str, previous: Option<ContentType>) {
		// Runs even when the request context was cancelled
		let ctx = Context::new();
		let result = match previous {
			Some(previous) => self.repository.save(&ctx, previous).await.map(|_| ()),
			None => self.repository.delete(&ctx, id).await.map(|_| ()),
		};
		match result {
			Ok(()) => tracing::debug!(content_type = id, "content type write rolled back"),
			Err(err) => {
				tracing::warn!(content_type = id, error = %err, "content type rollback failed");
				metrics::record_side_effect_failure("content_type_rollback");
			}
		}
	}

	async fn record(&self, ctx: &Context, action: ActivityAction, content_type: &ContentType) {
		let event = ActivityEvent::new(action, "content_type", content_type.id.clone())
			.with_actor(ctx.actor())
			.with_metadata("slug", content_type.slug.clone())
			.with_metadata("status", content_type.status.as_str());
		activity::emit(self.activity.as_ref(), event).await;
	}
}

fn not_found(id: &str) -> PanelError {
	PanelError::Core(
		BackofficeError::not_found(format!("content type '{}' not found", id))
			.with_metadata("content_type", id),
	)
}

fn slug_taken(slug: &str, existing_id: &str) -> PanelError {
	PanelError::Core(
		BackofficeError::conflict(format!("content type slug '{}' is already in use", slug))
			.with_metadata("slug", slug)
			.with_metadata("existing_id", existing_id),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::navigation::InMemoryMenuService;
	use crate::permissions::InMemoryPermissionRegistry;
	use crate::registry::AdminRegistry;
	use crate::repository::InMemoryRepositoryProvider;
	use reinhardt_backoffice_core::{InMemoryActivitySink, TextCode};
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn service() -> ContentTypeService {
		let factory = PanelFactory::new(
			Arc::new(AdminRegistry::new()),
			Arc::new(InMemoryMenuService::new()),
			Arc::new(InMemoryPermissionRegistry::new()),
			Arc::new(InMemoryRepositoryProvider::new()),
		);
		ContentTypeService::new(Arc::new(InMemoryContentTypeRepository::new()), Arc::new(factory))
	}

	fn schema() -> Value {
		json!({
			"type": "object",
			"properties": {"title": {"type": "string"}, "body": {"type": "string"}}
		})
	}

	#[rstest]
	#[tokio::test]
	async fn test_draft_has_no_panel_until_published(service: ContentTypeService) {
		// Arrange
		let ctx = Context::new();
		let ct = service
			.create(&ctx, ContentType::new("article", "Article", schema()).with_id("ct1"))
			.await
			.unwrap();
		assert!(!service.factory().registry().contains("article"));

		// Act
		service
			.update(&ctx, &ct.id, ContentTypeUpdate::new().with_status(ContentTypeStatus::Active))
			.await
			.unwrap();

		// Assert
		assert!(service.factory().registry().contains("article"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_breaking_change_on_active_type(service: ContentTypeService) {
		// Arrange
		let ctx = Context::new();
		service
			.create(
				&ctx,
				ContentType::new("article", "Article", schema())
					.with_id("ct1")
					.with_status(ContentTypeStatus::Active),
			)
			.await
			.unwrap();
		let narrowed = json!({"type": "object", "properties": {"title": {"type": "string"}}});

		// Act
		let rejected = service
			.update(&ctx, "ct1", ContentTypeUpdate::new().with_schema(narrowed.clone()))
			.await
			.unwrap_err();
		let accepted = service
			.update(
				&ctx,
				"ct1",
				ContentTypeUpdate::new()
					.with_schema(narrowed)
					.allow_breaking_changes(true),
			)
			.await;

		// Assert
		assert_eq!(
			BackofficeError::from(rejected).text_code(),
			TextCode::ContentTypeSchemaBreaking
		);
		assert!(accepted.is_ok());
	}

	#[rstest]
	#[tokio::test]
	async fn test_slug_is_immutable_with_panel(service: ContentTypeService) {
		// Arrange
		let ctx = Context::new();
		service
			.create(
				&ctx,
				ContentType::new("article", "Article", schema())
					.with_id("ct1")
					.with_status(ContentTypeStatus::Active),
			)
			.await
			.unwrap();

		// Act
		let err = service
			.update(&ctx, "ct1", ContentTypeUpdate::new().with_slug("post"))
			.await
			.unwrap_err();

		// Assert
		let mapped = BackofficeError::from(err);
		assert_eq!(mapped.field_errors().get("slug").map(String::as_str), Some("immutable"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_reserved_field_is_rejected(service: ContentTypeService) {
		// Arrange
		let bad = json!({"type": "object", "properties": {"_schema": {"type": "string"}}});

		// Act
		let err = service
			.create(&Context::new(), ContentType::new("article", "Article", bad))
			.await
			.unwrap_err();

		// Assert
		assert_eq!(BackofficeError::from(err).text_code(), TextCode::ValidationError);
	}

	#[rstest]
	#[tokio::test]
	async fn test_deprecate_and_delete_remove_panel(service: ContentTypeService) {
		// Arrange
		let ctx = Context::new();
		let activity = Arc::new(InMemoryActivitySink::new());
		let service = service.with_activity(activity.clone());
		service
			.create(
				&ctx,
				ContentType::new("article", "Article", schema())
					.with_id("ct1")
					.with_status(ContentTypeStatus::Active),
			)
			.await
			.unwrap();

		// Act
		service
			.update(&ctx, "ct1", ContentTypeUpdate::new().with_status(ContentTypeStatus::Deprecated))
			.await
			.unwrap();
		let removed_after_deprecate = !service.factory().registry().contains("article");
		service.delete(&ctx, "ct1").await.unwrap();

		// Assert
		assert!(removed_after_deprecate);
		assert!(service.get(&ctx, "ct1").await.is_err());
		assert_eq!(
			activity.actions(),
			vec![
				ActivityAction::ContentTypeSaved,
				ActivityAction::ContentTypeSaved,
				ActivityAction::ContentTypeDeleted,
			]
		);
	}

	#[rstest]
	#[tokio::test]
	async fn test_duplicate_slug_conflicts(service: ContentTypeService) {
		// Arrange
		let ctx = Context::new();
		service
			.create(&ctx, ContentType::new("article", "Article", schema()))
			.await
			.unwrap();

		// Act
		let err = service
			.create(&ctx, ContentType::new("article", "Other", schema()))
			.await
			.unwrap_err();

		// Assert
		assert_eq!(BackofficeError::from(err).text_code(), TextCode::Conflict);
	}
}
