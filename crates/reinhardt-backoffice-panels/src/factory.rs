//! Dynamic panel factory
//!
//! Turns content types into registered panels. A registration wires the
//! navigation item, the optional search adapter and the permission
//! codenames, then publishes the panel in the [`AdminRegistry`]. Mutations
//! are serialized; a failing wiring step undoes the steps already taken and
//! the registry is only touched once every step succeeded.

use crate::error::{PanelError, PanelResult};
use crate::fields::SchemaConverter;
use crate::navigation::{MenuService, NavItem, nav_item_id};
use crate::panel::{Panel, PanelTab};
use crate::permissions::PermissionRegistry;
use crate::registry::AdminRegistry;
use crate::repository::RepositoryProvider;
use crate::search::SearchRegistry;
use reinhardt_backoffice_core::activity::{self, ActivityAction, ActivityEvent, ActivitySink};
use reinhardt_backoffice_core::settings::NavigationSettings;
use reinhardt_backoffice_core::{ContentType, Context, NoopActivitySink, metrics};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Key in `ui_schema` listing extra panel tabs
pub const TABS_KEY: &str = "ui:tabs";

/// Tab every panel starts with
pub const DEFAULT_TAB: &str = "content";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireStep {
	Navigation,
	Search,
	Permissions,
}

impl WireStep {
	fn as_str(self) -> &'static str {
		match self {
			WireStep::Navigation => "navigation",
			WireStep::Search => "search",
			WireStep::Permissions => "permissions",
		}
	}
}

pub struct PanelFactory {
	registry: Arc<AdminRegistry>,
	menu: Arc<dyn MenuService>,
	permissions: Arc<dyn PermissionRegistry>,
	repositories: Arc<dyn RepositoryProvider>,
	search: Option<Arc<dyn SearchRegistry>>,
	converter: SchemaConverter,
	navigation: NavigationSettings,
	activity: Arc<dyn ActivitySink>,
	op_lock: Mutex<()>,
}

impl PanelFactory {
	pub fn new(
		registry: Arc<AdminRegistry>,
		menu: Arc<dyn MenuService>,
		permissions: Arc<dyn PermissionRegistry>,
		repositories: Arc<dyn RepositoryProvider>,
	) -> Self {
		Self {
			registry,
			menu,
			permissions,
			repositories,
			search: None,
			converter: SchemaConverter::new(),
			navigation: NavigationSettings::default(),
			activity: Arc::new(NoopActivitySink),
			op_lock: Mutex::new(()),
		}
	}

	pub fn with_search(mut self, search: Arc<dyn SearchRegistry>) -> Self {
		self.search = Some(search);
		self
	}

	pub fn with_converter(mut self, converter: SchemaConverter) -> Self {
		self.converter = converter;
		self
	}

	pub fn with_navigation(mut self, navigation: NavigationSettings) -> Self {
		self.navigation = navigation;
		self
	}

	pub fn with_activity(mut self, activity: Arc<dyn ActivitySink>) -> Self {
		self.activity = activity;
		self
	}

	pub fn registry(&self) -> &Arc<AdminRegistry> {
		&self.registry
	}

	pub fn menu(&self) -> &Arc<dyn MenuService> {
		&self.menu
	}

	pub fn navigation(&self) -> &NavigationSettings {
		&self.navigation
	}

	pub fn nav_item_id(&self, panel_id: &str) -> String {
		nav_item_id(&self.navigation.menu, panel_id)
	}

	/// Builds the panel for `content_type` without registering it.
	pub fn build(&self, content_type: &ContentType) -> PanelResult<Panel> {
		let panel_id = content_type.panel_id();
		let mut fields = self.converter.field_sets(&content_type.schema)?;
		if let Some(order) = ui_order(content_type.ui_schema.as_ref()) {
			fields.apply_order(&order);
		}
		let tabs = declared_tabs(panel_id, content_type.ui_schema.as_ref())?;
		let repository = self.repositories.repository_for(content_type, &fields)?;

		let mut panel = Panel::new(panel_id, content_type.name.clone(), repository);
		panel.icon = content_type.icon.clone();
		panel.content_type = content_type.slug.clone();
		panel.traits = content_type.capabilities.traits.clone();
		panel.search = content_type.capabilities.search && !fields.search.is_empty();
		panel.workflow = content_type.capabilities.workflow;
		panel.translations = content_type.capabilities.translations;
		panel.fields = fields;
		panel.nav_item_id = self.nav_item_id(panel_id);

		panel.add_tab(PanelTab::new(DEFAULT_TAB, "Content", 0));
		for tab in tabs {
			panel.add_tab(tab);
		}
		Ok(panel)
	}

	/// Registers the panel of `content_type` unless one with the same id
	/// exists. Returns whether a panel was registered.
	pub async fn create_panel(&self, ctx: &Context, content_type: &ContentType) -> PanelResult<bool> {
		let _guard = self.op_lock.lock().await;
		let panel_id = content_type.panel_id();
		if self.registry.contains(panel_id) {
			tracing::debug!(panel_id, "panel already registered");
			return Ok(false);
		}

		let panel = self.build(content_type)?;
		if let Err(err) = self.wire(ctx, &panel, None).await {
			self.repositories.release(panel_id);
			return Err(err);
		}
		self.registry.register(panel);

		metrics::record_panel_operation("register");
		tracing::info!(panel_id, content_type = %content_type.slug, "panel registered");
		self.record(ctx, ActivityAction::PanelRegistered, panel_id).await;
		Ok(true)
	}

	/// Rebuilds the panel from the current content type. The previous panel
	/// stays registered and wired when any step fails.
	pub async fn refresh_panel(&self, ctx: &Context, content_type: &ContentType) -> PanelResult<()> {
		let _guard = self.op_lock.lock().await;
		let panel_id = content_type.panel_id();
		let previous = self.registry.get(panel_id);

		let panel = self.build(content_type).inspect_err(|err| {
			tracing::warn!(panel_id, error = %err, "panel refresh failed; keeping previous panel");
		})?;
		self.wire(ctx, &panel, previous.as_deref()).await?;
		self.registry.register(panel);

		metrics::record_panel_operation("refresh");
		tracing::info!(panel_id, replaced = previous.is_some(), "panel refreshed");
		self.record(ctx, ActivityAction::PanelRefreshed, panel_id).await;
		Ok(())
	}

	/// Unregisters a panel with its navigation item, search adapter and
	/// permissions. Returns whether a panel was registered.
	pub async fn remove_panel(&self, ctx: &Context, panel_id: &str) -> PanelResult<bool> {
		let _guard = self.op_lock.lock().await;
		let nav_id = self
			.registry
			.get(panel_id)
			.map(|p| p.nav_item_id.clone())
			.unwrap_or_else(|| self.nav_item_id(panel_id));

		// The nav item goes first so a failure leaves the panel fully wired
		ctx.run(self.menu.remove(ctx, &nav_id)).await.map_err(|err| {
			step_failed(panel_id, WireStep::Navigation, err)
		})?;
		let Some(panel) = self.registry.remove(panel_id) else {
			return Ok(false);
		};
		self.repositories.release(panel_id);

		if let Some(search) = &self.search
			&& let Err(err) = ctx.run(search.unregister(ctx, panel_id)).await
		{
			cleanup_failed(panel_id, WireStep::Search, &err);
		}
		if let Err(err) = ctx.run(self.permissions.unregister(ctx, panel_id)).await {
			cleanup_failed(panel_id, WireStep::Permissions, &err);
		}

		metrics::record_panel_operation("remove");
		tracing::info!(panel_id, content_type = %panel.content_type, "panel removed");
		self.record(ctx, ActivityAction::PanelRemoved, panel_id).await;
		Ok(true)
	}

	async fn wire(&self, ctx: &Context, panel: &Panel, previous: Option<&Panel>) -> PanelResult<()> {
		let mut done = Vec::new();
		for step in [WireStep::Navigation, WireStep::Search, WireStep::Permissions] {
			match self.wire_step(ctx, panel, step).await {
				Ok(true) => done.push(step),
				Ok(false) => {}
				Err(err) => {
					tracing::warn!(
						panel_id = %panel.id,
						step = step.as_str(),
						error = %err,
						"panel wiring failed; rolling back"
					);
					match previous {
						Some(previous) => self.rewire(previous).await,
						None => self.unwire(panel, &done).await,
					}
					return Err(step_failed(&panel.id, step, err));
				}
			}
		}
		Ok(())
	}

	async fn wire_step(&self, ctx: &Context, panel: &Panel, step: WireStep) -> PanelResult<bool> {
		match step {
			WireStep::Navigation => {
				let mut item = NavItem::new(&panel.nav_item_id, &self.navigation.menu, &panel.label)
					.with_panel(&panel.id)
					.with_position(self.navigation.base_position)
					.with_icon(panel.icon.clone());
				if let Some(parent) = &self.navigation.parent_id {
					item = item.with_parent(parent);
				}
				ctx.run(self.menu.upsert(ctx, item)).await?;
				Ok(true)
			}
			WireStep::Search => {
				let Some(search) = &self.search else {
					return Ok(false);
				};
				if panel.search {
					ctx.run(search.register(ctx, &panel.id, &panel.fields.search))
						.await?;
					Ok(true)
				} else {
					ctx.run(search.unregister(ctx, &panel.id)).await?;
					Ok(false)
				}
			}
			WireStep::Permissions => {
				ctx.run(self.permissions.register(ctx, &panel.id, &panel.permissions))
					.await?;
				Ok(true)
			}
		}
	}

	/// Undoes the given steps of a first registration, newest first.
	async fn unwire(&self, panel: &Panel, done: &[WireStep]) {
		// Rollback runs even when the request context was cancelled
		let ctx = Context::new();
		for step in done.iter().rev() {
			let result = match step {
				WireStep::Navigation => self.menu.remove(&ctx, &panel.nav_item_id).await.map(|_| ()),
				WireStep::Search => match &self.search {
					Some(search) => search.unregister(&ctx, &panel.id).await,
					None => Ok(()),
				},
				WireStep::Permissions => self.permissions.unregister(&ctx, &panel.id).await,
			};
			if let Err(err) = result {
				cleanup_failed(&panel.id, *step, &err);
			}
		}
	}

	/// Re-applies the wiring of the panel a refresh was about to replace.
	async fn rewire(&self, previous: &Panel) {
		let ctx = Context::new();
		for step in [WireStep::Navigation, WireStep::Search, WireStep::Permissions] {
			if let Err(err) = self.wire_step(&ctx, previous, step).await {
				cleanup_failed(&previous.id, step, &err);
			}
		}
	}

	async fn record(&self, ctx: &Context, action: ActivityAction, panel_id: &str) {
		let event = ActivityEvent::new(action, "panel", panel_id)
			.with_actor(ctx.actor())
			.with_metadata("menu", self.navigation.menu.clone());
		activity::emit(self.activity.as_ref(), event).await;
	}
}

fn step_failed(panel_id: &str, step: WireStep, err: PanelError) -> PanelError {
	if err.is_cancelled() {
		return err;
	}
	PanelError::Registration {
		panel_id: panel_id.to_string(),
		step: step.as_str(),
		message: err.to_string(),
	}
}

fn cleanup_failed(panel_id: &str, step: WireStep, err: &PanelError) {
	tracing::warn!(panel_id, step = step.as_str(), error = %err, "panel cleanup step failed");
	metrics::record_side_effect_failure("panel_cleanup");
}

fn ui_order(ui_schema: Option<&Value>) -> Option<Vec<String>> {
	let order = ui_schema?.get("ui:order")?.as_array()?;
	Some(
		order
			.iter()
			.filter_map(Value::as_str)
			.map(str::to_string)
			.collect(),
	)
}

/// Tabs declared under `ui:tabs` as `{id, label?, position?}` objects.
fn declared_tabs(panel_id: &str, ui_schema: Option<&Value>) -> PanelResult<Vec<PanelTab>> {
	let Some(entries) = ui_schema.and_then(|ui| ui.get(TABS_KEY)) else {
		return Ok(Vec::new());
	};
	let Some(entries) = entries.as_array() else {
		return Err(PanelError::invalid(
			format!("tabs of panel '{}' must be a list", panel_id),
			format!("ui_schema.{}", TABS_KEY),
			"expected an array",
		));
	};
	entries
		.iter()
		.enumerate()
		.map(|(idx, entry)| {
			let Some(id) = entry.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()) else {
				return Err(PanelError::invalid(
					format!("tab {} of panel '{}' has no id", idx, panel_id),
					format!("ui_schema.{}.{}", TABS_KEY, idx),
					"missing id",
				));
			};
			let label = entry
				.get("label")
				.and_then(Value::as_str)
				.map(str::to_string)
				.unwrap_or_else(|| reinhardt_backoffice_core::text::humanize_field_name(id));
			let position = entry
				.get("position")
				.and_then(Value::as_i64)
				.and_then(|p| i32::try_from(p).ok())
				.unwrap_or(idx as i32 + 1);
			Ok(PanelTab::new(id, label, position))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::navigation::InMemoryMenuService;
	use crate::permissions::InMemoryPermissionRegistry;
	use crate::repository::InMemoryRepositoryProvider;
	use crate::search::InMemorySearchRegistry;
	use async_trait::async_trait;
	use reinhardt_backoffice_core::{BackofficeError, ContentTypeStatus, InMemoryActivitySink};
	use rstest::rstest;
	use serde_json::json;

	struct Fixture {
		factory: PanelFactory,
		menu: Arc<InMemoryMenuService>,
		search: Arc<InMemorySearchRegistry>,
		permissions: Arc<InMemoryPermissionRegistry>,
		activity: Arc<InMemoryActivitySink>,
	}

	fn fixture() -> Fixture {
		let menu = Arc::new(InMemoryMenuService::new());
		let search = Arc::new(InMemorySearchRegistry::new());
		let permissions = Arc::new(InMemoryPermissionRegistry::new());
		let activity = Arc::new(InMemoryActivitySink::new());
		let factory = PanelFactory::new(
			Arc::new(AdminRegistry::new()),
			menu.clone(),
			permissions.clone(),
			Arc::new(InMemoryRepositoryProvider::new()),
		)
		.with_search(search.clone())
		.with_activity(activity.clone());
		Fixture {
			factory,
			menu,
			search,
			permissions,
			activity,
		}
	}

	fn article() -> ContentType {
		ContentType::new(
			"article",
			"Articles",
			json!({
				"type": "object",
				"properties": {"title": {"type": "string"}, "body": {"type": "string"}}
			}),
		)
		.with_status(ContentTypeStatus::Active)
	}

	struct FailingPermissions;

	#[async_trait]
	impl PermissionRegistry for FailingPermissions {
		async fn register(
			&self,
			_ctx: &Context,
			_panel_id: &str,
			_permissions: &crate::panel::PanelPermissions,
		) -> PanelResult<()> {
			Err(PanelError::Core(BackofficeError::service_unavailable(
				"permissions",
				"backend offline",
			)))
		}

		async fn unregister(&self, _ctx: &Context, _panel_id: &str) -> PanelResult<()> {
			Ok(())
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_create_wires_everything() {
		// Arrange
		let fx = fixture();
		let ctx = Context::new();

		// Act
		let created = fx.factory.create_panel(&ctx, &article()).await.unwrap();

		// Assert
		assert!(created);
		assert!(fx.factory.registry().contains("article"));
		assert!(fx.menu.contains("content.article"));
		assert_eq!(fx.search.fields("article"), Some(vec!["body".to_string(), "title".to_string()]));
		assert!(fx.permissions.contains("admin.article.view"));
		assert_eq!(fx.activity.actions(), vec![ActivityAction::PanelRegistered]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_create_is_idempotent() {
		// Arrange
		let fx = fixture();
		let ctx = Context::new();
		fx.factory.create_panel(&ctx, &article()).await.unwrap();

		// Act
		let created = fx.factory.create_panel(&ctx, &article()).await.unwrap();

		// Assert
		assert!(!created);
		assert_eq!(fx.factory.registry().len(), 1);
		assert_eq!(fx.activity.actions().len(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_failed_permissions_roll_back_navigation() {
		// Arrange
		let menu = Arc::new(InMemoryMenuService::new());
		let search = Arc::new(InMemorySearchRegistry::new());
		let factory = PanelFactory::new(
			Arc::new(AdminRegistry::new()),
			menu.clone(),
			Arc::new(FailingPermissions),
			Arc::new(InMemoryRepositoryProvider::new()),
		)
		.with_search(search.clone());

		// Act
		let err = factory.create_panel(&Context::new(), &article()).await.unwrap_err();

		// Assert
		assert!(matches!(err, PanelError::Registration { step: "permissions", .. }));
		assert!(factory.registry().is_empty());
		assert!(menu.is_empty());
		assert!(!search.contains("article"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_failed_refresh_keeps_previous_panel() {
		// Arrange
		let fx = fixture();
		let ctx = Context::new();
		fx.factory.create_panel(&ctx, &article()).await.unwrap();
		let broken = article().with_ui_schema(json!({"ui:tabs": [{"label": "No id"}]}));

		// Act
		let result = fx.factory.refresh_panel(&ctx, &broken).await;

		// Assert
		assert!(result.is_err());
		let panel = fx.factory.registry().get("article").unwrap();
		assert_eq!(panel.tabs().len(), 1);
		assert!(fx.menu.contains("content.article"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_remove_clears_wiring() {
		// Arrange
		let fx = fixture();
		let ctx = Context::new();
		fx.factory.create_panel(&ctx, &article()).await.unwrap();

		// Act
		let removed = fx.factory.remove_panel(&ctx, "article").await.unwrap();
		let again = fx.factory.remove_panel(&ctx, "article").await.unwrap();

		// Assert
		assert!(removed);
		assert!(!again);
		assert!(fx.menu.is_empty());
		assert!(!fx.search.contains("article"));
		assert!(!fx.permissions.contains("admin.article.view"));
	}

	#[rstest]
	fn test_declared_tabs_follow_ui_schema() {
		// Arrange
		let fx = fixture();
		let ct = article().with_ui_schema(json!({
			"ui:tabs": [{"id": "seo_settings"}, {"id": "content", "label": "Body"}]
		}));

		// Act
		let panel = fx.factory.build(&ct).unwrap();

		// Assert
		let tabs: Vec<(&str, &str)> = panel.tabs().iter().map(|t| (t.id.as_str(), t.label.as_str())).collect();
		assert_eq!(tabs, vec![("content", "Content"), ("seo_settings", "Seo settings")]);
	}
}
