//! Panel lifecycle scenarios: registration round trips, navigation
//! cleanup, tab collisions and autosave conflicts.

use reinhardt_backoffice_core::{
	BackofficeError, ContentType, ContentTypeStatus, Context, InMemoryActivitySink, TextCode,
};
use reinhardt_backoffice_core::activity::ActivityAction;
use reinhardt_backoffice_panels::{
	AdminRegistry, AllowAll, ContentTypeService, ContentTypeUpdate, InMemoryContentTypeRepository,
	InMemoryMenuService, InMemoryPermissionRegistry, InMemoryRepositoryProvider,
	InMemorySearchRegistry, ListQuery, MenuService, NavItem, PanelCrudService, PanelError,
	PanelFactory,
};
use rstest::{fixture, rstest};
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

struct Platform {
	factory: Arc<PanelFactory>,
	menu: Arc<InMemoryMenuService>,
	activity: Arc<InMemoryActivitySink>,
}

#[fixture]
fn platform() -> Platform {
	let menu = Arc::new(InMemoryMenuService::new());
	let activity = Arc::new(InMemoryActivitySink::new());
	let factory = PanelFactory::new(
		Arc::new(AdminRegistry::new()),
		menu.clone(),
		Arc::new(InMemoryPermissionRegistry::new()),
		Arc::new(InMemoryRepositoryProvider::new()),
	)
	.with_search(Arc::new(InMemorySearchRegistry::new()))
	.with_activity(activity.clone());
	Platform {
		factory: Arc::new(factory),
		menu,
		activity,
	}
}

fn article() -> ContentType {
	ContentType::new(
		"article",
		"Articles",
		json!({
			"type": "object",
			"required": ["title"],
			"properties": {
				"title": {"type": "string"},
				"path": {"type": "string"},
				"featured": {"type": "boolean"}
			}
		}),
	)
	.with_id("ct-article")
	.with_status(ContentTypeStatus::Active)
}

fn content_types(platform: &Platform) -> ContentTypeService {
	ContentTypeService::new(
		Arc::new(InMemoryContentTypeRepository::new()),
		platform.factory.clone(),
	)
}

fn untitled_tab() -> Value {
	json!({"ui:tabs": [{"label": "No id"}]})
}

fn data(value: Value) -> Map<String, Value> {
	match value {
		Value::Object(map) => map,
		_ => Map::new(),
	}
}

/// Captures WARN events as `field=value` strings.
struct WarningCapture {
	events: Arc<Mutex<Vec<String>>>,
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningCapture {
	fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
		struct FieldVisitor {
			fields: Vec<String>,
		}

		impl tracing::field::Visit for FieldVisitor {
			fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
				self.fields.push(format!("{}={:?}", field.name(), value));
			}
		}

		if *event.metadata().level() != tracing::Level::WARN {
			return;
		}
		let mut visitor = FieldVisitor { fields: Vec::new() };
		event.record(&mut visitor);
		self.events.lock().unwrap().push(visitor.fields.join(" "));
	}
}

#[rstest]
#[tokio::test]
async fn test_register_refresh_remove_register_round_trip(platform: Platform) {
	// Arrange
	let ctx = Context::new();
	let factory = &platform.factory;
	factory.create_panel(&ctx, &article()).await.unwrap();
	let first = factory.registry().get("article").unwrap().descriptor();
	let first_nav = platform.menu.items(&ctx, "content").await.unwrap();

	// Act
	factory.refresh_panel(&ctx, &article()).await.unwrap();
	factory.remove_panel(&ctx, "article").await.unwrap();
	factory.create_panel(&ctx, &article()).await.unwrap();

	// Assert
	let last = factory.registry().get("article").unwrap().descriptor();
	assert_eq!(last, first);
	assert_eq!(platform.menu.items(&ctx, "content").await.unwrap(), first_nav);
	assert_eq!(factory.registry().len(), 1);
	assert_eq!(
		platform.activity.actions(),
		vec![
			ActivityAction::PanelRegistered,
			ActivityAction::PanelRefreshed,
			ActivityAction::PanelRemoved,
			ActivityAction::PanelRegistered,
		]
	);
}

#[rstest]
#[tokio::test]
async fn test_deleting_content_type_leaves_no_stale_nav(platform: Platform) {
	// Arrange
	let ctx = Context::new();
	let service = ContentTypeService::new(
		Arc::new(InMemoryContentTypeRepository::new()),
		platform.factory.clone(),
	);
	service.create(&ctx, article()).await.unwrap();
	assert!(platform.menu.contains("content.article"));

	// Act
	service.delete(&ctx, "ct-article").await.unwrap();

	// Assert
	assert!(!platform.factory.registry().contains("article"));
	assert!(platform.menu.items(&ctx, "content").await.unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_tab_collision_warns_and_keeps_first(platform: Platform) {
	// Arrange
	let events = Arc::new(Mutex::new(Vec::new()));
	let _guard = tracing_subscriber::registry()
		.with(WarningCapture {
			events: events.clone(),
		})
		.set_default();
	let ct = article().with_ui_schema(json!({
		"ui:tabs": [
			{"id": "seo", "label": "SEO"},
			{"id": "seo", "label": "Search engines"}
		]
	}));

	// Act
	platform.factory.create_panel(&Context::new(), &ct).await.unwrap();

	// Assert
	let panel = platform.factory.registry().get("article").unwrap();
	let seo: Vec<&str> = panel
		.tabs()
		.iter()
		.filter(|t| t.id == "seo")
		.map(|t| t.label.as_str())
		.collect();
	assert_eq!(seo, vec!["SEO"]);
	let captured = events.lock().unwrap();
	assert_eq!(captured.len(), 1);
	assert!(captured[0].contains("panel_id=article"));
	assert!(captured[0].contains("tab_id=seo"));
}

#[rstest]
#[tokio::test]
async fn test_publishing_with_parent_menu_rejects_cycles(platform: Platform) {
	// Arrange
	let ctx = Context::new();
	platform
		.menu
		.upsert(&ctx, NavItem::new("content.root", "content", "Content"))
		.await
		.unwrap();
	platform
		.menu
		.upsert(&ctx, NavItem::new("content.child", "content", "Child").with_parent("content.root"))
		.await
		.unwrap();

	// Act
	let err = platform
		.menu
		.upsert(&ctx, NavItem::new("content.root", "content", "Content").with_parent("content.child"))
		.await
		.unwrap_err();

	// Assert
	let mapped = BackofficeError::from(err);
	assert_eq!(mapped.text_code(), TextCode::ValidationError);
	assert_eq!(mapped.field_errors().get("parent_id").map(String::as_str), Some("cycle"));
}

#[rstest]
#[tokio::test]
async fn test_stale_autosave_token_returns_latest_state(platform: Platform) {
	// Arrange
	let ctx = Context::new();
	platform.factory.create_panel(&ctx, &article()).await.unwrap();
	let crud = PanelCrudService::new(platform.factory.registry().clone(), Arc::new(AllowAll));
	let created = crud
		.create(&ctx, "article", data(json!({"id": "a1", "title": "Draft"})))
		.await
		.unwrap();
	crud.update(&ctx, "article", "a1", data(json!({"title": "Second"})), Some(created.version))
		.await
		.unwrap();

	// Act
	let err = crud
		.update(&ctx, "article", "a1", data(json!({"title": "Third"})), Some(created.version))
		.await
		.unwrap_err();

	// Assert
	let mapped = BackofficeError::from(err);
	assert_eq!(mapped.text_code(), TextCode::Conflict);
	assert_eq!(mapped.status(), 409);
	assert_eq!(mapped.metadata_value("latest_state_path"), Some(&json!("/api/article/a1")));
	let latest = mapped.metadata_value("latest_server_state").unwrap();
	assert_eq!(latest["title"], json!("Second"));
	assert_eq!(latest["version"], json!(2));
}

#[rstest]
#[tokio::test]
async fn test_duplicate_path_is_a_path_conflict(platform: Platform) {
	// Arrange
	let ctx = Context::new();
	platform.factory.create_panel(&ctx, &article()).await.unwrap();
	let crud = PanelCrudService::new(platform.factory.registry().clone(), Arc::new(AllowAll));
	crud.create(&ctx, "article", data(json!({"id": "a1", "title": "One", "path": "/news"})))
		.await
		.unwrap();

	// Act
	let err = crud
		.create(&ctx, "article", data(json!({"title": "Two", "path": "/news"})))
		.await
		.unwrap_err();

	// Assert
	assert!(matches!(err, PanelError::PathConflict { .. }));
	assert_eq!(BackofficeError::from(err).text_code(), TextCode::PathConflict);
}

#[rstest]
#[tokio::test]
async fn test_records_survive_a_refresh(platform: Platform) {
	// Arrange
	let ctx = Context::new();
	let service = ContentTypeService::new(
		Arc::new(InMemoryContentTypeRepository::new()),
		platform.factory.clone(),
	);
	service.create(&ctx, article()).await.unwrap();
	let crud = PanelCrudService::new(platform.factory.registry().clone(), Arc::new(AllowAll));
	crud.create(&ctx, "article", data(json!({"id": "a1", "title": "Kept"})))
		.await
		.unwrap();

	// Act
	service
		.update(&ctx, "ct-article", ContentTypeUpdate::new().with_name("News"))
		.await
		.unwrap();

	// Assert
	let panel = platform.factory.registry().get("article").unwrap();
	assert_eq!(panel.label, "News");
	assert_eq!(crud.get(&ctx, "article", "a1").await.unwrap().str_field("title"), Some("Kept"));
}

#[rstest]
#[tokio::test]
async fn test_failed_panel_sync_on_create_stores_nothing(platform: Platform) {
	// Arrange
	let ctx = Context::new();
	let service = content_types(&platform);

	// Act
	let err = service
		.create(&ctx, article().with_ui_schema(untitled_tab()))
		.await
		.unwrap_err();

	// Assert
	assert_eq!(BackofficeError::from(err).text_code(), TextCode::ValidationError);
	assert!(service.list(&ctx).await.unwrap().is_empty());
	assert!(!platform.factory.registry().contains("article"));
	service.create(&ctx, article()).await.unwrap();
	assert!(platform.factory.registry().contains("article"));
}

#[rstest]
#[tokio::test]
async fn test_failed_panel_sync_on_update_keeps_stored_revision(platform: Platform) {
	// Arrange
	let ctx = Context::new();
	let service = content_types(&platform);
	service.create(&ctx, article()).await.unwrap();

	// Act
	let result = service
		.update(
			&ctx,
			"ct-article",
			ContentTypeUpdate::new()
				.with_name("News")
				.with_ui_schema(untitled_tab()),
		)
		.await;

	// Assert
	assert!(result.is_err());
	let stored = service.get(&ctx, "ct-article").await.unwrap();
	assert_eq!(stored.name, "Articles");
	assert_eq!(stored.ui_schema, None);
	assert_eq!(platform.factory.registry().get("article").unwrap().label, "Articles");
}

#[rstest]
#[tokio::test]
async fn test_search_covers_fields_added_by_refresh(platform: Platform) {
	// Arrange
	let ctx = Context::new();
	let service = content_types(&platform);
	service.create(&ctx, article()).await.unwrap();
	let mut schema = article().schema;
	schema["properties"]["summary"] = json!({"type": "string"});
	service
		.update(&ctx, "ct-article", ContentTypeUpdate::new().with_schema(schema))
		.await
		.unwrap();
	let crud = PanelCrudService::new(platform.factory.registry().clone(), Arc::new(AllowAll));
	crud.create(&ctx, "article", data(json!({"title": "Hello", "summary": "zebra"})))
		.await
		.unwrap();

	// Act
	let by_summary = crud
		.list(&ctx, "article", &ListQuery::new().with_search("zebra"))
		.await
		.unwrap();
	let by_title = crud
		.list(&ctx, "article", &ListQuery::new().with_search("hello"))
		.await
		.unwrap();

	// Assert
	assert_eq!(by_summary.total, 1);
	assert_eq!(by_title.total, 1);
}

#[rstest]
#[tokio::test]
async fn test_recreated_content_type_starts_without_records(platform: Platform) {
	// Arrange
	let ctx = Context::new();
	let service = content_types(&platform);
	service.create(&ctx, article()).await.unwrap();
	let crud = PanelCrudService::new(platform.factory.registry().clone(), Arc::new(AllowAll));
	crud.create(&ctx, "article", data(json!({"id": "a1", "title": "Gone"})))
		.await
		.unwrap();
	service.delete(&ctx, "ct-article").await.unwrap();

	// Act
	service.create(&ctx, article()).await.unwrap();

	// Assert
	let page = crud.list(&ctx, "article", &ListQuery::new()).await.unwrap();
	assert_eq!(page.total, 0);
}
