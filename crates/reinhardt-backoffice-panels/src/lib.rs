//! # Reinhardt Back-office Panels
//!
//! Admin panels synthesized from content types at runtime.
//!
//! ## Architecture
//!
//! ```text
//! reinhardt-backoffice-panels
//! ├── fields        - schema -> list/form/detail field descriptors
//! ├── panel         - panel model, tabs and permission codenames
//! ├── registry      - the admin registry (single writer lock)
//! ├── navigation    - menu service with cycle detection
//! ├── permissions   - permission registry and checkers
//! ├── search        - search adapter registry
//! ├── repository    - record repositories with autosave tokens
//! ├── factory       - create/refresh/remove with rollback
//! ├── crud          - permission-checked CRUD and workflow transitions
//! ├── content_types - content type commands driving the factory
//! └── doctor        - registry/navigation consistency check
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use reinhardt_backoffice_core::{ContentType, ContentTypeStatus, Context};
//! use reinhardt_backoffice_panels::{
//! 	AdminRegistry, InMemoryMenuService, InMemoryPermissionRegistry, InMemoryRepositoryProvider,
//! 	PanelFactory,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let factory = PanelFactory::new(
//! 	Arc::new(AdminRegistry::new()),
//! 	Arc::new(InMemoryMenuService::new()),
//! 	Arc::new(InMemoryPermissionRegistry::new()),
//! 	Arc::new(InMemoryRepositoryProvider::new()),
//! );
//! let article = ContentType::new(
//! 	"article",
//! 	"Articles",
//! 	json!({"type": "object", "properties": {"title": {"type": "string"}}}),
//! )
//! .with_status(ContentTypeStatus::Active);
//!
//! assert!(factory.create_panel(&Context::new(), &article).await.unwrap());
//! assert!(factory.registry().contains("article"));
//! # });
//! ```

pub mod content_types;
pub mod crud;
pub mod doctor;
pub mod error;
pub mod factory;
pub mod fields;
pub mod navigation;
pub mod panel;
pub mod permissions;
pub mod registry;
pub mod repository;
pub mod search;

pub use content_types::{
	ContentTypeRepository, ContentTypeService, ContentTypeUpdate, InMemoryContentTypeRepository,
};
pub use crud::{PanelCrudOptions, PanelCrudService, PanelUpdate};
pub use doctor::PanelNavigationCheck;
pub use error::{PanelError, PanelResult, latest_state_path};
pub use factory::PanelFactory;
pub use fields::{
	FieldChoice, FieldSets, FieldType, OptionsResolver, PanelField, SchemaConverter,
	StaticOptionsResolver,
};
pub use navigation::{InMemoryMenuService, MenuService, NavItem, nav_item_id};
pub use panel::{Panel, PanelAction, PanelDescriptor, PanelPermissions, PanelTab};
pub use permissions::{
	AllowAll, InMemoryPermissionRegistry, PermissionChecker, PermissionRegistry,
	StaticPermissionChecker,
};
pub use registry::AdminRegistry;
pub use repository::{
	InMemoryPanelRepository, InMemoryRepositoryProvider, ListPage, ListQuery, PanelRecord,
	PanelRepository, RepositoryProvider,
};
pub use search::{InMemorySearchRegistry, SearchRegistry};
