//! # Reinhardt Back-office
//!
//! Dynamic content types and workflows for admin back-offices.
//!
//! Content types are JSON-Schema documents managed at runtime. Activating one
//! synthesizes an admin panel (navigation, permissions, search and CRUD);
//! records move through versioned workflows resolved from bindings, gated by
//! translation policies, with translation assignments queued on success.
//!
//! ## Crates
//!
//! - [`core`]: context, errors and presenter, settings, features, URLs, doctor
//! - [`schema`]: guardrails, rate limiter, validator/previewer, block definitions
//! - [`workflow`]: definitions, bindings, runtime, translation gate and queue hook
//! - [`panels`]: panel factory, registry, menu, CRUD and content-type commands
//!
//! ## Feature Flags
//!
//! - `api` (default): [`api::BackofficeApi`], the JSON HTTP surface
//!
//! ## Quick Start
//!
//! ```rust
//! use reinhardt_backoffice::Backoffice;
//! use reinhardt_backoffice::core::{ContentType, ContentTypeStatus, Context};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let backoffice = Backoffice::in_memory().unwrap();
//! let ctx = Context::new();
//! let article = ContentType::new(
//! 	"article",
//! 	"Articles",
//! 	json!({"type": "object", "properties": {"title": {"type": "string"}}}),
//! )
//! .with_status(ContentTypeStatus::Active);
//!
//! backoffice.content_types().create(&ctx, article).await.unwrap();
//! assert!(backoffice.registry().contains("article"));
//! assert!(!backoffice.doctor(&ctx).await.has_errors());
//! # });
//! ```

#[cfg(feature = "api")]
pub mod api;
pub mod bootstrap;
pub mod doctor;

pub use reinhardt_backoffice_core as core;
pub use reinhardt_backoffice_panels as panels;
pub use reinhardt_backoffice_schema as schema;
pub use reinhardt_backoffice_workflow as workflow;

#[cfg(feature = "api")]
pub use api::BackofficeApi;
pub use bootstrap::{Backoffice, BackofficeBuilder};
pub use doctor::SettingsCheck;

pub use reinhardt_backoffice_core::{BackofficeError, BackofficeResult, BackofficeSettings, Context};
