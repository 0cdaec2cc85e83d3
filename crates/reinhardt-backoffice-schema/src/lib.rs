//! # Reinhardt Back-office Schema
//!
//! Authoring-time handling of content-type schemas.
//!
//! ## Architecture
//!
//! ```text
//! reinhardt-backoffice-schema
//! ├── guardrails    - size, field-count, depth and reserved-name limits
//! ├── rate_limit    - fixed-window limiter for validate/preview
//! ├── normalize     - keyword stripping, block library rewrite, form id
//! ├── formgen       - form generator seam and the default generator
//! ├── validator     - validate/preview pipeline
//! ├── breaking      - breaking-change detection between revisions
//! └── blocks        - block definitions, field types, diagnostics
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use reinhardt_backoffice_core::Context;
//! use reinhardt_backoffice_schema::{SchemaValidator, ValidateOptions};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let validator = SchemaValidator::default();
//! let schema = json!({"type": "object", "properties": {"title": {"type": "string"}}});
//!
//! let report = validator
//! 	.validate(&Context::new(), &schema, &ValidateOptions::new())
//! 	.await
//! 	.unwrap();
//! assert!(report.valid);
//! # });
//! ```

pub mod blocks;
pub mod breaking;
pub mod error;
pub mod formgen;
pub mod guardrails;
pub mod normalize;
pub mod rate_limit;
pub mod validator;

pub use blocks::{
	BlockDefinition, BlockDefinitionMeta, BlockDefinitionService, BlockDiagnostics, BlockStatus,
	FieldTypeDescriptor, FieldTypeRegistry, InMemoryBlockDefinitionService, SchemaVersion,
	block_candidates_with_discriminator,
};
pub use breaking::{BreakingChange, BreakingChangeDetector};
pub use error::{SchemaError, SchemaResult};
pub use formgen::{
	DefaultFormGenerator, FieldTransformer, FormDefinition, FormField, FormFieldKind,
	FormGenerationError, FormGenerator, FormRequest, HybridJsonTransformer,
};
pub use guardrails::{LimitExceeded, SchemaGuardrails, SchemaLimits, SchemaValidation};
pub use normalize::{FormDiscovery, NormalizeOptions, NormalizedSchema, SchemaNormalizer};
pub use rate_limit::{Clock, ManualClock, RateDecision, RateLimiter, SystemClock};
pub use validator::{SchemaValidator, ValidateOptions};
