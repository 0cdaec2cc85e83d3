//! # Reinhardt Back-office Workflow
//!
//! Versioned workflows, scope bindings, and the translation checks that run
//! on every transition.
//!
//! ## Architecture
//!
//! ```text
//! reinhardt-backoffice-workflow
//! ├── definition    - state machines and persisted workflow revisions
//! ├── binding       - scope -> workflow bindings
//! ├── repository    - CAS repositories with in-memory implementations
//! ├── resolver      - content type > trait > global resolution
//! ├── runtime       - transition evaluation
//! ├── service       - create/update/rollback and binding management
//! └── translation
//!     ├── policy     - required locales per entity and transition
//!     ├── checker    - locale coverage lookups
//!     ├── gate       - MissingTranslations on incomplete coverage
//!     ├── assignment - translation work items
//!     └── queue      - auto-create hook for blocked transitions
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use reinhardt_backoffice_core::Context;
//! use reinhardt_backoffice_workflow::{
//! 	InMemoryBindingRepository, InMemoryWorkflowRepository, PersistedWorkflow, TransitionRequest,
//! 	WorkflowBinding, WorkflowDefinition, WorkflowRuntime, WorkflowService, WorkflowStatus,
//! };
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let ctx = Context::new();
//! let service = WorkflowService::new(
//! 	Arc::new(InMemoryWorkflowRepository::new()),
//! 	Arc::new(InMemoryBindingRepository::new()),
//! );
//! let definition = WorkflowDefinition::new("draft").with_transition("publish", "draft", "published");
//! service
//! 	.create_workflow(&ctx, PersistedWorkflow::new("editorial", "Editorial", definition).with_status(WorkflowStatus::Active))
//! 	.await
//! 	.unwrap();
//! service
//! 	.create_binding(&ctx, WorkflowBinding::content_type("article", "editorial"))
//! 	.await
//! 	.unwrap();
//!
//! let runtime = WorkflowRuntime::new(service.resolver().clone(), service.workflows());
//! let result = runtime
//! 	.transition(&ctx, &TransitionRequest::new("article", "a1", "draft", "published"))
//! 	.await
//! 	.unwrap();
//! assert_eq!(result.transition_name, "publish");
//! # });
//! ```

pub mod binding;
pub mod definition;
pub mod error;
pub mod repository;
pub mod resolver;
pub mod runtime;
pub mod service;
pub mod translation;

pub use binding::{BindingKey, BindingStatus, ScopeType, WorkflowBinding};
pub use definition::{PersistedWorkflow, WorkflowDefinition, WorkflowStatus, WorkflowTransition};
pub use error::{WorkflowError, WorkflowResult};
pub use repository::{
	InMemoryBindingRepository, InMemoryWorkflowRepository, WorkflowBindingRepository,
	WorkflowDefinitionRepository,
};
pub use resolver::{Resolution, ResolutionSource, ResolveInput, WorkflowResolver, select_binding};
pub use runtime::{TransitionRequest, TransitionResult, WorkflowRuntime};
pub use service::{BindingUpdate, WorkflowService, WorkflowUpdate};
pub use translation::{
	AssignmentRepository, InMemoryAssignmentRepository, InMemoryTranslationChecker,
	MissingTranslations, PolicyResolver, StaticPolicyResolver, TranslationAssignment,
	TranslationChecker, TranslationGate, TranslationPolicy, TranslationQueueHook, TranslationSource,
};
