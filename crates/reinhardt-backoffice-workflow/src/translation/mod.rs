//! Translation completeness on workflow transitions
//!
//! - [`policy`]: which locales a transition requires
//! - [`checker`]: which locales an entity has
//! - [`gate`]: blocks a transition when required locales are missing
//! - [`assignment`]: translation work items and their repository
//! - [`queue`]: files assignments when the gate blocks

pub mod assignment;
pub mod checker;
pub mod gate;
pub mod policy;
pub mod queue;

pub use assignment::{
	AssignmentPriority, AssignmentRepository, AssignmentStatus, AssignmentType,
	InMemoryAssignmentRepository, TranslationAssignment,
};
pub use checker::{CoverageQuery, CoverageReport, InMemoryTranslationChecker, TranslationChecker};
pub use gate::{GateInput, MissingTranslations, TranslationGate};
pub use policy::{
	ANY_TRANSITION, FieldStrategy, PolicyQuery, PolicyResolver, PolicyRule, StaticPolicyResolver,
	TranslationPolicy,
};
pub use queue::{QueueOutcome, TranslationQueueHook, TranslationSource};
