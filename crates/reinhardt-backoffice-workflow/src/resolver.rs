//! Binding resolution
//!
//! Picks the workflow for an entity from the active bindings of its
//! environment. Content-type bindings beat trait bindings, which beat global
//! ones. Within a tier the lowest priority wins; an environment-specific
//! binding beats an environment-less one at equal priority, and remaining
//! ties go to the most recently updated binding.

use crate::binding::{ScopeType, WorkflowBinding};
use crate::error::{WorkflowError, WorkflowResult};
use crate::repository::WorkflowBindingRepository;
use reinhardt_backoffice_core::Context;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveInput {
	pub content_type: String,
	#[serde(default)]
	pub traits: Vec<String>,
	#[serde(default)]
	pub environment: Option<String>,
}

impl ResolveInput {
	pub fn new(content_type: impl Into<String>) -> Self {
		Self {
			content_type: content_type.into(),
			..Self::default()
		}
	}

	pub fn with_traits<I, S>(mut self, traits: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.traits = traits.into_iter().map(Into::into).collect();
		self
	}

	pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
		self.environment = Some(environment.into());
		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
	BindingContentType,
	BindingTrait,
	BindingGlobal,
}

impl ResolutionSource {
	fn for_scope(scope: ScopeType) -> Self {
		match scope {
			ScopeType::ContentType => ResolutionSource::BindingContentType,
			ScopeType::Trait => ResolutionSource::BindingTrait,
			ScopeType::Global => ResolutionSource::BindingGlobal,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ResolutionSource::BindingContentType => "binding_content_type",
			ResolutionSource::BindingTrait => "binding_trait",
			ResolutionSource::BindingGlobal => "binding_global",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
	pub workflow_id: String,
	pub source: ResolutionSource,
	pub binding_id: String,
	pub scope_type: ScopeType,
	pub scope_ref: String,
	pub priority: i32,
	pub environment: Option<String>,
}

impl From<&WorkflowBinding> for Resolution {
	fn from(binding: &WorkflowBinding) -> Self {
		Self {
			workflow_id: binding.workflow_id.clone(),
			source: ResolutionSource::for_scope(binding.scope_type),
			binding_id: binding.id.clone(),
			scope_type: binding.scope_type,
			scope_ref: binding.scope_ref.clone(),
			priority: binding.priority,
			environment: binding.environment.clone(),
		}
	}
}

#[derive(Clone)]
pub struct WorkflowResolver {
	bindings: Arc<dyn WorkflowBindingRepository>,
}

impl WorkflowResolver {
	pub fn new(bindings: Arc<dyn WorkflowBindingRepository>) -> Self {
		Self { bindings }
	}

	pub async fn resolve(&self, ctx: &Context, input: &ResolveInput) -> WorkflowResult<Resolution> {
		let environment = input
			.environment
			.as_deref()
			.filter(|e| !e.trim().is_empty())
			.unwrap_or_else(|| ctx.environment());
		let active = ctx.run(self.bindings.list_active(environment)).await?;

		let best = select_binding(&active, input);
		match best {
			Some(binding) => {
				let resolution = Resolution::from(binding);
				tracing::debug!(
					content_type = %input.content_type,
					environment,
					workflow_id = %resolution.workflow_id,
					source = resolution.source.as_str(),
					"workflow resolved"
				);
				Ok(resolution)
			}
			None => Err(WorkflowError::Unbound {
				content_type: input.content_type.clone(),
				environment: environment.to_string(),
			}),
		}
	}
}

fn matches_entity(binding: &WorkflowBinding, input: &ResolveInput) -> bool {
	let scope_ref = binding.scope_ref.trim();
	match binding.scope_type {
		ScopeType::Global => true,
		ScopeType::ContentType => scope_ref.eq_ignore_ascii_case(input.content_type.trim()),
		ScopeType::Trait => input
			.traits
			.iter()
			.any(|t| scope_ref.eq_ignore_ascii_case(t.trim())),
	}
}

/// Pure ranking over already-filtered active bindings.
pub fn select_binding<'a>(
	active: &'a [WorkflowBinding],
	input: &ResolveInput,
) -> Option<&'a WorkflowBinding> {
	active
		.iter()
		.filter(|b| b.is_active() && matches_entity(b, input))
		.min_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.id.cmp(&b.id)))
}

fn rank(binding: &WorkflowBinding) -> (u8, i32, bool, Reverse<chrono::DateTime<chrono::Utc>>) {
	let environment_less = binding.environment.as_deref().is_none_or(str::is_empty);
	(
		binding.scope_type.specificity(),
		binding.priority,
		environment_less,
		Reverse(binding.updated_at),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::repository::InMemoryBindingRepository;
	use chrono::{Duration, Utc};
	use rstest::rstest;

	#[rstest]
	fn test_lower_priority_wins_within_tier() {
		// Arrange
		let bindings = vec![
			WorkflowBinding::for_trait("editorial", "slow").with_id("a").with_priority(10),
			WorkflowBinding::for_trait("editorial", "fast").with_id("b").with_priority(1),
		];
		let input = ResolveInput::new("article").with_traits(["editorial"]);

		// Act
		let best = select_binding(&bindings, &input).unwrap();

		// Assert
		assert_eq!(best.workflow_id, "fast");
	}

	#[rstest]
	fn test_tie_goes_to_newest() {
		// Arrange
		let mut older = WorkflowBinding::global("old").with_id("a");
		older.updated_at = Utc::now() - Duration::hours(1);
		let newer = WorkflowBinding::global("new").with_id("b");
		let bindings = vec![older, newer];

		// Act
		let best = select_binding(&bindings, &ResolveInput::new("article")).unwrap();

		// Assert
		assert_eq!(best.workflow_id, "new");
	}

	#[rstest]
	fn test_environment_specific_beats_fallback_at_equal_priority() {
		// Arrange
		let bindings = vec![
			WorkflowBinding::global("fallback").with_id("a"),
			WorkflowBinding::global("staged").with_id("b").with_environment("staging"),
		];

		// Act
		let best = select_binding(&bindings, &ResolveInput::new("article")).unwrap();

		// Assert
		assert_eq!(best.workflow_id, "staged");
	}

	#[rstest]
	fn test_unmatched_scopes_are_ignored() {
		// Arrange
		let bindings = vec![
			WorkflowBinding::content_type("page", "w-page").with_id("a"),
			WorkflowBinding::for_trait("legal", "w-legal").with_id("b"),
		];
		let input = ResolveInput::new("article").with_traits(["editorial"]);

		// Act & Assert
		assert!(select_binding(&bindings, &input).is_none());
	}

	#[rstest]
	#[tokio::test]
	async fn test_resolve_without_bindings_is_not_found() {
		// Arrange
		let resolver = WorkflowResolver::new(Arc::new(InMemoryBindingRepository::new()));

		// Act
		let err = resolver
			.resolve(&Context::new(), &ResolveInput::new("article"))
			.await
			.unwrap_err();

		// Assert
		let mapped = reinhardt_backoffice_core::BackofficeError::from(err);
		assert_eq!(
			mapped.text_code(),
			reinhardt_backoffice_core::TextCode::WorkflowNotFound
		);
	}
}
