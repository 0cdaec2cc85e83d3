//! Translation completeness gate on workflow transitions

use crate::error::{WorkflowError, WorkflowResult};
use crate::translation::checker::{CoverageQuery, TranslationChecker};
use crate::translation::policy::{PolicyQuery, PolicyResolver};
use reinhardt_backoffice_core::{Context, metrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Payload of a blocked transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingTranslations {
	pub missing_locales: Vec<String>,
	pub entity_type: String,
	pub policy_entity: String,
	pub entity_id: String,
	pub transition: String,
	pub environment: String,
	pub requested_locale: Option<String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub missing_fields_by_locale: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateInput {
	pub entity_type: String,
	pub entity_id: String,
	/// Entity name policies are declared against
	pub policy_entity: String,
	pub transition: String,
	/// Target state
	pub state: String,
	pub environment: String,
	pub requested_locale: Option<String>,
}

#[derive(Clone)]
pub struct TranslationGate {
	policies: Arc<dyn PolicyResolver>,
	checker: Arc<dyn TranslationChecker>,
}

impl TranslationGate {
	pub fn new(policies: Arc<dyn PolicyResolver>, checker: Arc<dyn TranslationChecker>) -> Self {
		Self { policies, checker }
	}

	/// `MissingTranslations` when a required locale is not covered.
	pub async fn check(&self, ctx: &Context, input: &GateInput) -> WorkflowResult<()> {
		let query = PolicyQuery {
			entity: &input.policy_entity,
			transition: &input.transition,
			environment: &input.environment,
		};
		let Some(policy) = ctx.run(self.policies.resolve(&query)).await? else {
			return Ok(());
		};
		if policy.locales.is_empty() {
			return Ok(());
		}

		let coverage = CoverageQuery {
			entity_type: input.entity_type.clone(),
			entity_id: input.entity_id.clone(),
			locales: policy.locales.clone(),
			required_fields: policy.required_fields.clone(),
			strategy: policy.strategy,
			state: input.state.clone(),
			environment: input.environment.clone(),
		};
		let report = ctx.run(self.checker.check(&coverage)).await?;
		if report.is_complete() {
			return Ok(());
		}

		for locale in &report.missing_locales {
			metrics::record_blocked_transition(
				&input.policy_entity,
				locale,
				&input.transition,
				&input.environment,
			);
		}
		tracing::warn!(
			entity_type = %input.entity_type,
			entity_id = %input.entity_id,
			policy_entity = %input.policy_entity,
			transition = %input.transition,
			environment = %input.environment,
			missing_locales = ?report.missing_locales,
			"transition blocked by missing translations"
		);

		Err(WorkflowError::MissingTranslations(Box::new(
			MissingTranslations {
				missing_locales: report.missing_locales,
				entity_type: input.entity_type.clone(),
				policy_entity: input.policy_entity.clone(),
				entity_id: input.entity_id.clone(),
				transition: input.transition.clone(),
				environment: input.environment.clone(),
				requested_locale: input.requested_locale.clone(),
				missing_fields_by_locale: report.missing_fields_by_locale,
			},
		)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::translation::checker::InMemoryTranslationChecker;
	use crate::translation::policy::{PolicyRule, StaticPolicyResolver, TranslationPolicy};
	use reinhardt_backoffice_core::{BackofficeError, TextCode};
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn input() -> GateInput {
		GateInput {
			entity_type: "article".into(),
			entity_id: "a1".into(),
			policy_entity: "article".into(),
			transition: "publish".into(),
			state: "published".into(),
			environment: "default".into(),
			requested_locale: Some("en".into()),
		}
	}

	fn gate(checker: InMemoryTranslationChecker) -> TranslationGate {
		let policies = StaticPolicyResolver::new().with_rule(PolicyRule::new(
			"article",
			"publish",
			TranslationPolicy::new(["en", "es"]),
		));
		TranslationGate::new(Arc::new(policies), Arc::new(checker))
	}

	#[rstest]
	#[tokio::test]
	async fn test_complete_coverage_passes(input: GateInput) {
		// Arrange
		let checker = InMemoryTranslationChecker::new()
			.with_translation("article", "a1", "en", json!({}))
			.with_translation("article", "a1", "es", json!({}));

		// Act & Assert
		gate(checker).check(&Context::new(), &input).await.unwrap();
	}

	#[rstest]
	#[tokio::test]
	async fn test_unpoliced_transition_passes(mut input: GateInput) {
		// Arrange
		input.transition = "archive".into();

		// Act & Assert
		gate(InMemoryTranslationChecker::new())
			.check(&Context::new(), &input)
			.await
			.unwrap();
	}

	#[rstest]
	#[tokio::test]
	async fn test_missing_locale_error_metadata(input: GateInput) {
		// Arrange
		let checker = InMemoryTranslationChecker::new().with_translation("article", "a1", "en", json!({}));

		// Act
		let err = gate(checker).check(&Context::new(), &input).await.unwrap_err();

		// Assert
		let mapped = BackofficeError::from(err);
		assert_eq!(mapped.text_code(), TextCode::TranslationMissing);
		assert_eq!(mapped.status(), 400);
		assert_eq!(mapped.metadata_value("missing_locales"), Some(&json!(["es"])));
		assert_eq!(mapped.metadata_value("policy_entity"), Some(&json!("article")));
		assert_eq!(mapped.metadata_value("requested_locale"), Some(&json!("en")));
		assert_eq!(mapped.metadata_value("transition"), Some(&json!("publish")));
	}
}
