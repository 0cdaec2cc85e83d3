//! Translation requirements per entity and transition

use crate::error::{WorkflowError, WorkflowResult};
use async_trait::async_trait;
use reinhardt_backoffice_core::settings::{TranslationPolicySettings, TranslationSettings};
use reinhardt_backoffice_core::text::normalize_locale;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Transition wildcard in policy rules.
pub const ANY_TRANSITION: &str = "*";

/// How locale coverage is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStrategy {
	/// A translation exists for the locale
	#[default]
	Presence,
	/// The translation has a non-empty value for every required field
	RequiredFields,
}

impl FieldStrategy {
	pub fn as_str(&self) -> &'static str {
		match self {
			FieldStrategy::Presence => "presence",
			FieldStrategy::RequiredFields => "required_fields",
		}
	}
}

impl FromStr for FieldStrategy {
	type Err = WorkflowError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			"" | "presence" => Ok(FieldStrategy::Presence),
			"required_fields" => Ok(FieldStrategy::RequiredFields),
			other => Err(WorkflowError::invalid_definition(
				format!("unknown translation field strategy '{}'", other),
				"strategy",
				"expected 'presence' or 'required_fields'",
			)),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TranslationPolicy {
	/// Lowercased
	pub locales: Vec<String>,
	#[serde(default)]
	pub required_fields: Vec<String>,
	#[serde(default)]
	pub strategy: FieldStrategy,
}

impl TranslationPolicy {
	pub fn new<I, S>(locales: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut normalized: Vec<String> = Vec::new();
		for locale in locales {
			let locale = normalize_locale(locale.as_ref());
			if !locale.is_empty() && !normalized.contains(&locale) {
				normalized.push(locale);
			}
		}
		Self {
			locales: normalized,
			required_fields: Vec::new(),
			strategy: FieldStrategy::Presence,
		}
	}

	pub fn with_required_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.required_fields = fields.into_iter().map(Into::into).collect();
		self.strategy = FieldStrategy::RequiredFields;
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyQuery<'a> {
	pub entity: &'a str,
	pub transition: &'a str,
	pub environment: &'a str,
}

/// Supplies the translation requirements of a transition.
#[async_trait]
pub trait PolicyResolver: Send + Sync {
	/// `None` when the transition has no translation requirement.
	async fn resolve(&self, query: &PolicyQuery<'_>) -> WorkflowResult<Option<TranslationPolicy>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
	pub entity: String,
	pub transition: String,
	pub environment: Option<String>,
	pub policy: TranslationPolicy,
}

impl PolicyRule {
	pub fn new(entity: impl Into<String>, transition: impl Into<String>, policy: TranslationPolicy) -> Self {
		Self {
			entity: entity.into(),
			transition: transition.into(),
			environment: None,
			policy,
		}
	}

	pub fn in_environment(mut self, environment: impl Into<String>) -> Self {
		self.environment = Some(environment.into());
		self
	}

	/// Match score; higher is more specific, `None` when not applicable.
	fn score(&self, query: &PolicyQuery<'_>) -> Option<u8> {
		if !self.entity.eq_ignore_ascii_case(query.entity) {
			return None;
		}
		let transition = if self.transition == query.transition {
			1
		} else if self.transition == ANY_TRANSITION {
			0
		} else {
			return None;
		};
		let environment = match self.environment.as_deref() {
			None => 0,
			Some(env) if env == query.environment => 2,
			Some(_) => return None,
		};
		Some(environment + transition)
	}
}

/// Fixed rule table, usually built from settings.
///
/// The most specific matching rule wins: an environment match outranks an
/// exact transition match, which outranks the `*` wildcard.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyResolver {
	rules: Vec<PolicyRule>,
}

impl StaticPolicyResolver {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_rule(mut self, rule: PolicyRule) -> Self {
		self.rules.push(rule);
		self
	}

	pub fn from_settings(settings: &TranslationSettings) -> WorkflowResult<Self> {
		let mut resolver = Self::new();
		for rule in &settings.policies {
			resolver.rules.push(rule_from_settings(rule)?);
		}
		Ok(resolver)
	}

	pub fn rules(&self) -> &[PolicyRule] {
		&self.rules
	}

	pub fn lookup(&self, query: &PolicyQuery<'_>) -> Option<&TranslationPolicy> {
		self.rules
			.iter()
			.filter_map(|rule| rule.score(query).map(|score| (score, rule)))
			// First declared rule wins among equals.
			.fold(None::<(u8, &PolicyRule)>, |best, (score, rule)| match best {
				Some((best_score, _)) if best_score >= score => best,
				_ => Some((score, rule)),
			})
			.map(|(_, rule)| &rule.policy)
	}
}

fn rule_from_settings(settings: &TranslationPolicySettings) -> WorkflowResult<PolicyRule> {
	let strategy = settings
		.strategy
		.as_deref()
		.map(FieldStrategy::from_str)
		.transpose()?
		.unwrap_or(if settings.required_fields.is_empty() {
			FieldStrategy::Presence
		} else {
			FieldStrategy::RequiredFields
		});
	let mut policy = TranslationPolicy::new(&settings.locales);
	policy.required_fields = settings.required_fields.clone();
	policy.strategy = strategy;
	Ok(PolicyRule {
		entity: settings.entity.clone(),
		transition: settings.transition.clone(),
		environment: settings.environment.clone(),
		policy,
	})
}

#[async_trait]
impl PolicyResolver for StaticPolicyResolver {
	async fn resolve(&self, query: &PolicyQuery<'_>) -> WorkflowResult<Option<TranslationPolicy>> {
		Ok(self.lookup(query).cloned())
	}
}
