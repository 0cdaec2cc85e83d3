//! Translation coverage lookups

use crate::error::WorkflowResult;
use crate::translation::policy::FieldStrategy;
use async_trait::async_trait;
use parking_lot::RwLock;
use reinhardt_backoffice_core::text::normalize_locale;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// What the gate asks the content service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageQuery {
	pub entity_type: String,
	pub entity_id: String,
	pub locales: Vec<String>,
	#[serde(default)]
	pub required_fields: Vec<String>,
	#[serde(default)]
	pub strategy: FieldStrategy,
	/// Target state of the transition
	pub state: String,
	pub environment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
	pub missing_locales: Vec<String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub missing_fields_by_locale: BTreeMap<String, Vec<String>>,
}

impl CoverageReport {
	pub fn is_complete(&self) -> bool {
		self.missing_locales.is_empty()
	}
}

/// Translation coverage of pages and content entries.
#[async_trait]
pub trait TranslationChecker: Send + Sync {
	async fn check(&self, query: &CoverageQuery) -> WorkflowResult<CoverageReport>;
}

/// Translations keyed by `(entity_type, entity_id)`, then locale.
#[derive(Debug, Default)]
pub struct InMemoryTranslationChecker {
	translations: RwLock<HashMap<(String, String), BTreeMap<String, Value>>>,
}

impl InMemoryTranslationChecker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records a translation; `fields` is the translated record body.
	pub fn add_translation(&self, entity_type: &str, entity_id: &str, locale: &str, fields: Value) {
		self.translations
			.write()
			.entry((entity_type.to_string(), entity_id.to_string()))
			.or_default()
			.insert(normalize_locale(locale), fields);
	}

	pub fn with_translation(self, entity_type: &str, entity_id: &str, locale: &str, fields: Value) -> Self {
		self.add_translation(entity_type, entity_id, locale, fields);
		self
	}
}

fn is_blank(value: Option<&Value>) -> bool {
	match value {
		None | Some(Value::Null) => true,
		Some(Value::String(s)) => s.trim().is_empty(),
		Some(Value::Array(items)) => items.is_empty(),
		Some(Value::Object(map)) => map.is_empty(),
		Some(_) => false,
	}
}

#[async_trait]
impl TranslationChecker for InMemoryTranslationChecker {
	async fn check(&self, query: &CoverageQuery) -> WorkflowResult<CoverageReport> {
		let translations = self.translations.read();
		let available = translations.get(&(query.entity_type.clone(), query.entity_id.clone()));

		let mut report = CoverageReport::default();
		for locale in &query.locales {
			let locale = normalize_locale(locale);
			let Some(fields) = available.and_then(|t| t.get(&locale)) else {
				report.missing_locales.push(locale);
				continue;
			};
			if query.strategy == FieldStrategy::RequiredFields {
				let missing: Vec<String> = query
					.required_fields
					.iter()
					.filter(|field| is_blank(fields.pointer(&format!("/{}", field.replace('.', "/")))))
					.cloned()
					.collect();
				if !missing.is_empty() {
					report.missing_fields_by_locale.insert(locale.clone(), missing);
					report.missing_locales.push(locale);
				}
			}
		}
		Ok(report)
	}
}
