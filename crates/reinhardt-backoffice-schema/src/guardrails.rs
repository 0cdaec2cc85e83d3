//! Schema guardrails
//!
//! Bounds applied to a content-type schema before it reaches the form
//! generator: serialized size, total field count, nesting depth, reserved
//! field names, and UI-overlay references.
//!
//! The field tree is walked through `properties` and array `items`. The
//! variants of `oneOf`/`anyOf`/`allOf` and `$defs` describe embedded blocks,
//! whose `_type` discriminators are expected, so they are not part of the tree.

use crate::error::{SchemaError, SchemaResult};
use reinhardt_backoffice_core::settings::GuardrailSettings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Default maximum schema size: 64 KiB
const DEFAULT_MAX_SCHEMA_SIZE: usize = 64 * 1024;
/// Default maximum UI-schema size: 32 KiB
const DEFAULT_MAX_UI_SCHEMA_SIZE: usize = 32 * 1024;
/// Default maximum number of leaf fields
const DEFAULT_MAX_FIELDS: usize = 200;
/// Default maximum object/array nesting
const DEFAULT_MAX_DEPTH: usize = 12;

/// Field names owned by the platform.
pub const RESERVED_FIELD_NAMES: [&str; 4] = ["_schema", "_type", "_id", "_version"];

/// Error key used for reserved-name violations.
pub const RESERVED_FIELDS_KEY: &str = "reserved_fields";

/// Schema limits
///
/// # Examples
///
/// ```
/// use reinhardt_backoffice_schema::guardrails::SchemaLimits;
///
/// let limits = SchemaLimits::default().with_max_depth(4);
/// assert_eq!(limits.max_depth(), Some(4));
/// assert!(limits.check_depth(5).is_err());
/// assert!(SchemaLimits::unlimited().check_field_count(10_000).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLimits {
	max_schema_size: Option<usize>,
	max_ui_schema_size: Option<usize>,
	max_fields: Option<usize>,
	max_depth: Option<usize>,
}

impl Default for SchemaLimits {
	fn default() -> Self {
		Self {
			max_schema_size: Some(DEFAULT_MAX_SCHEMA_SIZE),
			max_ui_schema_size: Some(DEFAULT_MAX_UI_SCHEMA_SIZE),
			max_fields: Some(DEFAULT_MAX_FIELDS),
			max_depth: Some(DEFAULT_MAX_DEPTH),
		}
	}
}

impl SchemaLimits {
	/// No limits at all. Reserved names are still enforced by the guardrails.
	pub fn unlimited() -> Self {
		Self {
			max_schema_size: None,
			max_ui_schema_size: None,
			max_fields: None,
			max_depth: None,
		}
	}

	pub fn from_settings(settings: &GuardrailSettings) -> Self {
		Self {
			max_schema_size: Some(settings.schema_max_size_bytes),
			max_ui_schema_size: Some(settings.ui_schema_max_size_bytes),
			max_fields: Some(settings.max_fields),
			max_depth: Some(settings.max_depth),
		}
	}

	// Builder methods

	pub fn with_max_schema_size(mut self, size: usize) -> Self {
		self.max_schema_size = Some(size);
		self
	}

	pub fn with_max_ui_schema_size(mut self, size: usize) -> Self {
		self.max_ui_schema_size = Some(size);
		self
	}

	pub fn with_max_fields(mut self, count: usize) -> Self {
		self.max_fields = Some(count);
		self
	}

	pub fn with_max_depth(mut self, depth: usize) -> Self {
		self.max_depth = Some(depth);
		self
	}

	// Getters

	pub fn max_schema_size(&self) -> Option<usize> {
		self.max_schema_size
	}

	pub fn max_ui_schema_size(&self) -> Option<usize> {
		self.max_ui_schema_size
	}

	pub fn max_fields(&self) -> Option<usize> {
		self.max_fields
	}

	pub fn max_depth(&self) -> Option<usize> {
		self.max_depth
	}

	// Check methods

	pub fn check_schema_size(&self, actual: usize) -> Result<(), LimitExceeded> {
		if let Some(limit) = self.max_schema_size
			&& actual > limit
		{
			return Err(LimitExceeded::SchemaTooLarge { limit, actual });
		}
		Ok(())
	}

	pub fn check_ui_schema_size(&self, actual: usize) -> Result<(), LimitExceeded> {
		if let Some(limit) = self.max_ui_schema_size
			&& actual > limit
		{
			return Err(LimitExceeded::UiSchemaTooLarge { limit, actual });
		}
		Ok(())
	}

	pub fn check_field_count(&self, actual: usize) -> Result<(), LimitExceeded> {
		if let Some(limit) = self.max_fields
			&& actual > limit
		{
			return Err(LimitExceeded::TooManyFields { limit, actual });
		}
		Ok(())
	}

	pub fn check_depth(&self, actual: usize) -> Result<(), LimitExceeded> {
		if let Some(limit) = self.max_depth
			&& actual > limit
		{
			return Err(LimitExceeded::TooDeep { limit, actual });
		}
		Ok(())
	}
}

/// Error type for schema limit violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitExceeded {
	#[error("schema too large: {actual} bytes exceeds limit of {limit} bytes")]
	SchemaTooLarge { limit: usize, actual: usize },

	#[error("ui schema too large: {actual} bytes exceeds limit of {limit} bytes")]
	UiSchemaTooLarge { limit: usize, actual: usize },

	#[error("too many fields: {actual} exceeds limit of {limit}")]
	TooManyFields { limit: usize, actual: usize },

	#[error("schema too deep: {actual} levels exceeds limit of {limit}")]
	TooDeep { limit: usize, actual: usize },
}

impl LimitExceeded {
	/// Key under which the violation is reported.
	pub fn field_key(&self) -> &'static str {
		match self {
			LimitExceeded::SchemaTooLarge { .. } => "schema",
			LimitExceeded::UiSchemaTooLarge { .. } => "ui_schema",
			LimitExceeded::TooManyFields { .. } => "fields",
			LimitExceeded::TooDeep { .. } => "depth",
		}
	}
}

/// Result of `validate_schema`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaValidation {
	pub valid: bool,
	pub field_count: usize,
	pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaGuardrails {
	limits: SchemaLimits,
}

impl SchemaGuardrails {
	pub fn new(limits: SchemaLimits) -> Self {
		Self { limits }
	}

	pub fn from_settings(settings: &GuardrailSettings) -> Self {
		Self::new(SchemaLimits::from_settings(settings))
	}

	pub fn limits(&self) -> &SchemaLimits {
		&self.limits
	}

	/// Runs every check and collects the violations.
	pub fn check(&self, schema: &Value, ui_schema: Option<&Value>) -> SchemaValidation {
		let mut errors = BTreeMap::new();

		let Some(root) = schema.as_object() else {
			errors.insert(
				"schema".to_string(),
				"schema must be a JSON object".to_string(),
			);
			return SchemaValidation {
				valid: false,
				field_count: 0,
				errors,
			};
		};

		let size = serialized_size(schema);
		if let Err(e) = self.limits.check_schema_size(size) {
			errors.insert(e.field_key().to_string(), e.to_string());
		}

		let field_count = count_leaf_fields(root);
		if let Err(e) = self.limits.check_field_count(field_count) {
			errors.insert(e.field_key().to_string(), e.to_string());
		}

		let depth = schema_depth(schema);
		if let Err(e) = self.limits.check_depth(depth) {
			errors.insert(e.field_key().to_string(), e.to_string());
		}

		let reserved = reserved_field_paths(root);
		if !reserved.is_empty() {
			errors.insert(
				RESERVED_FIELDS_KEY.to_string(),
				format!(
					"reserved field names are not allowed: {}",
					reserved.into_iter().collect::<Vec<_>>().join(", ")
				),
			);
		}

		if let Some(ui) = ui_schema {
			if let Err(e) = self.limits.check_ui_schema_size(serialized_size(ui)) {
				errors.insert(e.field_key().to_string(), e.to_string());
			}
			errors.extend(validate_ui_schema(root, ui));
		}

		SchemaValidation {
			valid: errors.is_empty(),
			field_count,
			errors,
		}
	}

	/// Like [`check`](Self::check) but fails with a validation error when
	/// any check failed.
	pub fn validate_schema(
		&self,
		schema: &Value,
		ui_schema: Option<&Value>,
	) -> SchemaResult<SchemaValidation> {
		let report = self.check(schema, ui_schema);
		if report.valid {
			return Ok(report);
		}
		tracing::debug!(errors = ?report.errors, "schema rejected by guardrails");
		Err(SchemaError::Invalid {
			message: "schema failed guardrail validation".to_string(),
			fields: report.errors,
		})
	}
}

fn serialized_size(value: &Value) -> usize {
	serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(usize::MAX)
}

fn properties_of(node: &Map<String, Value>) -> Option<&Map<String, Value>> {
	node.get("properties").and_then(Value::as_object)
}

fn items_of(node: &Map<String, Value>) -> Option<&Map<String, Value>> {
	node.get("items").and_then(Value::as_object)
}

/// Number of leaf fields reachable through `properties` and `items`.
pub fn count_leaf_fields(node: &Map<String, Value>) -> usize {
	let mut count = 0;
	if let Some(properties) = properties_of(node) {
		for child in properties.values() {
			match child.as_object() {
				Some(child) if has_nested_fields(child) => count += count_leaf_fields(child),
				_ => count += 1,
			}
		}
	}
	if let Some(items) = items_of(node)
		&& properties_of(items).is_some()
	{
		count += count_leaf_fields(items);
	}
	count
}

fn has_nested_fields(node: &Map<String, Value>) -> bool {
	properties_of(node).is_some_and(|p| !p.is_empty())
		|| items_of(node).and_then(properties_of).is_some_and(|p| !p.is_empty())
}

/// Object/array nesting depth; a flat object schema has depth 1.
pub fn schema_depth(node: &Value) -> usize {
	let Some(map) = node.as_object() else {
		return 0;
	};
	let is_container = matches!(
		map.get("type").and_then(Value::as_str),
		Some("object") | Some("array")
	) || map.contains_key("properties")
		|| map.contains_key("items");

	let mut deepest = 0;
	if let Some(properties) = properties_of(map) {
		for child in properties.values() {
			deepest = deepest.max(schema_depth(child));
		}
	}
	if let Some(items) = map.get("items") {
		deepest = deepest.max(schema_depth(items));
	}
	deepest + usize::from(is_container)
}

/// Dotted paths of every reserved field in the tree.
pub fn reserved_field_paths(root: &Map<String, Value>) -> BTreeSet<String> {
	let mut found = BTreeSet::new();
	collect_reserved(root, "", &mut found);
	found
}

fn collect_reserved(node: &Map<String, Value>, prefix: &str, found: &mut BTreeSet<String>) {
	if let Some(properties) = properties_of(node) {
		for (name, child) in properties {
			let path = join_path(prefix, name);
			if RESERVED_FIELD_NAMES.contains(&name.as_str()) {
				found.insert(path.clone());
			}
			if let Some(child) = child.as_object() {
				collect_reserved(child, &path, found);
			}
		}
	}
	if let Some(items) = items_of(node) {
		collect_reserved(items, prefix, found);
	}
}

fn join_path(prefix: &str, name: &str) -> String {
	if prefix.is_empty() {
		name.to_string()
	} else {
		format!("{}.{}", prefix, name)
	}
}

/// Every dotted field path declared by the schema. Array items are transparent.
pub fn field_paths(root: &Map<String, Value>) -> BTreeSet<String> {
	let mut paths = BTreeSet::new();
	collect_paths(root, "", &mut paths);
	paths
}

fn collect_paths(node: &Map<String, Value>, prefix: &str, paths: &mut BTreeSet<String>) {
	if let Some(properties) = properties_of(node) {
		for (name, child) in properties {
			let path = join_path(prefix, name);
			paths.insert(path.clone());
			if let Some(child) = child.as_object() {
				collect_paths(child, &path, paths);
			}
		}
	}
	if let Some(items) = items_of(node) {
		collect_paths(items, prefix, paths);
	}
}

/// UI-overlay keys are field paths; keys starting with `$` or `ui:` are
/// metadata. `ui:order` entries must reference fields as well.
fn validate_ui_schema(root: &Map<String, Value>, ui: &Value) -> BTreeMap<String, String> {
	let mut errors = BTreeMap::new();
	let Some(ui) = ui.as_object() else {
		errors.insert(
			"ui_schema".to_string(),
			"ui schema must be a JSON object".to_string(),
		);
		return errors;
	};

	let known = field_paths(root);
	for key in ui.keys() {
		if key.starts_with('$') || key.starts_with("ui:") {
			continue;
		}
		if !known.contains(key) {
			errors.insert(
				format!("ui_schema.{}", key),
				format!("unknown field reference '{}'", key),
			);
		}
	}

	if let Some(order) = ui.get("ui:order").and_then(Value::as_array) {
		for entry in order.iter().filter_map(Value::as_str) {
			if entry != "*" && !known.contains(entry) {
				errors.insert(
					format!("ui_schema.ui:order.{}", entry),
					format!("unknown field reference '{}'", entry),
				);
			}
		}
	}
	errors
}
