//! Block definitions
//!
//! Reusable content fragments referenced from content-type schemas through
//! the block library picker. Definitions are scoped per environment; an
//! environment without its own definitions falls back to the default one.

use crate::error::{SchemaError, SchemaResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reinhardt_backoffice_core::text::{alias_variants, humanize_field_name, is_valid_slug};
use reinhardt_backoffice_core::{Context, DEFAULT_ENVIRONMENT};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Discriminator property carried by every block instance.
pub const BLOCK_DISCRIMINATOR: &str = "_type";

/// Names stripped from `schema.required` when deriving required fields.
pub const BLOCK_RESERVED_FIELDS: [&str; 2] = ["_type", "_schema"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
	Active,
	#[default]
	Draft,
	Inactive,
}

/// `name@vX.Y.Z`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaVersion {
	pub name: String,
	pub major: u64,
	pub minor: u64,
	pub patch: u64,
}

impl SchemaVersion {
	pub fn new(name: impl Into<String>, major: u64, minor: u64, patch: u64) -> Self {
		Self {
			name: name.into(),
			major,
			minor,
			patch,
		}
	}

	/// Parses `name@vX.Y.Z`; a missing minor or patch counts as zero.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_backoffice_schema::blocks::SchemaVersion;
	///
	/// let version = SchemaVersion::parse("hero@v1.2.3").unwrap();
	/// assert_eq!((version.major, version.minor, version.patch), (1, 2, 3));
	/// assert_eq!(version.to_string(), "hero@v1.2.3");
	/// assert!(SchemaVersion::parse("hero-1.2").is_err());
	/// ```
	pub fn parse(value: &str) -> SchemaResult<Self> {
		let invalid = || {
			SchemaError::invalid(
				format!("invalid schema version '{}'", value),
				"schema_version",
				"expected name@vX.Y.Z",
			)
		};
		let (name, version) = value.split_once('@').ok_or_else(invalid)?;
		let version = version.strip_prefix('v').ok_or_else(invalid)?;
		if name.is_empty() || version.is_empty() {
			return Err(invalid());
		}
		let mut parts = version.split('.');
		let mut next = || -> SchemaResult<u64> {
			match parts.next() {
				Some(part) => part.parse::<u64>().map_err(|_| invalid()),
				None => Ok(0),
			}
		};
		let major = next()?;
		let minor = next()?;
		let patch = next()?;
		if parts.next().is_some() {
			return Err(invalid());
		}
		Ok(Self::new(name, major, minor, patch))
	}
}

impl FromStr for SchemaVersion {
	type Err = SchemaError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl fmt::Display for SchemaVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}@v{}.{}.{}",
			self.name, self.major, self.minor, self.patch
		)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDefinition {
	pub id: String,
	pub slug: String,
	pub name: String,
	#[serde(rename = "type")]
	pub block_type: String,
	pub schema: Value,
	#[serde(default)]
	pub ui_schema: Option<Value>,
	#[serde(default)]
	pub schema_version: Option<String>,
	#[serde(default)]
	pub status: BlockStatus,
	#[serde(default)]
	pub category: Option<String>,
	#[serde(default = "default_environment")]
	pub environment: String,
	#[serde(default = "chrono::Utc::now")]
	pub updated_at: DateTime<Utc>,
}

fn default_environment() -> String {
	DEFAULT_ENVIRONMENT.to_string()
}

impl BlockDefinition {
	pub fn new(slug: impl Into<String>, block_type: impl Into<String>, schema: Value) -> Self {
		let slug = slug.into();
		Self {
			id: uuid::Uuid::new_v4().to_string(),
			name: humanize_field_name(&slug),
			slug,
			block_type: block_type.into(),
			schema,
			ui_schema: None,
			schema_version: None,
			status: BlockStatus::Draft,
			category: None,
			environment: default_environment(),
			updated_at: Utc::now(),
		}
	}

	pub fn with_category(mut self, category: impl Into<String>) -> Self {
		self.category = Some(category.into());
		self
	}

	pub fn with_status(mut self, status: BlockStatus) -> Self {
		self.status = status;
		self
	}

	pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
		self.environment = environment.into();
		self
	}

	pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
		self.schema_version = Some(version.into());
		self
	}

	/// `schema.required` minus the block reserved names.
	pub fn required_fields(&self) -> Vec<String> {
		self.schema
			.get("required")
			.and_then(Value::as_array)
			.map(|required| {
				required
					.iter()
					.filter_map(Value::as_str)
					.filter(|name| !BLOCK_RESERVED_FIELDS.contains(name))
					.map(str::to_string)
					.collect()
			})
			.unwrap_or_default()
	}

	pub fn version(&self) -> SchemaResult<Option<SchemaVersion>> {
		self.schema_version
			.as_deref()
			.map(SchemaVersion::parse)
			.transpose()
	}

	pub fn validate(&self) -> SchemaResult<()> {
		let mut fields = BTreeMap::new();
		if !is_valid_slug(&self.slug) {
			fields.insert("slug".to_string(), "invalid slug".to_string());
		}
		if self.block_type.trim().is_empty() {
			fields.insert("type".to_string(), "block type is required".to_string());
		}
		if !self.schema.is_object() {
			fields.insert(
				"schema".to_string(),
				"schema must be a JSON object".to_string(),
			);
		}
		if let Err(err) = self.version() {
			fields.extend(err.fields());
		}
		if fields.is_empty() {
			Ok(())
		} else {
			Err(SchemaError::Invalid {
				message: format!("invalid block definition '{}'", self.slug),
				fields,
			})
		}
	}
}

/// Which `oneOf` shape the candidates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateShape {
	/// `oneOf` directly on the node
	Direct,
	/// `items.oneOf` on an array node
	Items,
}

/// One `oneOf` variant with the block type names it answers to.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockCandidate {
	/// Discriminator const and/or `$ref` leaf, primary first
	pub names: Vec<String>,
	pub schema: Value,
}

/// Candidate block types of a block-library node.
///
/// Both the direct-nested (`node.oneOf`) and the items-nested
/// (`node.items.oneOf`) shapes are accepted; when both are present the
/// direct-nested variants win. `$ref`s are resolved against `root` so the
/// referenced definition's discriminator is picked up too.
pub fn block_candidates_with_discriminator(
	node: &Value,
	root: &Value,
) -> Option<(CandidateShape, Vec<BlockCandidate>)> {
	let direct = node.get("oneOf").and_then(Value::as_array).filter(|v| !v.is_empty());
	let nested = node
		.get("items")
		.and_then(|items| items.get("oneOf"))
		.and_then(Value::as_array)
		.filter(|v| !v.is_empty());

	let (shape, variants) = match (direct, nested) {
		(Some(direct), _) => (CandidateShape::Direct, direct),
		(None, Some(nested)) => (CandidateShape::Items, nested),
		(None, None) => return None,
	};

	let candidates = variants
		.iter()
		.map(|variant| {
			let mut names = Vec::new();
			let mut schema = variant.clone();
			if let Some(reference) = variant.get("$ref").and_then(Value::as_str) {
				if let Some(leaf) = reference.rsplit('/').next().filter(|s| !s.is_empty()) {
					names.push(leaf.to_string());
				}
				if let Some(resolved) = resolve_ref(root, reference) {
					if let Some(name) = discriminator_const(resolved) {
						names.push(name);
					}
					schema = resolved.clone();
				}
			}
			if let Some(name) = discriminator_const(variant) {
				names.push(name);
			}
			names.dedup();
			BlockCandidate { names, schema }
		})
		.collect();
	Some((shape, candidates))
}

/// Union of candidate names, with `-`/`_` aliases.
pub fn allowed_block_names(candidates: &[BlockCandidate]) -> BTreeSet<String> {
	candidates
		.iter()
		.flat_map(|candidate| candidate.names.iter())
		.flat_map(|name| alias_variants(name))
		.collect()
}

fn discriminator_const(schema: &Value) -> Option<String> {
	schema
		.get("properties")?
		.get(BLOCK_DISCRIMINATOR)?
		.get("const")?
		.as_str()
		.map(str::to_string)
}

/// Resolves a local `#/a/b` reference.
fn resolve_ref<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
	let pointer = reference.strip_prefix('#')?;
	if pointer.is_empty() {
		return Some(root);
	}
	root.pointer(pointer)
}

/// Field type offered by the block editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTypeDescriptor {
	#[serde(rename = "type")]
	pub name: String,
	pub label: String,
	pub category: String,
	/// Schema snippet inserted when the type is picked
	pub schema: Value,
}

impl FieldTypeDescriptor {
	pub fn new(name: &str, category: &str, schema: Value) -> Self {
		Self {
			name: name.to_string(),
			label: humanize_field_name(name),
			category: category.to_string(),
			schema,
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct FieldTypeRegistry {
	types: Vec<FieldTypeDescriptor>,
}

impl FieldTypeRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registry with the stock field types.
	pub fn builtin() -> Self {
		let mut registry = Self::new();
		let stock = [
			FieldTypeDescriptor::new("text", "basic", json!({"type": "string"})),
			FieldTypeDescriptor::new(
				"textarea",
				"basic",
				json!({"type": "string", "x-formgen": {"widget": "textarea"}}),
			),
			FieldTypeDescriptor::new("number", "basic", json!({"type": "number"})),
			FieldTypeDescriptor::new("integer", "basic", json!({"type": "integer"})),
			FieldTypeDescriptor::new("boolean", "basic", json!({"type": "boolean"})),
			FieldTypeDescriptor::new("select", "choice", json!({"type": "string", "enum": []})),
			FieldTypeDescriptor::new(
				"multiselect",
				"choice",
				json!({"type": "array", "items": {"type": "string", "enum": []}}),
			),
			FieldTypeDescriptor::new("date", "temporal", json!({"type": "string", "format": "date"})),
			FieldTypeDescriptor::new(
				"datetime",
				"temporal",
				json!({"type": "string", "format": "date-time"}),
			),
			FieldTypeDescriptor::new("email", "basic", json!({"type": "string", "format": "email"})),
			FieldTypeDescriptor::new("url", "basic", json!({"type": "string", "format": "uri"})),
			FieldTypeDescriptor::new(
				"media",
				"media",
				json!({"type": "string", "x-formgen": {"widget": "media-picker"}}),
			),
			FieldTypeDescriptor::new("json", "structure", json!({"type": "object"})),
			FieldTypeDescriptor::new(
				"group",
				"structure",
				json!({"type": "object", "properties": {}}),
			),
			FieldTypeDescriptor::new(
				"blocks",
				"structure",
				json!({"type": "array", "x-formgen": {"widget": "block-library-picker"}}),
			),
		];
		for descriptor in stock {
			registry.types.push(descriptor);
		}
		registry
	}

	pub fn register(&mut self, descriptor: FieldTypeDescriptor) -> SchemaResult<()> {
		if self.types.iter().any(|t| t.name == descriptor.name) {
			return Err(SchemaError::Conflict(format!(
				"field type '{}' is already registered",
				descriptor.name
			)));
		}
		self.types.push(descriptor);
		Ok(())
	}

	pub fn types(&self) -> &[FieldTypeDescriptor] {
		&self.types
	}

	pub fn categories(&self) -> Vec<String> {
		self.types
			.iter()
			.map(|t| t.category.clone())
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect()
	}

	pub fn grouped(&self) -> BTreeMap<String, Vec<FieldTypeDescriptor>> {
		let mut grouped: BTreeMap<String, Vec<FieldTypeDescriptor>> = BTreeMap::new();
		for descriptor in &self.types {
			grouped
				.entry(descriptor.category.clone())
				.or_default()
				.push(descriptor.clone());
		}
		grouped
	}
}

/// Block definitions owned by the CMS content service.
#[async_trait]
pub trait BlockDefinitionService: Send + Sync {
	async fn list(&self, environment: &str) -> SchemaResult<Vec<BlockDefinition>>;

	async fn get(&self, environment: &str, slug: &str) -> SchemaResult<BlockDefinition>;

	async fn save(&self, definition: BlockDefinition) -> SchemaResult<BlockDefinition>;

	async fn delete(&self, environment: &str, slug: &str) -> SchemaResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryBlockDefinitionService {
	definitions: RwLock<HashMap<(String, String), BlockDefinition>>,
}

impl InMemoryBlockDefinitionService {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl BlockDefinitionService for InMemoryBlockDefinitionService {
	async fn list(&self, environment: &str) -> SchemaResult<Vec<BlockDefinition>> {
		let definitions = self.definitions.read();
		let mut listed: Vec<_> = definitions
			.values()
			.filter(|d| d.environment == environment)
			.cloned()
			.collect();
		listed.sort_by(|a, b| a.slug.cmp(&b.slug));
		Ok(listed)
	}

	async fn get(&self, environment: &str, slug: &str) -> SchemaResult<BlockDefinition> {
		self.definitions
			.read()
			.get(&(environment.to_string(), slug.to_string()))
			.cloned()
			.ok_or_else(|| SchemaError::BlockNotFound(slug.to_string()))
	}

	async fn save(&self, mut definition: BlockDefinition) -> SchemaResult<BlockDefinition> {
		definition.validate()?;
		definition.updated_at = Utc::now();
		let key = (definition.environment.clone(), definition.slug.clone());
		self.definitions.write().insert(key, definition.clone());
		Ok(definition)
	}

	async fn delete(&self, environment: &str, slug: &str) -> SchemaResult<()> {
		self.definitions
			.write()
			.remove(&(environment.to_string(), slug.to_string()))
			.map(|_| ())
			.ok_or_else(|| SchemaError::BlockNotFound(slug.to_string()))
	}
}

/// `GET block_definitions_meta/field_types` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTypesMeta {
	pub categories: Vec<String>,
	pub field_types: BTreeMap<String, Vec<FieldTypeDescriptor>>,
}

/// `GET block_definitions_meta/diagnostics` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDiagnostics {
	pub requested_environment: String,
	/// Environment whose definitions are in effect
	pub effective_environment: String,
	pub default_environment: String,
	pub effective_count: usize,
	pub default_count: usize,
	/// Slugs defined in both environments
	pub overridden: Vec<String>,
	/// Slugs only in the requested environment
	pub environment_only: Vec<String>,
	/// Slugs only in the default environment
	pub default_only: Vec<String>,
}

/// Read-side helpers behind the `block_definitions_meta` endpoints.
#[derive(Clone)]
pub struct BlockDefinitionMeta {
	service: Arc<dyn BlockDefinitionService>,
	field_types: FieldTypeRegistry,
	default_environment: String,
}

impl BlockDefinitionMeta {
	pub fn new(service: Arc<dyn BlockDefinitionService>) -> Self {
		Self {
			service,
			field_types: FieldTypeRegistry::builtin(),
			default_environment: DEFAULT_ENVIRONMENT.to_string(),
		}
	}

	pub fn with_field_types(mut self, registry: FieldTypeRegistry) -> Self {
		self.field_types = registry;
		self
	}

	pub fn with_default_environment(mut self, environment: impl Into<String>) -> Self {
		self.default_environment = environment.into();
		self
	}

	pub fn service(&self) -> &Arc<dyn BlockDefinitionService> {
		&self.service
	}

	/// Environment used for `requested`: itself when it has definitions,
	/// otherwise the default environment.
	pub async fn effective_environment(&self, ctx: &Context) -> SchemaResult<String> {
		let requested = ctx.environment();
		let own = ctx.run(self.service.list(requested)).await?;
		if own.is_empty() {
			Ok(self.default_environment.clone())
		} else {
			Ok(requested.to_string())
		}
	}

	/// Effective definitions for the request environment.
	pub async fn effective_definitions(&self, ctx: &Context) -> SchemaResult<Vec<BlockDefinition>> {
		let environment = self.effective_environment(ctx).await?;
		ctx.run(self.service.list(&environment)).await
	}

	/// Distinct categories of the effective definitions, sorted.
	pub async fn categories(&self, ctx: &Context) -> SchemaResult<Vec<String>> {
		let definitions = self.effective_definitions(ctx).await?;
		Ok(definitions
			.into_iter()
			.filter_map(|d| d.category)
			.filter(|c| !c.trim().is_empty())
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect())
	}

	pub fn field_types(&self) -> FieldTypesMeta {
		FieldTypesMeta {
			categories: self.field_types.categories(),
			field_types: self.field_types.grouped(),
		}
	}

	pub async fn diagnostics(&self, ctx: &Context) -> SchemaResult<BlockDiagnostics> {
		let requested = ctx.environment().to_string();
		let effective_environment = self.effective_environment(ctx).await?;
		let own: BTreeSet<String> = ctx
			.run(self.service.list(&requested))
			.await?
			.into_iter()
			.map(|d| d.slug)
			.collect();
		let defaults: BTreeSet<String> = ctx
			.run(self.service.list(&self.default_environment))
			.await?
			.into_iter()
			.map(|d| d.slug)
			.collect();
		let effective_count = if effective_environment == requested {
			own.len()
		} else {
			defaults.len()
		};

		Ok(BlockDiagnostics {
			requested_environment: requested,
			effective_environment,
			default_environment: self.default_environment.clone(),
			effective_count,
			default_count: defaults.len(),
			overridden: own.intersection(&defaults).cloned().collect(),
			environment_only: own.difference(&defaults).cloned().collect(),
			default_only: defaults.difference(&own).cloned().collect(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};

	#[fixture]
	fn service() -> Arc<InMemoryBlockDefinitionService> {
		Arc::new(InMemoryBlockDefinitionService::new())
	}

	#[rstest]
	#[case("hero@v1.2.3", (1, 2, 3))]
	#[case("hero@v2", (2, 0, 0))]
	#[case("rich_text@v0.1", (0, 1, 0))]
	fn test_schema_version_parse(#[case] raw: &str, #[case] expected: (u64, u64, u64)) {
		// Act
		let version: SchemaVersion = raw.parse().unwrap();

		// Assert
		assert_eq!((version.major, version.minor, version.patch), expected);
	}

	#[rstest]
	#[case("hero")]
	#[case("@v1.0.0")]
	#[case("hero@1.0.0")]
	#[case("hero@v1.x")]
	#[case("hero@v1.2.3.4")]
	fn test_schema_version_rejects(#[case] raw: &str) {
		assert!(SchemaVersion::parse(raw).is_err());
	}

	#[rstest]
	fn test_required_fields_strip_reserved_names() {
		// Arrange
		let definition = BlockDefinition::new(
			"hero",
			"hero",
			json!({"type": "object", "required": ["_type", "headline", "_schema", "image"]}),
		);

		// Act
		let required = definition.required_fields();

		// Assert
		assert_eq!(required, vec!["headline".to_string(), "image".to_string()]);
	}

	#[rstest]
	fn test_candidates_prefer_direct_nested() {
		// Arrange
		let node = json!({
			"oneOf": [{"properties": {"_type": {"const": "quote"}}}],
			"items": {"oneOf": [{"properties": {"_type": {"const": "gallery"}}}]}
		});

		// Act
		let (shape, candidates) = block_candidates_with_discriminator(&node, &node).unwrap();

		// Assert
		assert_eq!(shape, CandidateShape::Direct);
		assert_eq!(candidates.len(), 1);
		assert_eq!(candidates[0].names, vec!["quote".to_string()]);
	}

	#[rstest]
	fn test_candidates_resolve_refs() {
		// Arrange
		let root = json!({
			"defs": {"hero-block": {"properties": {"_type": {"const": "hero_section"}}}}
		});
		let node = json!({"type": "array", "items": {"oneOf": [{"$ref": "#/defs/hero-block"}]}});

		// Act
		let (shape, candidates) = block_candidates_with_discriminator(&node, &root).unwrap();
		let allowed = allowed_block_names(&candidates);

		// Assert
		assert_eq!(shape, CandidateShape::Items);
		assert_eq!(
			candidates[0].names,
			vec!["hero-block".to_string(), "hero_section".to_string()]
		);
		for name in ["hero-block", "hero_block", "hero_section", "hero-section"] {
			assert!(allowed.contains(name), "missing {}", name);
		}
	}

	#[rstest]
	fn test_candidates_absent() {
		assert!(block_candidates_with_discriminator(&json!({"type": "array"}), &json!({})).is_none());
	}

	#[rstest]
	fn test_field_type_registry_rejects_duplicates() {
		// Arrange
		let mut registry = FieldTypeRegistry::builtin();

		// Act
		let result = registry.register(FieldTypeDescriptor::new("text", "basic", json!({})));

		// Assert
		assert!(matches!(result, Err(SchemaError::Conflict(_))));
	}

	#[rstest]
	#[tokio::test]
	async fn test_categories_are_distinct_and_sorted(service: Arc<InMemoryBlockDefinitionService>) {
		// Arrange
		for (slug, category) in [("hero", "layout"), ("quote", "text"), ("banner", "layout")] {
			service
				.save(BlockDefinition::new(slug, slug, json!({"type": "object"})).with_category(category))
				.await
				.unwrap();
		}
		let meta = BlockDefinitionMeta::new(service.clone());

		// Act
		let categories = meta.categories(&Context::new()).await.unwrap();

		// Assert
		assert_eq!(categories, vec!["layout".to_string(), "text".to_string()]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_diagnostics_fall_back_to_default(service: Arc<InMemoryBlockDefinitionService>) {
		// Arrange
		service
			.save(BlockDefinition::new("hero", "hero", json!({"type": "object"})))
			.await
			.unwrap();
		let meta = BlockDefinitionMeta::new(service.clone());
		let ctx = Context::new().with_environment("staging");

		// Act
		let diagnostics = meta.diagnostics(&ctx).await.unwrap();

		// Assert
		assert_eq!(diagnostics.effective_environment, DEFAULT_ENVIRONMENT);
		assert_eq!(diagnostics.effective_count, 1);
		assert_eq!(diagnostics.default_only, vec!["hero".to_string()]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_diagnostics_with_environment_overrides(service: Arc<InMemoryBlockDefinitionService>) {
		// Arrange
		for (slug, env) in [("hero", "default"), ("quote", "default"), ("hero", "staging"), ("promo", "staging")] {
			service
				.save(BlockDefinition::new(slug, slug, json!({"type": "object"})).with_environment(env))
				.await
				.unwrap();
		}
		let meta = BlockDefinitionMeta::new(service.clone());
		let ctx = Context::new().with_environment("staging");

		// Act
		let diagnostics = meta.diagnostics(&ctx).await.unwrap();

		// Assert
		assert_eq!(diagnostics.effective_environment, "staging");
		assert_eq!(diagnostics.effective_count, 2);
		assert_eq!(diagnostics.overridden, vec!["hero".to_string()]);
		assert_eq!(diagnostics.environment_only, vec!["promo".to_string()]);
		assert_eq!(diagnostics.default_only, vec!["quote".to_string()]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_save_rejects_bad_version(service: Arc<InMemoryBlockDefinitionService>) {
		// Arrange
		let definition = BlockDefinition::new("hero", "hero", json!({"type": "object"}))
			.with_schema_version("hero-one");

		// Act
		let err = service.save(definition).await.unwrap_err();

		// Assert
		assert!(err.fields().contains_key("schema_version"));
	}
}
