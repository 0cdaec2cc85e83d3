//! Schema normalization
//!
//! Turns an authored content-type schema into what the form generator
//! accepts. The input is never mutated; every output tree is a deep clone.

use crate::blocks::{CandidateShape, allowed_block_names, block_candidates_with_discriminator};
use crate::error::{SchemaError, SchemaResult};
use crate::formgen::{BLOCK_LIBRARY_WIDGET, HINT_KEYS, widget_hint};
use async_trait::async_trait;
use reinhardt_backoffice_core::Context;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

/// Top-level keywords the generator does not understand.
pub const STRIPPED_TOP_LEVEL_KEYS: [&str; 2] = ["additionalProperties", "metadata"];

/// `$schema` marker placed on UI overlays.
pub const UI_OVERLAY_MARKER: &str = "x-ui-overlay/v1";

/// Maps content-type slugs to registered form ids.
#[async_trait]
pub trait FormDiscovery: Send + Sync {
	async fn discover(&self, slug: &str) -> SchemaResult<Option<String>>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticFormDiscovery {
	forms: HashMap<String, String>,
}

impl StaticFormDiscovery {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_form(mut self, slug: impl Into<String>, form_id: impl Into<String>) -> Self {
		self.forms.insert(slug.into(), form_id.into());
		self
	}
}

#[async_trait]
impl FormDiscovery for StaticFormDiscovery {
	async fn discover(&self, slug: &str) -> SchemaResult<Option<String>> {
		Ok(self.forms.get(slug).cloned())
	}
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
	pub slug: Option<String>,
	pub form_id: Option<String>,
	pub ui_schema: Option<Value>,
}

impl NormalizeOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
		self.slug = Some(slug.into());
		self
	}

	pub fn with_form_id(mut self, form_id: impl Into<String>) -> Self {
		self.form_id = Some(form_id.into());
		self
	}

	pub fn with_ui_schema(mut self, ui_schema: Value) -> Self {
		self.ui_schema = Some(ui_schema);
		self
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSchema {
	pub form_id: String,
	pub schema: Value,
	pub ui_schema: Option<Value>,
	/// Dotted paths of the rewritten block library fields
	pub block_fields: Vec<String>,
}

#[derive(Clone, Default)]
pub struct SchemaNormalizer {
	discovery: Option<Arc<dyn FormDiscovery>>,
}

impl std::fmt::Debug for SchemaNormalizer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SchemaNormalizer")
			.field("discovery", &self.discovery.is_some())
			.finish()
	}
}

impl SchemaNormalizer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_discovery(mut self, discovery: Arc<dyn FormDiscovery>) -> Self {
		self.discovery = Some(discovery);
		self
	}

	pub async fn normalize(
		&self,
		ctx: &Context,
		schema: &Value,
		opts: &NormalizeOptions,
	) -> SchemaResult<NormalizedSchema> {
		let (schema, block_fields) = normalize_schema(schema)?;
		let form_id = self.resolve_form_id(ctx, opts).await?;
		let ui_schema = opts.ui_schema.as_ref().map(overlay_ui_schema).transpose()?;
		Ok(NormalizedSchema {
			form_id,
			schema,
			ui_schema,
			block_fields,
		})
	}

	/// `opts.form_id`, else discovery, else `<slug>.edit`.
	pub async fn resolve_form_id(&self, ctx: &Context, opts: &NormalizeOptions) -> SchemaResult<String> {
		if let Some(form_id) = opts.form_id.as_deref().map(str::trim)
			&& !form_id.is_empty()
		{
			return Ok(form_id.to_string());
		}
		let slug = opts
			.slug
			.as_deref()
			.map(str::trim)
			.filter(|s| !s.is_empty())
			.unwrap_or("content_type");
		if let Some(discovery) = &self.discovery
			&& let Some(found) = ctx.run(discovery.discover(slug)).await?
		{
			return Ok(found);
		}
		Ok(format!("{}.edit", slug))
	}
}

/// Pure part of normalization: strips unsupported keys and rewrites block
/// library nodes.
pub fn normalize_schema(schema: &Value) -> SchemaResult<(Value, Vec<String>)> {
	if !schema.is_object() {
		return Err(SchemaError::invalid(
			"schema must be a JSON object",
			"schema",
			"expected an object",
		));
	}
	let mut normalized = schema.clone();
	if let Some(root) = normalized.as_object_mut() {
		for key in STRIPPED_TOP_LEVEL_KEYS {
			root.remove(key);
		}
	}
	let mut block_fields = Vec::new();
	rewrite_node(&mut normalized, schema, "", &mut block_fields);
	Ok((normalized, block_fields))
}

/// Deep clone with the overlay marker set.
pub fn overlay_ui_schema(ui_schema: &Value) -> SchemaResult<Value> {
	let Some(map) = ui_schema.as_object() else {
		return Err(SchemaError::invalid(
			"ui schema must be a JSON object",
			"ui_schema",
			"expected an object",
		));
	};
	let mut overlay = map.clone();
	overlay.insert("$schema".to_string(), Value::from(UI_OVERLAY_MARKER));
	Ok(Value::Object(overlay))
}

fn is_block_library(node: &Value) -> bool {
	widget_hint(node) == Some(BLOCK_LIBRARY_WIDGET)
}

fn rewrite_node(node: &mut Value, root: &Value, path: &str, block_fields: &mut Vec<String>) {
	if is_block_library(node)
		&& let Some((shape, candidates)) = block_candidates_with_discriminator(node, root)
	{
		let allowed: Vec<Value> = allowed_block_names(&candidates)
			.into_iter()
			.map(Value::from)
			.collect();
		rewrite_block_library(node, shape, allowed);
		block_fields.push(if path.is_empty() {
			"$root".to_string()
		} else {
			path.to_string()
		});
		return;
	}

	let Some(map) = node.as_object_mut() else {
		return;
	};
	if let Some(properties) = map.get_mut("properties").and_then(Value::as_object_mut) {
		for (name, child) in properties.iter_mut() {
			let child_path = if path.is_empty() {
				name.clone()
			} else {
				format!("{}.{}", path, name)
			};
			rewrite_node(child, root, &child_path, block_fields);
		}
	}
	if let Some(items) = map.get_mut("items") {
		rewrite_node(items, root, path, block_fields);
	}
}

fn rewrite_block_library(node: &mut Value, shape: CandidateShape, allowed: Vec<Value>) {
	let Some(map) = node.as_object_mut() else {
		return;
	};
	match shape {
		CandidateShape::Direct => {
			map.remove("oneOf");
			map.insert("type".to_string(), Value::from("array"));
			map.insert("items".to_string(), json!({"type": "object"}));
		}
		CandidateShape::Items => {
			if let Some(items) = map.get_mut("items").and_then(Value::as_object_mut) {
				items.remove("oneOf");
				items.insert("type".to_string(), Value::from("object"));
			}
		}
	}

	// The picker hint always lives under the first hint key.
	let mut hints = HINT_KEYS
		.iter()
		.find_map(|key| map.get(*key).and_then(Value::as_object).cloned())
		.unwrap_or_else(Map::new);
	hints.insert("widget".to_string(), Value::from(BLOCK_LIBRARY_WIDGET));
	hints.insert(
		"component".to_string(),
		json!({
			"name": BLOCK_LIBRARY_WIDGET,
			"config": {
				"allowedBlocks": allowed,
				"includeInactive": true,
			}
		}),
	);
	map.insert(HINT_KEYS[0].to_string(), Value::Object(hints));
}
