//! Field synthesis from content-type schemas
//!
//! [`SchemaConverter`] walks a content-type schema and emits the
//! [`PanelField`] descriptors a panel uses for its list, form and detail
//! views.

use crate::error::{PanelError, PanelResult};
use reinhardt_backoffice_core::text::humanize_field_name;
use reinhardt_backoffice_schema::formgen::{BLOCK_LIBRARY_WIDGET, HINT_KEYS, widget_hint};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Admin field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
	Text,
	TextArea,
	Number,
	Integer,
	Boolean,
	Email,
	Url,
	Date,
	DateTime,
	Select,
	MultiSelect,
	/// Object with declared properties
	Group,
	/// Array of items
	List,
	/// Schemaless object
	Json,
	Blocks,
	Media,
	Hidden,
}

impl FieldType {
	/// Scalar types can be shown as list columns.
	pub fn is_scalar(&self) -> bool {
		!matches!(
			self,
			FieldType::Group
				| FieldType::List
				| FieldType::Json
				| FieldType::Blocks
				| FieldType::MultiSelect
				| FieldType::TextArea
		)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChoice {
	pub value: Value,
	pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelField {
	pub name: String,
	pub label: String,
	#[serde(rename = "type")]
	pub field_type: FieldType,
	pub required: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub options: Vec<FieldChoice>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub ui_hints: Map<String, Value>,
	/// Nested fields of a group
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub fields: Vec<PanelField>,
	/// Item descriptor of a list
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub items: Option<Box<PanelField>>,
}

impl PanelField {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		let name = name.into();
		Self {
			label: humanize_field_name(&name),
			name,
			field_type,
			required: false,
			options: Vec::new(),
			ui_hints: Map::new(),
			fields: Vec::new(),
			items: None,
		}
	}

	fn hint_bool(&self, key: &str) -> Option<bool> {
		self.ui_hints.get(key).and_then(Value::as_bool)
	}
}

/// Supplies choices for fields declaring `x-admin.options_source`.
pub trait OptionsResolver: Send + Sync {
	fn resolve(&self, source: &str) -> Option<Vec<FieldChoice>>;
}

/// Fixed choice lists keyed by source name.
#[derive(Debug, Clone, Default)]
pub struct StaticOptionsResolver {
	sources: HashMap<String, Vec<FieldChoice>>,
}

impl StaticOptionsResolver {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_source<I, V>(mut self, name: impl Into<String>, values: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		self.sources
			.insert(name.into(), values.into_iter().map(|v| choice(&v.into())).collect());
		self
	}
}

impl OptionsResolver for StaticOptionsResolver {
	fn resolve(&self, source: &str) -> Option<Vec<FieldChoice>> {
		self.sources.get(source).cloned()
	}
}

fn choice(value: &Value) -> FieldChoice {
	let label = match value {
		Value::String(s) => humanize_field_name(s),
		other => other.to_string(),
	};
	FieldChoice {
		value: value.clone(),
		label,
	}
}

/// Field sets of one panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSets {
	pub list: Vec<String>,
	pub form: Vec<PanelField>,
	pub detail: Vec<PanelField>,
	pub filters: Vec<String>,
	pub search: Vec<String>,
}

impl FieldSets {
	/// Reorders every set after a `ui:order` list. `*` stands for all
	/// fields not named, which keep their relative order.
	pub fn apply_order(&mut self, order: &[String]) {
		if order.is_empty() {
			return;
		}
		let rest = order.iter().position(|o| o == "*").unwrap_or(order.len());
		let rank = |name: &str| order.iter().position(|o| o == name).unwrap_or(rest);
		self.form.sort_by_key(|f| rank(&f.name));
		self.detail.sort_by_key(|f| rank(&f.name));
		self.list.sort_by_key(|name| rank(name));
		self.filters.sort_by_key(|name| rank(name));
		self.search.sort_by_key(|name| rank(name));
	}
}

/// Number of list columns picked when the schema marks none.
const DEFAULT_LIST_COLUMNS: usize = 4;

#[derive(Clone, Default)]
pub struct SchemaConverter {
	options: Option<Arc<dyn OptionsResolver>>,
}

impl SchemaConverter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_options_resolver(mut self, resolver: Arc<dyn OptionsResolver>) -> Self {
		self.options = Some(resolver);
		self
	}

	/// Top-level fields of `schema`, ordered by name.
	pub fn convert(&self, schema: &Value) -> PanelResult<Vec<PanelField>> {
		let Some(root) = schema.as_object() else {
			return Err(PanelError::invalid(
				"content type schema must be an object",
				"schema",
				"expected a JSON object",
			));
		};
		Ok(self.convert_properties(root))
	}

	/// List, form, detail, filter and search field sets.
	///
	/// List columns are the scalars marked `x-admin.list`, or the first few
	/// scalars when none are marked. Filters are booleans, selects and
	/// fields marked `x-admin.filter`; search covers text fields.
	pub fn field_sets(&self, schema: &Value) -> PanelResult<FieldSets> {
		let fields = self.convert(schema)?;

		let marked: Vec<String> = fields
			.iter()
			.filter(|f| f.field_type.is_scalar() && f.hint_bool("list") == Some(true))
			.map(|f| f.name.clone())
			.collect();
		let list = if marked.is_empty() {
			fields
				.iter()
				.filter(|f| f.field_type.is_scalar() && f.hint_bool("list") != Some(false))
				.take(DEFAULT_LIST_COLUMNS)
				.map(|f| f.name.clone())
				.collect()
		} else {
			marked
		};

		let filters = fields
			.iter()
			.filter(|f| {
				f.hint_bool("filter")
					.unwrap_or(matches!(f.field_type, FieldType::Boolean | FieldType::Select))
			})
			.map(|f| f.name.clone())
			.collect();
		let search = fields
			.iter()
			.filter(|f| matches!(f.field_type, FieldType::Text | FieldType::TextArea))
			.map(|f| f.name.clone())
			.collect();
		let detail = fields
			.iter()
			.filter(|f| f.field_type != FieldType::Hidden)
			.cloned()
			.collect();

		Ok(FieldSets {
			list,
			form: fields,
			detail,
			filters,
			search,
		})
	}

	fn convert_properties(&self, node: &Map<String, Value>) -> Vec<PanelField> {
		let required: Vec<&str> = node
			.get("required")
			.and_then(Value::as_array)
			.map(|r| r.iter().filter_map(Value::as_str).collect())
			.unwrap_or_default();
		let Some(properties) = node.get("properties").and_then(Value::as_object) else {
			return Vec::new();
		};
		properties
			.iter()
			.map(|(name, property)| {
				let mut field = self.convert_node(name, property);
				field.required = required.contains(&name.as_str());
				field
			})
			.collect()
	}

	fn convert_node(&self, name: &str, schema: &Value) -> PanelField {
		let node = schema.as_object().cloned().unwrap_or_default();
		let hints = collect_hints(&node);
		let field_type = self.field_type(schema, &node);

		let mut field = PanelField::new(name, field_type);
		if let Some(title) = node.get("title").and_then(Value::as_str) {
			field.label = title.to_string();
		}
		field.options = self.options_for(&node, &hints, field_type);
		field.ui_hints = hints;

		match field_type {
			FieldType::Group => field.fields = self.convert_properties(&node),
			FieldType::List | FieldType::Blocks | FieldType::MultiSelect => {
				if let Some(items) = node.get("items") {
					field.items = Some(Box::new(self.convert_node("item", items)));
				}
			}
			_ => {}
		}
		field
	}

	fn field_type(&self, schema: &Value, node: &Map<String, Value>) -> FieldType {
		let widget = widget_hint(schema);
		if widget == Some(BLOCK_LIBRARY_WIDGET) {
			return FieldType::Blocks;
		}
		match widget {
			Some("hidden") => return FieldType::Hidden,
			Some("media" | "image" | "file") => return FieldType::Media,
			Some("textarea" | "richtext" | "markdown") => return FieldType::TextArea,
			_ => {}
		}
		if node.contains_key("enum") || option_source(node).is_some() {
			return FieldType::Select;
		}
		let declared = match node.get("type") {
			Some(Value::String(t)) => Some(t.as_str()),
			// ["string", "null"] style unions take their first non-null member
			Some(Value::Array(types)) => types
				.iter()
				.filter_map(Value::as_str)
				.find(|t| *t != "null"),
			_ => None,
		};
		let format = node.get("format").and_then(Value::as_str);
		match declared {
			Some("string") => match format {
				Some("date") => FieldType::Date,
				Some("date-time") => FieldType::DateTime,
				Some("email") => FieldType::Email,
				Some("uri" | "url") => FieldType::Url,
				_ => FieldType::Text,
			},
			Some("number") => FieldType::Number,
			Some("integer") => FieldType::Integer,
			Some("boolean") => FieldType::Boolean,
			Some("array") => {
				let item_enum = node.get("items").and_then(|i| i.get("enum")).is_some();
				if item_enum {
					FieldType::MultiSelect
				} else {
					FieldType::List
				}
			}
			Some("object") if node.contains_key("properties") => FieldType::Group,
			Some("object") => FieldType::Json,
			None if node.contains_key("properties") => FieldType::Group,
			_ => FieldType::Text,
		}
	}

	fn options_for(
		&self,
		node: &Map<String, Value>,
		hints: &Map<String, Value>,
		field_type: FieldType,
	) -> Vec<FieldChoice> {
		let declared = match field_type {
			FieldType::MultiSelect => node.get("items").and_then(|i| i.get("enum")),
			_ => node.get("enum"),
		};
		if let Some(values) = declared.and_then(Value::as_array) {
			return values.iter().map(choice).collect();
		}
		let source = option_source(node).or_else(|| hints.get("options_source").and_then(Value::as_str));
		match (source, &self.options) {
			(Some(source), Some(resolver)) => resolver.resolve(source).unwrap_or_else(|| {
				tracing::warn!(source, "unknown options source");
				Vec::new()
			}),
			_ => Vec::new(),
		}
	}
}

fn option_source(node: &Map<String, Value>) -> Option<&str> {
	HINT_KEYS
		.iter()
		.find_map(|key| node.get(*key)?.get("options_source")?.as_str())
}

/// `x-admin` hints override `x-formgen` ones.
fn collect_hints(node: &Map<String, Value>) -> Map<String, Value> {
	let mut hints = Map::new();
	for key in HINT_KEYS {
		if let Some(extra) = node.get(key).and_then(Value::as_object) {
			for (k, v) in extra {
				hints.insert(k.clone(), v.clone());
			}
		}
	}
	if let Some(description) = node.get("description").and_then(Value::as_str) {
		hints
			.entry("help".to_string())
			.or_insert_with(|| Value::from(description));
	}
	hints
}
