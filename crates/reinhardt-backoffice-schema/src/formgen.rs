//! Form generation seam
//!
//! The back-office never renders content-type forms itself; it hands the
//! normalized schema to a [`FormGenerator`]. [`DefaultFormGenerator`] is the
//! in-process generator used when no external one is configured for
//! validation, and the reference for what a generator must accept.

use crate::error::SchemaError;
use async_trait::async_trait;
use reinhardt_backoffice_core::text::{escape_html, humanize_field_name};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Widget hint that marks a block library picker.
pub const BLOCK_LIBRARY_WIDGET: &str = "block-library-picker";

/// Keys under which widget hints are read, in precedence order.
pub const HINT_KEYS: [&str; 2] = ["x-formgen", "x-admin"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldKind {
	Text,
	TextArea,
	Number,
	Integer,
	Boolean,
	Date,
	DateTime,
	Email,
	Url,
	Select,
	MultiSelect,
	Object,
	Array,
	/// Object without declared properties
	Json,
	BlockLibrary,
}

impl FormFieldKind {
	fn input_type(&self) -> &'static str {
		match self {
			FormFieldKind::Number | FormFieldKind::Integer => "number",
			FormFieldKind::Boolean => "checkbox",
			FormFieldKind::Date => "date",
			FormFieldKind::DateTime => "datetime-local",
			FormFieldKind::Email => "email",
			FormFieldKind::Url => "url",
			_ => "text",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
	pub value: Value,
	pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
	/// Dotted path from the form root
	pub name: String,
	pub label: String,
	pub kind: FormFieldKind,
	pub required: bool,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub options: Vec<FieldOption>,
	#[serde(default, skip_serializing_if = "Map::is_empty")]
	pub hints: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub children: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
	pub form_id: String,
	pub fields: Vec<FormField>,
}

impl FormDefinition {
	/// Depth-first search by dotted name.
	pub fn field(&self, name: &str) -> Option<&FormField> {
		fn find<'a>(fields: &'a [FormField], name: &str) -> Option<&'a FormField> {
			for field in fields {
				if field.name == name {
					return Some(field);
				}
				if let Some(found) = find(&field.children, name) {
					return Some(found);
				}
			}
			None
		}
		find(&self.fields, name)
	}
}

/// Post-processing step applied to each generated field.
pub trait FieldTransformer: Send + Sync {
	fn name(&self) -> &str;

	/// `schema` is the field's own (normalized) schema node.
	fn transform(&self, field: &mut FormField, schema: &Value);
}

/// Flags schemaless objects for the hybrid JSON editor.
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridJsonTransformer;

impl FieldTransformer for HybridJsonTransformer {
	fn name(&self) -> &str {
		"hybrid_json"
	}

	fn transform(&self, field: &mut FormField, _schema: &Value) {
		if field.kind != FormFieldKind::Json {
			return;
		}
		field
			.hints
			.insert("editorMode".to_string(), Value::from("hybrid"));
		field
			.hints
			.insert("editorActiveView".to_string(), Value::from("gui"));
	}
}

#[derive(Clone)]
pub struct FormRequest {
	pub form_id: String,
	pub schema: Value,
	pub ui_schema: Option<Value>,
	pub transformers: Vec<Arc<dyn FieldTransformer>>,
}

impl fmt::Debug for FormRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FormRequest")
			.field("form_id", &self.form_id)
			.field(
				"transformers",
				&self.transformers.iter().map(|t| t.name()).collect::<Vec<_>>(),
			)
			.finish()
	}
}

impl FormRequest {
	pub fn new(form_id: impl Into<String>, schema: Value) -> Self {
		Self {
			form_id: form_id.into(),
			schema,
			ui_schema: None,
			transformers: Vec::new(),
		}
	}

	pub fn with_ui_schema(mut self, ui_schema: Option<Value>) -> Self {
		self.ui_schema = ui_schema;
		self
	}

	pub fn with_transformer(mut self, transformer: Arc<dyn FieldTransformer>) -> Self {
		self.transformers.push(transformer);
		self
	}
}

/// A generator complaint about one schema location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIssue {
	/// JSON pointer into the submitted schema
	pub pointer: String,
	pub message: String,
}

impl SchemaIssue {
	pub fn new(pointer: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			pointer: pointer.into(),
			message: message.into(),
		}
	}

	pub fn field_name(&self) -> String {
		field_name_from_pointer(&self.pointer)
	}
}

#[derive(Debug, Clone, Error)]
pub enum FormGenerationError {
	#[error("schema rejected by form generator ({} issue(s))", .0.len())]
	Schema(Vec<SchemaIssue>),

	#[error("form generator failed: {0}")]
	Backend(String),
}

impl From<FormGenerationError> for SchemaError {
	fn from(err: FormGenerationError) -> Self {
		match err {
			FormGenerationError::Schema(issues) => {
				let mut fields = BTreeMap::new();
				for issue in &issues {
					fields
						.entry(issue.field_name())
						.or_insert_with(|| issue.message.clone());
				}
				SchemaError::Invalid {
					message: "schema could not be compiled into a form".to_string(),
					fields,
				}
			}
			FormGenerationError::Backend(msg) => SchemaError::GeneratorUnavailable(msg),
		}
	}
}

/// Field name for a JSON pointer: `properties`/`items` segments dropped,
/// the rest dot-joined.
///
/// # Examples
///
/// ```
/// use reinhardt_backoffice_schema::formgen::field_name_from_pointer;
///
/// assert_eq!(field_name_from_pointer("/properties/seo/properties/title"), "seo.title");
/// assert_eq!(field_name_from_pointer("/properties/tags/items/enum"), "tags.enum");
/// assert_eq!(field_name_from_pointer(""), "schema");
/// ```
pub fn field_name_from_pointer(pointer: &str) -> String {
	let segments: Vec<String> = pointer
		.split('/')
		.filter(|s| !s.is_empty())
		.filter(|s| *s != "properties" && *s != "items")
		.map(|s| s.replace("~1", "/").replace("~0", "~"))
		.collect();
	if segments.is_empty() {
		"schema".to_string()
	} else {
		segments.join(".")
	}
}

/// External form generator.
#[async_trait]
pub trait FormGenerator: Send + Sync {
	async fn generate(&self, request: &FormRequest) -> Result<FormDefinition, FormGenerationError>;

	async fn render(&self, form: &FormDefinition) -> Result<String, FormGenerationError>;
}

/// Widget hint of a schema node, if any.
pub fn widget_hint(node: &Value) -> Option<&str> {
	HINT_KEYS
		.iter()
		.find_map(|key| node.get(*key)?.get("widget")?.as_str())
}

/// In-process generator compiling schema nodes into [`FormField`]s and
/// rendering them as plain HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFormGenerator;

impl DefaultFormGenerator {
	pub fn new() -> Self {
		Self
	}

	/// Synchronous compile used by both trait methods.
	pub fn compile(&self, request: &FormRequest) -> Result<FormDefinition, FormGenerationError> {
		let mut issues = Vec::new();
		let Some(root) = request.schema.as_object() else {
			return Err(FormGenerationError::Schema(vec![SchemaIssue::new(
				"",
				"schema must be a JSON object",
			)]));
		};
		let ui = request.ui_schema.as_ref().and_then(Value::as_object);

		let mut fields = compile_properties(root, "", "", ui, &request.transformers, &mut issues);
		if let Some(order) = ui
			.and_then(|ui| ui.get("ui:order"))
			.and_then(Value::as_array)
		{
			apply_order(&mut fields, order);
		}

		if issues.is_empty() {
			Ok(FormDefinition {
				form_id: request.form_id.clone(),
				fields,
			})
		} else {
			Err(FormGenerationError::Schema(issues))
		}
	}
}

#[async_trait]
impl FormGenerator for DefaultFormGenerator {
	async fn generate(&self, request: &FormRequest) -> Result<FormDefinition, FormGenerationError> {
		self.compile(request)
	}

	async fn render(&self, form: &FormDefinition) -> Result<String, FormGenerationError> {
		let mut html = format!(
			"<form id=\"{}\" class=\"backoffice-form\" method=\"post\">\n",
			escape_html(&form.form_id)
		);
		for field in &form.fields {
			render_field(field, 1, &mut html);
		}
		html.push_str("</form>\n");
		Ok(html)
	}
}

const KNOWN_TYPES: [&str; 7] = [
	"string", "number", "integer", "boolean", "object", "array", "null",
];

fn compile_properties(
	node: &Map<String, Value>,
	prefix: &str,
	pointer: &str,
	ui: Option<&Map<String, Value>>,
	transformers: &[Arc<dyn FieldTransformer>],
	issues: &mut Vec<SchemaIssue>,
) -> Vec<FormField> {
	let required: Vec<&str> = node
		.get("required")
		.and_then(Value::as_array)
		.map(|r| r.iter().filter_map(Value::as_str).collect())
		.unwrap_or_default();

	let Some(props) = node.get("properties") else {
		return Vec::new();
	};
	let Some(props) = props.as_object() else {
		issues.push(SchemaIssue::new(
			format!("{}/properties", pointer),
			"properties must be an object",
		));
		return Vec::new();
	};

	for name in &required {
		if !props.contains_key(*name) {
			issues.push(SchemaIssue::new(
				format!("{}/properties/{}", pointer, name),
				"required property is not declared",
			));
		}
	}

	props
		.iter()
		.filter_map(|(name, child)| {
			let path = if prefix.is_empty() {
				name.clone()
			} else {
				format!("{}.{}", prefix, name)
			};
			let child_pointer = format!("{}/properties/{}", pointer, name.replace('~', "~0").replace('/', "~1"));
			let child_ui = ui.and_then(|ui| ui.get(name)).and_then(Value::as_object);
			compile_field(
				&path,
				name,
				child,
				required.contains(&name.as_str()),
				&child_pointer,
				child_ui,
				transformers,
				issues,
			)
		})
		.collect()
}

#[allow(clippy::too_many_arguments)]
fn compile_field(
	path: &str,
	name: &str,
	schema: &Value,
	required: bool,
	pointer: &str,
	ui: Option<&Map<String, Value>>,
	transformers: &[Arc<dyn FieldTransformer>],
	issues: &mut Vec<SchemaIssue>,
) -> Option<FormField> {
	let Some(node) = schema.as_object() else {
		issues.push(SchemaIssue::new(pointer, "field schema must be an object"));
		return None;
	};

	let declared_type = match node.get("type") {
		None => None,
		Some(Value::String(t)) => Some(t.as_str()),
		Some(Value::Array(types)) => types
			.iter()
			.filter_map(Value::as_str)
			.find(|t| *t != "null"),
		Some(_) => {
			issues.push(SchemaIssue::new(
				format!("{}/type", pointer),
				"type must be a string or an array of strings",
			));
			return None;
		}
	};
	if let Some(t) = declared_type
		&& !KNOWN_TYPES.contains(&t)
	{
		issues.push(SchemaIssue::new(
			format!("{}/type", pointer),
			format!("unknown type '{}'", t),
		));
		return None;
	}

	if let Some(values) = node.get("enum")
		&& !values.is_array()
	{
		issues.push(SchemaIssue::new(
			format!("{}/enum", pointer),
			"enum must be an array",
		));
		return None;
	}

	let widget = widget_hint(schema);
	let format = node.get("format").and_then(Value::as_str);
	let has_properties = node.get("properties").is_some();
	let items = node.get("items");

	let kind = if widget == Some(BLOCK_LIBRARY_WIDGET) {
		FormFieldKind::BlockLibrary
	} else if node.get("enum").is_some() {
		FormFieldKind::Select
	} else {
		match declared_type {
			Some("string") => match (widget, format) {
				(Some("textarea"), _) => FormFieldKind::TextArea,
				(_, Some("date")) => FormFieldKind::Date,
				(_, Some("date-time")) => FormFieldKind::DateTime,
				(_, Some("email")) => FormFieldKind::Email,
				(_, Some("uri") | Some("url")) => FormFieldKind::Url,
				_ => FormFieldKind::Text,
			},
			Some("number") => FormFieldKind::Number,
			Some("integer") => FormFieldKind::Integer,
			Some("boolean") => FormFieldKind::Boolean,
			Some("array") if items.and_then(|i| i.get("enum")).is_some() => {
				FormFieldKind::MultiSelect
			}
			Some("array") => FormFieldKind::Array,
			Some("object") if has_properties => FormFieldKind::Object,
			Some("object") => FormFieldKind::Json,
			None if has_properties => FormFieldKind::Object,
			_ => FormFieldKind::Text,
		}
	};

	let option_source = match kind {
		FormFieldKind::MultiSelect => items.and_then(|i| i.get("enum")),
		_ => node.get("enum"),
	};
	let options = option_source
		.and_then(Value::as_array)
		.map(|values| values.iter().map(option_for).collect())
		.unwrap_or_default();

	let mut hints = Map::new();
	for key in HINT_KEYS.iter().rev() {
		if let Some(extra) = node.get(*key).and_then(Value::as_object) {
			for (k, v) in extra {
				hints.insert(k.clone(), v.clone());
			}
		}
	}
	if let Some(ui) = ui {
		for (k, v) in ui {
			if let Some(stripped) = k.strip_prefix("ui:") {
				hints.insert(stripped.to_string(), v.clone());
			}
		}
	}
	if let Some(description) = node.get("description").and_then(Value::as_str) {
		hints
			.entry("help".to_string())
			.or_insert_with(|| Value::from(description));
	}

	let children = match kind {
		FormFieldKind::Object => compile_properties(node, path, pointer, ui, transformers, issues),
		FormFieldKind::Array => items
			.and_then(Value::as_object)
			.map(|item| {
				let item_pointer = format!("{}/items", pointer);
				if item.get("properties").is_some() {
					compile_properties(item, path, &item_pointer, ui, transformers, issues)
				} else {
					compile_field(
						&format!("{}[]", path),
						name,
						&Value::Object(item.clone()),
						false,
						&item_pointer,
						None,
						transformers,
						issues,
					)
					.into_iter()
					.collect()
				}
			})
			.unwrap_or_default(),
		_ => Vec::new(),
	};

	let label = node
		.get("title")
		.and_then(Value::as_str)
		.map(str::to_string)
		.unwrap_or_else(|| humanize_field_name(name));

	let mut field = FormField {
		name: path.to_string(),
		label,
		kind,
		required,
		options,
		hints,
		children,
	};
	for transformer in transformers {
		transformer.transform(&mut field, schema);
	}
	Some(field)
}

fn option_for(value: &Value) -> FieldOption {
	let label = match value {
		Value::String(s) => humanize_field_name(s),
		other => other.to_string(),
	};
	FieldOption {
		value: value.clone(),
		label,
	}
}

/// `ui:order` with an optional `*` placeholder for the unlisted fields.
fn apply_order(fields: &mut Vec<FormField>, order: &[Value]) {
	let names: Vec<&str> = order.iter().filter_map(Value::as_str).collect();
	let rank = |field: &FormField| -> usize {
		let wildcard = names.iter().position(|n| *n == "*").unwrap_or(names.len());
		names
			.iter()
			.position(|n| *n == field.name)
			.unwrap_or(wildcard)
	};
	fields.sort_by_key(rank);
}

fn render_field(field: &FormField, depth: usize, html: &mut String) {
	let indent = "\t".repeat(depth);
	let name = escape_html(&field.name);
	let label = escape_html(&field.label);
	let required = if field.required { " required" } else { "" };
	match field.kind {
		FormFieldKind::Object | FormFieldKind::Array => {
			html.push_str(&format!(
				"{indent}<fieldset data-field=\"{name}\" data-kind=\"{}\">\n{indent}\t<legend>{label}</legend>\n",
				if field.kind == FormFieldKind::Object { "object" } else { "array" }
			));
			for child in &field.children {
				render_field(child, depth + 1, html);
			}
			html.push_str(&format!("{indent}</fieldset>\n"));
		}
		FormFieldKind::Select | FormFieldKind::MultiSelect => {
			let multiple = if field.kind == FormFieldKind::MultiSelect {
				" multiple"
			} else {
				""
			};
			html.push_str(&format!(
				"{indent}<label for=\"{name}\">{label}</label>\n{indent}<select id=\"{name}\" name=\"{name}\"{multiple}{required}>\n"
			));
			for option in &field.options {
				let value = match &option.value {
					Value::String(s) => s.clone(),
					other => other.to_string(),
				};
				html.push_str(&format!(
					"{indent}\t<option value=\"{}\">{}</option>\n",
					escape_html(&value),
					escape_html(&option.label)
				));
			}
			html.push_str(&format!("{indent}</select>\n"));
		}
		FormFieldKind::TextArea | FormFieldKind::Json => {
			let mode = field
				.hints
				.get("editorMode")
				.and_then(Value::as_str)
				.map(|m| format!(" data-editor-mode=\"{}\"", escape_html(m)))
				.unwrap_or_default();
			html.push_str(&format!(
				"{indent}<label for=\"{name}\">{label}</label>\n{indent}<textarea id=\"{name}\" name=\"{name}\"{mode}{required}></textarea>\n"
			));
		}
		FormFieldKind::BlockLibrary => {
			let allowed = field
				.hints
				.get("component")
				.and_then(|c| c.get("config"))
				.and_then(|c| c.get("allowedBlocks"))
				.and_then(Value::as_array)
				.map(|blocks| {
					blocks
						.iter()
						.filter_map(Value::as_str)
						.collect::<Vec<_>>()
						.join(",")
				})
				.unwrap_or_default();
			html.push_str(&format!(
				"{indent}<div data-field=\"{name}\" data-component=\"{BLOCK_LIBRARY_WIDGET}\" data-allowed-blocks=\"{}\">{label}</div>\n",
				escape_html(&allowed)
			));
		}
		_ => {
			html.push_str(&format!(
				"{indent}<label for=\"{name}\">{label}</label>\n{indent}<input id=\"{name}\" name=\"{name}\" type=\"{}\"{required}>\n",
				field.kind.input_type()
			));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn request(schema: Value) -> FormRequest {
		FormRequest::new("article.edit", schema)
			.with_transformer(Arc::new(HybridJsonTransformer))
	}

	#[rstest]
	#[tokio::test]
	async fn test_generate_maps_kinds() {
		// Arrange
		let schema = json!({
			"type": "object",
			"required": ["title"],
			"properties": {
				"title": {"type": "string", "title": "Headline"},
				"body": {"type": "string", "x-formgen": {"widget": "textarea"}},
				"published_at": {"type": "string", "format": "date-time"},
				"status": {"type": "string", "enum": ["draft", "live"]},
				"tags": {"type": "array", "items": {"type": "string", "enum": ["news", "tech"]}},
				"seo": {"type": "object", "properties": {"description": {"type": "string"}}},
				"extra": {"type": "object"}
			}
		});

		// Act
		let form = DefaultFormGenerator::new().generate(&request(schema)).await.unwrap();

		// Assert
		let title = form.field("title").unwrap();
		assert_eq!(title.label, "Headline");
		assert!(title.required);
		assert_eq!(form.field("body").unwrap().kind, FormFieldKind::TextArea);
		assert_eq!(form.field("published_at").unwrap().kind, FormFieldKind::DateTime);
		assert_eq!(form.field("status").unwrap().options.len(), 2);
		assert_eq!(form.field("tags").unwrap().kind, FormFieldKind::MultiSelect);
		assert_eq!(form.field("seo.description").unwrap().kind, FormFieldKind::Text);
		let extra = form.field("extra").unwrap();
		assert_eq!(extra.kind, FormFieldKind::Json);
		assert_eq!(extra.hints["editorMode"], json!("hybrid"));
		assert_eq!(extra.hints["editorActiveView"], json!("gui"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_generate_flattens_issue_pointers() {
		// Arrange
		let schema = json!({
			"type": "object",
			"properties": {
				"seo": {"type": "object", "properties": {"title": {"type": "strnig"}}},
				"rank": {"type": "integer", "enum": "high"}
			}
		});

		// Act
		let err = DefaultFormGenerator::new().generate(&request(schema)).await.unwrap_err();
		let fields = SchemaError::from(err).fields();

		// Assert
		assert_eq!(fields.get("seo.title.type").map(String::as_str), Some("unknown type 'strnig'"));
		assert_eq!(fields.get("rank.enum").map(String::as_str), Some("enum must be an array"));
	}

	#[rstest]
	fn test_undeclared_required_property_is_an_issue() {
		// Arrange
		let schema = json!({"type": "object", "required": ["slug"], "properties": {}});

		// Act
		let err = DefaultFormGenerator::new().compile(&request(schema)).unwrap_err();

		// Assert
		match err {
			FormGenerationError::Schema(issues) => {
				assert_eq!(issues[0].field_name(), "slug");
			}
			other => panic!("unexpected error: {:?}", other),
		}
	}

	#[rstest]
	fn test_ui_order_with_wildcard() {
		// Arrange
		let schema = json!({
			"type": "object",
			"properties": {"a": {"type": "string"}, "b": {"type": "string"}, "c": {"type": "string"}}
		});
		let req = request(schema).with_ui_schema(Some(json!({"ui:order": ["c", "*", "a"]})));

		// Act
		let form = DefaultFormGenerator::new().compile(&req).unwrap();

		// Assert
		let names: Vec<_> = form.fields.iter().map(|f| f.name.as_str()).collect();
		assert_eq!(names, vec!["c", "b", "a"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_render_escapes_labels() {
		// Arrange
		let schema = json!({
			"type": "object",
			"properties": {"title": {"type": "string", "title": "<b>Title</b>"}}
		});
		let generator = DefaultFormGenerator::new();
		let form = generator.generate(&request(schema)).await.unwrap();

		// Act
		let html = generator.render(&form).await.unwrap();

		// Assert
		assert!(html.starts_with("<form id=\"article.edit\""));
		assert!(html.contains("&lt;b&gt;Title&lt;/b&gt;"));
		assert!(html.contains("name=\"title\""));
	}
}
