//! Breaking-change detection between two revisions of a content-type schema

use crate::error::{SchemaError, SchemaResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BreakingChange {
	PropertyRemoved {
		path: String,
	},
	TypeChanged {
		path: String,
		from: String,
		to: String,
	},
	/// A property became required that existing records may lack
	RequiredAdded {
		path: String,
	},
	EnumNarrowed {
		path: String,
		removed: Vec<String>,
	},
}

impl BreakingChange {
	pub fn path(&self) -> &str {
		match self {
			BreakingChange::PropertyRemoved { path }
			| BreakingChange::TypeChanged { path, .. }
			| BreakingChange::RequiredAdded { path }
			| BreakingChange::EnumNarrowed { path, .. } => path,
		}
	}

	pub fn describe(&self) -> String {
		match self {
			BreakingChange::PropertyRemoved { path } => format!("property '{}' removed", path),
			BreakingChange::TypeChanged { path, from, to } => {
				format!("property '{}' changed type from {} to {}", path, from, to)
			}
			BreakingChange::RequiredAdded { path } => {
				format!("property '{}' is now required", path)
			}
			BreakingChange::EnumNarrowed { path, removed } => format!(
				"property '{}' no longer accepts {}",
				path,
				removed.join(", ")
			),
		}
	}
}

/// Compares schema revisions property by property.
#[derive(Debug, Clone, Copy, Default)]
pub struct BreakingChangeDetector;

impl BreakingChangeDetector {
	pub fn new() -> Self {
		Self
	}

	/// Changes in `new` that existing records of `old` may violate.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_backoffice_schema::breaking::{BreakingChange, BreakingChangeDetector};
	/// use serde_json::json;
	///
	/// let old = json!({"type": "object", "properties": {"title": {"type": "string"}}});
	/// let new = json!({"type": "object", "properties": {}});
	///
	/// let changes = BreakingChangeDetector::new().detect(&old, &new);
	/// assert_eq!(changes, vec![BreakingChange::PropertyRemoved { path: "title".into() }]);
	/// ```
	pub fn detect(&self, old: &Value, new: &Value) -> Vec<BreakingChange> {
		let mut changes = Vec::new();
		compare_node(old, new, "", &mut changes);
		changes
	}

	/// `Breaking` unless there are no changes or `allow_breaking` is set.
	pub fn ensure_compatible(
		&self,
		old: &Value,
		new: &Value,
		allow_breaking: bool,
	) -> SchemaResult<Vec<BreakingChange>> {
		let changes = self.detect(old, new);
		if changes.is_empty() || allow_breaking {
			if !changes.is_empty() {
				tracing::info!(
					changes = changes.len(),
					"accepting breaking schema changes"
				);
			}
			return Ok(changes);
		}
		Err(SchemaError::Breaking(changes))
	}
}

fn join_path(prefix: &str, name: &str) -> String {
	if prefix.is_empty() {
		name.to_string()
	} else {
		format!("{}.{}", prefix, name)
	}
}

fn properties(node: &Value) -> Option<&Map<String, Value>> {
	node.get("properties").and_then(Value::as_object)
}

fn required(node: &Value) -> BTreeSet<&str> {
	node.get("required")
		.and_then(Value::as_array)
		.map(|r| r.iter().filter_map(Value::as_str).collect())
		.unwrap_or_default()
}

fn type_label(node: &Value) -> Option<String> {
	match node.get("type")? {
		Value::String(s) => Some(s.clone()),
		Value::Array(types) => Some(
			types
				.iter()
				.filter_map(Value::as_str)
				.collect::<Vec<_>>()
				.join("|"),
		),
		_ => None,
	}
}

fn enum_values(node: &Value) -> Option<Vec<String>> {
	node.get("enum").and_then(Value::as_array).map(|values| {
		values
			.iter()
			.map(|v| match v {
				Value::String(s) => s.clone(),
				other => other.to_string(),
			})
			.collect()
	})
}

fn compare_node(old: &Value, new: &Value, path: &str, changes: &mut Vec<BreakingChange>) {
	if !path.is_empty() {
		if let (Some(from), Some(to)) = (type_label(old), type_label(new))
			&& from != to
		{
			changes.push(BreakingChange::TypeChanged {
				path: path.to_string(),
				from,
				to,
			});
			// Children of a retyped node are not comparable.
			return;
		}

		if let (Some(before), Some(after)) = (enum_values(old), enum_values(new)) {
			let removed: Vec<String> = before.into_iter().filter(|v| !after.contains(v)).collect();
			if !removed.is_empty() {
				changes.push(BreakingChange::EnumNarrowed {
					path: path.to_string(),
					removed,
				});
			}
		}
	}

	if let Some(old_props) = properties(old) {
		let new_props = properties(new);
		for (name, old_child) in old_props {
			let child_path = join_path(path, name);
			match new_props.and_then(|p| p.get(name)) {
				Some(new_child) => compare_node(old_child, new_child, &child_path, changes),
				None => changes.push(BreakingChange::PropertyRemoved { path: child_path }),
			}
		}
	}

	let old_required = required(old);
	for name in required(new) {
		if !old_required.contains(name) {
			changes.push(BreakingChange::RequiredAdded {
				path: join_path(path, name),
			});
		}
	}

	if let (Some(old_items), Some(new_items)) = (old.get("items"), new.get("items")) {
		compare_node(old_items, new_items, path, changes);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn base() -> Value {
		json!({
			"type": "object",
			"required": ["title"],
			"properties": {
				"title": {"type": "string"},
				"status": {"type": "string", "enum": ["draft", "live", "archived"]},
				"seo": {
					"type": "object",
					"properties": {"description": {"type": "string"}}
				}
			}
		})
	}

	#[rstest]
	fn test_identical_schema_has_no_changes() {
		assert!(BreakingChangeDetector::new().detect(&base(), &base()).is_empty());
	}

	#[rstest]
	fn test_adding_optional_property_is_safe() {
		// Arrange
		let mut new = base();
		new["properties"]["subtitle"] = json!({"type": "string"});

		// Act
		let changes = BreakingChangeDetector::new().detect(&base(), &new);

		// Assert
		assert!(changes.is_empty());
	}

	#[rstest]
	fn test_nested_removal_and_type_change() {
		// Arrange
		let mut new = base();
		new["properties"]["seo"]["properties"] = json!({});
		new["properties"]["title"] = json!({"type": "integer"});

		// Act
		let changes = BreakingChangeDetector::new().detect(&base(), &new);

		// Assert
		assert!(changes.contains(&BreakingChange::PropertyRemoved {
			path: "seo.description".into()
		}));
		assert!(changes.contains(&BreakingChange::TypeChanged {
			path: "title".into(),
			from: "string".into(),
			to: "integer".into()
		}));
	}

	#[rstest]
	fn test_required_added_and_enum_narrowed() {
		// Arrange
		let mut new = base();
		new["required"] = json!(["title", "status"]);
		new["properties"]["status"]["enum"] = json!(["draft", "live"]);

		// Act
		let changes = BreakingChangeDetector::new().detect(&base(), &new);

		// Assert
		assert_eq!(
			changes,
			vec![
				BreakingChange::EnumNarrowed {
					path: "status".into(),
					removed: vec!["archived".into()]
				},
				BreakingChange::RequiredAdded {
					path: "status".into()
				},
			]
		);
	}

	#[rstest]
	#[case(false, true)]
	#[case(true, false)]
	fn test_ensure_compatible(#[case] allow: bool, #[case] expect_err: bool) {
		// Arrange
		let new = json!({"type": "object", "properties": {}});

		// Act
		let result = BreakingChangeDetector::new().ensure_compatible(&base(), &new, allow);

		// Assert
		assert_eq!(result.is_err(), expect_err);
	}

	#[rstest]
	fn test_serializes_with_kind_tag() {
		// Arrange
		let change = BreakingChange::PropertyRemoved {
			path: "title".into(),
		};

		// Act
		let value = serde_json::to_value(&change).unwrap();

		// Assert
		assert_eq!(value, json!({"kind": "property_removed", "path": "title"}));
	}
}
