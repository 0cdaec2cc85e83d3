//! Admin navigation
//!
//! Every dynamic panel owns one [`NavItem`] in the content-modeling menu.
//! The menu service keeps the parent graph acyclic.

use crate::error::{PanelError, PanelResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use reinhardt_backoffice_core::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
	pub id: String,
	pub menu: String,
	pub label: String,
	pub parent_id: Option<String>,
	pub position: i32,
	/// Panel opened by the item, if any
	pub panel_id: Option<String>,
	pub icon: Option<String>,
}

impl NavItem {
	pub fn new(id: impl Into<String>, menu: impl Into<String>, label: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			menu: menu.into(),
			label: label.into(),
			parent_id: None,
			position: 0,
			panel_id: None,
			icon: None,
		}
	}

	pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
		self.parent_id = Some(parent_id.into());
		self
	}

	pub fn with_position(mut self, position: i32) -> Self {
		self.position = position;
		self
	}

	pub fn with_panel(mut self, panel_id: impl Into<String>) -> Self {
		self.panel_id = Some(panel_id.into());
		self
	}

	pub fn with_icon(mut self, icon: Option<String>) -> Self {
		self.icon = icon;
		self
	}
}

/// Stable navigation id of a dynamic panel.
pub fn nav_item_id(menu: &str, panel_id: &str) -> String {
	format!("{}.{}", menu, panel_id)
}

#[async_trait]
pub trait MenuService: Send + Sync {
	/// Inserts or replaces an item. Fails when `parent_id` would make the
	/// item its own ancestor.
	async fn upsert(&self, ctx: &Context, item: NavItem) -> PanelResult<NavItem>;

	/// Removes an item together with its descendants; returns removed ids.
	async fn remove(&self, ctx: &Context, id: &str) -> PanelResult<Vec<String>>;

	async fn get(&self, ctx: &Context, id: &str) -> PanelResult<Option<NavItem>>;

	/// Items of `menu` ordered by position, then id.
	async fn items(&self, ctx: &Context, menu: &str) -> PanelResult<Vec<NavItem>>;
}

#[derive(Debug, Default)]
pub struct InMemoryMenuService {
	items: RwLock<BTreeMap<String, NavItem>>,
}

impl InMemoryMenuService {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.items.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.read().is_empty()
	}

	pub fn contains(&self, id: &str) -> bool {
		self.items.read().contains_key(id)
	}
}

fn cycle_error(item_id: &str) -> PanelError {
	tracing::debug!(item_id, "rejected navigation cycle");
	PanelError::invalid(
		format!("navigation item '{}' cannot be its own ancestor", item_id),
		"parent_id",
		"cycle",
	)
}

/// Walks the ancestors of `parent`; `item_id` showing up means a cycle.
fn creates_cycle(items: &BTreeMap<String, NavItem>, item_id: &str, parent: &str) -> bool {
	let mut seen = HashSet::new();
	let mut current = Some(parent);
	while let Some(id) = current {
		if id == item_id {
			return true;
		}
		// Pre-existing loops elsewhere must not hang the walk
		if !seen.insert(id) {
			return false;
		}
		current = items.get(id).and_then(|i| i.parent_id.as_deref());
	}
	false
}

#[async_trait]
impl MenuService for InMemoryMenuService {
	async fn upsert(&self, ctx: &Context, item: NavItem) -> PanelResult<NavItem> {
		ctx.check()?;
		let mut items = self.items.write();
		if let Some(parent) = item.parent_id.as_deref()
			&& creates_cycle(&items, &item.id, parent)
		{
			return Err(cycle_error(&item.id));
		}
		items.insert(item.id.clone(), item.clone());
		Ok(item)
	}

	async fn remove(&self, ctx: &Context, id: &str) -> PanelResult<Vec<String>> {
		ctx.check()?;
		let mut items = self.items.write();
		if !items.contains_key(id) {
			return Ok(Vec::new());
		}
		let mut removed = vec![id.to_string()];
		let mut cursor = 0;
		while cursor < removed.len() {
			let parent = removed[cursor].clone();
			removed.extend(
				items
					.values()
					.filter(|i| i.parent_id.as_deref() == Some(parent.as_str()))
					.filter(|i| !removed.contains(&i.id))
					.map(|i| i.id.clone())
					.collect::<Vec<_>>(),
			);
			cursor += 1;
		}
		for id in &removed {
			items.remove(id);
		}
		Ok(removed)
	}

	async fn get(&self, ctx: &Context, id: &str) -> PanelResult<Option<NavItem>> {
		ctx.check()?;
		Ok(self.items.read().get(id).cloned())
	}

	async fn items(&self, ctx: &Context, menu: &str) -> PanelResult<Vec<NavItem>> {
		ctx.check()?;
		let mut items: Vec<NavItem> = self
			.items
			.read()
			.values()
			.filter(|i| i.menu == menu)
			.cloned()
			.collect();
		items.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
		Ok(items)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use reinhardt_backoffice_core::{BackofficeError, TextCode};
	use rstest::{fixture, rstest};

	#[fixture]
	fn menu() -> InMemoryMenuService {
		InMemoryMenuService::new()
	}

	#[rstest]
	#[tokio::test]
	async fn test_self_parent_is_a_cycle(menu: InMemoryMenuService) {
		// Act
		let err = menu
			.upsert(&Context::new(), NavItem::new("a", "content", "A").with_parent("a"))
			.await
			.unwrap_err();

		// Assert
		let mapped = BackofficeError::from(err);
		assert_eq!(mapped.text_code(), TextCode::ValidationError);
		assert_eq!(mapped.field_errors().get("parent_id").map(String::as_str), Some("cycle"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_indirect_cycle_is_rejected(menu: InMemoryMenuService) {
		// Arrange
		let ctx = Context::new();
		menu.upsert(&ctx, NavItem::new("a", "content", "A")).await.unwrap();
		menu.upsert(&ctx, NavItem::new("b", "content", "B").with_parent("a"))
			.await
			.unwrap();
		menu.upsert(&ctx, NavItem::new("c", "content", "C").with_parent("b"))
			.await
			.unwrap();

		// Act
		let result = menu
			.upsert(&ctx, NavItem::new("a", "content", "A").with_parent("c"))
			.await;

		// Assert
		assert!(result.is_err());
		assert_eq!(menu.get(&ctx, "a").await.unwrap().unwrap().parent_id, None);
	}

	#[rstest]
	#[tokio::test]
	async fn test_remove_takes_descendants(menu: InMemoryMenuService) {
		// Arrange
		let ctx = Context::new();
		menu.upsert(&ctx, NavItem::new("a", "content", "A")).await.unwrap();
		menu.upsert(&ctx, NavItem::new("b", "content", "B").with_parent("a"))
			.await
			.unwrap();
		menu.upsert(&ctx, NavItem::new("c", "content", "C")).await.unwrap();

		// Act
		let removed = menu.remove(&ctx, "a").await.unwrap();

		// Assert
		assert_eq!(removed, vec!["a", "b"]);
		assert_eq!(menu.len(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_items_are_ordered_by_position(menu: InMemoryMenuService) {
		// Arrange
		let ctx = Context::new();
		menu.upsert(&ctx, NavItem::new("z", "content", "Z").with_position(1))
			.await
			.unwrap();
		menu.upsert(&ctx, NavItem::new("y", "content", "Y").with_position(2))
			.await
			.unwrap();
		menu.upsert(&ctx, NavItem::new("x", "other", "X")).await.unwrap();

		// Act
		let items = menu.items(&ctx, "content").await.unwrap();

		// Assert
		let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
		assert_eq!(ids, vec!["z", "y"]);
	}
}
