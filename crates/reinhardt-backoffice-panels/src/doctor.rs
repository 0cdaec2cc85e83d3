//! Doctor check: every registered panel has its navigation item and every
//! panel nav item points at a registered panel.

use crate::navigation::MenuService;
use crate::registry::AdminRegistry;
use async_trait::async_trait;
use reinhardt_backoffice_core::{Context, DoctorCheck, Finding};
use std::sync::Arc;

pub struct PanelNavigationCheck {
	registry: Arc<AdminRegistry>,
	menu: Arc<dyn MenuService>,
	menu_code: String,
}

impl PanelNavigationCheck {
	pub fn new(registry: Arc<AdminRegistry>, menu: Arc<dyn MenuService>, menu_code: impl Into<String>) -> Self {
		Self {
			registry,
			menu,
			menu_code: menu_code.into(),
		}
	}
}

#[async_trait]
impl DoctorCheck for PanelNavigationCheck {
	fn name(&self) -> &str {
		"panel_navigation"
	}

	async fn run(&self) -> Vec<Finding> {
		let ctx = Context::new();
		let items = match self.menu.items(&ctx, &self.menu_code).await {
			Ok(items) => items,
			Err(err) => {
				return vec![Finding::error(self.name(), format!("menu service unavailable: {}", err))];
			}
		};

		let mut findings = Vec::new();
		for panel in self.registry.panels() {
			if !items.iter().any(|i| i.id == panel.nav_item_id) {
				findings.push(Finding::error(
					self.name(),
					format!("panel '{}' has no navigation item '{}'", panel.id, panel.nav_item_id),
				));
			}
		}
		for item in &items {
			if let Some(panel_id) = &item.panel_id
				&& !self.registry.contains(panel_id)
			{
				findings.push(Finding::warning(
					self.name(),
					format!("navigation item '{}' points at unregistered panel '{}'", item.id, panel_id),
				));
			}
		}
		if findings.is_empty() {
			findings.push(Finding::info(
				self.name(),
				format!("{} panels consistent with navigation", self.registry.len()),
			));
		}
		findings
	}
}
