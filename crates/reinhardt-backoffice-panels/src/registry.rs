//! Admin panel registry
//!
//! Panels are stored behind a single reader/writer lock. Writers swap whole
//! `Arc<Panel>` values, so readers always observe a fully built panel.

use crate::error::{PanelError, PanelResult};
use crate::panel::{Panel, PanelTab};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct AdminRegistry {
	panels: RwLock<BTreeMap<String, Arc<Panel>>>,
}

impl AdminRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts `panel`, replacing any panel with the same id in place.
	/// Returns the replaced panel.
	pub fn register(&self, panel: Panel) -> Option<Arc<Panel>> {
		let id = panel.id.clone();
		self.panels.write().insert(id, Arc::new(panel))
	}

	/// Puts a previously registered panel back, e.g. after a failed refresh.
	pub fn restore(&self, panel: Arc<Panel>) {
		self.panels.write().insert(panel.id.clone(), panel);
	}

	pub fn get(&self, panel_id: &str) -> Option<Arc<Panel>> {
		self.panels.read().get(panel_id).cloned()
	}

	pub fn require(&self, panel_id: &str) -> PanelResult<Arc<Panel>> {
		self.get(panel_id)
			.ok_or_else(|| PanelError::PanelNotFound(panel_id.to_string()))
	}

	pub fn contains(&self, panel_id: &str) -> bool {
		self.panels.read().contains_key(panel_id)
	}

	pub fn remove(&self, panel_id: &str) -> Option<Arc<Panel>> {
		self.panels.write().remove(panel_id)
	}

	pub fn panel_ids(&self) -> Vec<String> {
		self.panels.read().keys().cloned().collect()
	}

	pub fn panels(&self) -> Vec<Arc<Panel>> {
		self.panels.read().values().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.panels.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.panels.read().is_empty()
	}

	/// Adds a tab to a registered panel. Colliding ids keep the existing tab.
	pub fn add_tab(&self, panel_id: &str, tab: PanelTab) -> PanelResult<bool> {
		let mut panels = self.panels.write();
		let current = panels
			.get(panel_id)
			.ok_or_else(|| PanelError::PanelNotFound(panel_id.to_string()))?;
		let mut updated = Panel::clone(current);
		let added = updated.add_tab(tab);
		if added {
			panels.insert(panel_id.to_string(), Arc::new(updated));
		}
		Ok(added)
	}
}
