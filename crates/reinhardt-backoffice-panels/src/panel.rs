//! Runtime panel model
//!
//! A [`Panel`] bundles the list, form and detail views of one content type
//! with the repository serving its records. Panels are not persisted; the
//! factory rebuilds them from the content type whenever it changes.

use crate::fields::FieldSets;
use crate::repository::PanelRepository;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// CRUD action checked against panel permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelAction {
	View,
	Create,
	Edit,
	Delete,
}

impl PanelAction {
	pub const ALL: [PanelAction; 4] = [
		PanelAction::View,
		PanelAction::Create,
		PanelAction::Edit,
		PanelAction::Delete,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			PanelAction::View => "view",
			PanelAction::Create => "create",
			PanelAction::Edit => "edit",
			PanelAction::Delete => "delete",
		}
	}
}

impl fmt::Display for PanelAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Permission codenames of a panel, one per [`PanelAction`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelPermissions {
	pub view: String,
	pub create: String,
	pub edit: String,
	pub delete: String,
}

impl PanelPermissions {
	/// `admin.<panel>.<action>` codenames.
	pub fn for_panel(panel_id: &str) -> Self {
		let codename = |action: PanelAction| format!("admin.{}.{}", panel_id, action.as_str());
		Self {
			view: codename(PanelAction::View),
			create: codename(PanelAction::Create),
			edit: codename(PanelAction::Edit),
			delete: codename(PanelAction::Delete),
		}
	}

	pub fn codename(&self, action: PanelAction) -> &str {
		match action {
			PanelAction::View => &self.view,
			PanelAction::Create => &self.create,
			PanelAction::Edit => &self.edit,
			PanelAction::Delete => &self.delete,
		}
	}

	pub fn all(&self) -> [&str; 4] {
		[&self.view, &self.create, &self.edit, &self.delete]
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelTab {
	pub id: String,
	pub label: String,
	pub position: i32,
}

impl PanelTab {
	pub fn new(id: impl Into<String>, label: impl Into<String>, position: i32) -> Self {
		Self {
			id: id.into(),
			label: label.into(),
			position,
		}
	}
}

/// Serializable view of a panel, without its repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelDescriptor {
	pub id: String,
	pub label: String,
	pub icon: Option<String>,
	pub content_type: String,
	pub traits: Vec<String>,
	pub fields: FieldSets,
	pub permissions: PanelPermissions,
	pub tabs: Vec<PanelTab>,
	pub nav_item_id: String,
	pub search: bool,
	pub workflow: bool,
	pub translations: bool,
}

#[derive(Clone)]
pub struct Panel {
	pub id: String,
	pub label: String,
	pub icon: Option<String>,
	/// Slug of the content type the panel was built from
	pub content_type: String,
	pub traits: Vec<String>,
	pub fields: FieldSets,
	pub permissions: PanelPermissions,
	pub nav_item_id: String,
	pub search: bool,
	pub workflow: bool,
	pub translations: bool,
	tabs: Vec<PanelTab>,
	repository: Arc<dyn PanelRepository>,
}

impl Panel {
	pub fn new(
		id: impl Into<String>,
		label: impl Into<String>,
		repository: Arc<dyn PanelRepository>,
	) -> Self {
		let id = id.into();
		Self {
			label: label.into(),
			icon: None,
			content_type: id.clone(),
			traits: Vec::new(),
			fields: FieldSets::default(),
			permissions: PanelPermissions::for_panel(&id),
			nav_item_id: id.clone(),
			search: false,
			workflow: false,
			translations: false,
			tabs: Vec::new(),
			repository,
			id,
		}
	}

	pub fn repository(&self) -> &Arc<dyn PanelRepository> {
		&self.repository
	}

	pub fn tabs(&self) -> &[PanelTab] {
		&self.tabs
	}

	/// Adds `tab` unless one with the same id exists; the first registration
	/// wins and the collision is logged. Returns whether the tab was added.
	pub fn add_tab(&mut self, tab: PanelTab) -> bool {
		if let Some(existing) = self.tabs.iter().find(|t| t.id == tab.id) {
			tracing::warn!(
				panel_id = %self.id,
				tab_id = %tab.id,
				kept_label = %existing.label,
				dropped_label = %tab.label,
				"panel tab id collision; keeping first registration"
			);
			return false;
		}
		self.tabs.push(tab);
		true
	}

	/// Named API routes served for this panel.
	pub fn routes(&self) -> Vec<(String, String)> {
		vec![
			(
				format!("{}.collection", self.id),
				format!("/api/{}", self.id),
			),
			(format!("{}.detail", self.id), format!("/api/{}/:id", self.id)),
		]
	}

	pub fn descriptor(&self) -> PanelDescriptor {
		PanelDescriptor {
			id: self.id.clone(),
			label: self.label.clone(),
			icon: self.icon.clone(),
			content_type: self.content_type.clone(),
			traits: self.traits.clone(),
			fields: self.fields.clone(),
			permissions: self.permissions.clone(),
			tabs: self.tabs.clone(),
			nav_item_id: self.nav_item_id.clone(),
			search: self.search,
			workflow: self.workflow,
			translations: self.translations,
		}
	}
}

impl fmt::Debug for Panel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Panel")
			.field("id", &self.id)
			.field("content_type", &self.content_type)
			.field("tabs", &self.tabs)
			.field("nav_item_id", &self.nav_item_id)
			.finish_non_exhaustive()
	}
}
