//! Panel permissions
//!
//! [`PermissionRegistry`] receives the codenames of each registered panel;
//! [`PermissionChecker`] decides whether the current actor may perform an
//! action on a panel.

use crate::error::PanelResult;
use crate::panel::{Panel, PanelAction, PanelPermissions};
use async_trait::async_trait;
use parking_lot::RwLock;
use reinhardt_backoffice_core::Context;
use std::collections::{BTreeSet, HashMap};

#[async_trait]
pub trait PermissionRegistry: Send + Sync {
	async fn register(&self, ctx: &Context, panel_id: &str, permissions: &PanelPermissions) -> PanelResult<()>;

	async fn unregister(&self, ctx: &Context, panel_id: &str) -> PanelResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryPermissionRegistry {
	codenames: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl InMemoryPermissionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn contains(&self, codename: &str) -> bool {
		self.codenames.read().values().any(|set| set.contains(codename))
	}

	pub fn panel_ids(&self) -> Vec<String> {
		let mut ids: Vec<String> = self.codenames.read().keys().cloned().collect();
		ids.sort();
		ids
	}
}

#[async_trait]
impl PermissionRegistry for InMemoryPermissionRegistry {
	async fn register(&self, ctx: &Context, panel_id: &str, permissions: &PanelPermissions) -> PanelResult<()> {
		ctx.check()?;
		let codenames = permissions.all().iter().map(|c| c.to_string()).collect();
		self.codenames.write().insert(panel_id.to_string(), codenames);
		Ok(())
	}

	async fn unregister(&self, ctx: &Context, panel_id: &str) -> PanelResult<()> {
		ctx.check()?;
		self.codenames.write().remove(panel_id);
		Ok(())
	}
}

/// Decides whether the actor in `ctx` may perform `action` on `panel`.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
	async fn has_permission(&self, ctx: &Context, panel: &Panel, action: PanelAction) -> bool;
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PermissionChecker for AllowAll {
	async fn has_permission(&self, _ctx: &Context, _panel: &Panel, _action: PanelAction) -> bool {
		true
	}
}

/// Codenames granted per actor id. Anonymous contexts get nothing.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionChecker {
	grants: HashMap<String, BTreeSet<String>>,
}

impl StaticPermissionChecker {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn grant<I, S>(mut self, actor: impl Into<String>, codenames: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.grants
			.entry(actor.into())
			.or_default()
			.extend(codenames.into_iter().map(Into::into));
		self
	}
}

#[async_trait]
impl PermissionChecker for StaticPermissionChecker {
	async fn has_permission(&self, ctx: &Context, panel: &Panel, action: PanelAction) -> bool {
		let Some(actor) = ctx.actor() else {
			return false;
		};
		self.grants
			.get(actor)
			.is_some_and(|granted| granted.contains(panel.permissions.codename(action)))
	}
}
