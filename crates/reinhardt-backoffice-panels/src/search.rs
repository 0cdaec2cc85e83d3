//! Search adapter registration for panels with search enabled.

use crate::error::PanelResult;
use async_trait::async_trait;
use dashmap::DashMap;
use reinhardt_backoffice_core::Context;

#[async_trait]
pub trait SearchRegistry: Send + Sync {
	/// Registers or replaces the searchable fields of a panel.
	async fn register(&self, ctx: &Context, panel_id: &str, fields: &[String]) -> PanelResult<()>;

	async fn unregister(&self, ctx: &Context, panel_id: &str) -> PanelResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemorySearchRegistry {
	adapters: DashMap<String, Vec<String>>,
}

impl InMemorySearchRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn fields(&self, panel_id: &str) -> Option<Vec<String>> {
		self.adapters.get(panel_id).map(|f| f.value().clone())
	}

	pub fn contains(&self, panel_id: &str) -> bool {
		self.adapters.contains_key(panel_id)
	}
}

#[async_trait]
impl SearchRegistry for InMemorySearchRegistry {
	async fn register(&self, ctx: &Context, panel_id: &str, fields: &[String]) -> PanelResult<()> {
		ctx.check()?;
		self.adapters.insert(panel_id.to_string(), fields.to_vec());
		Ok(())
	}

	async fn unregister(&self, ctx: &Context, panel_id: &str) -> PanelResult<()> {
		ctx.check()?;
		self.adapters.remove(panel_id);
		Ok(())
	}
}
