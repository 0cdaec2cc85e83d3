//! Panel record repositories
//!
//! Panels delegate storage to a [`PanelRepository`]. The in-memory
//! implementation carries the autosave version token and path uniqueness
//! semantics every backing store must honour.

use crate::error::{PanelError, PanelResult};
use crate::fields::FieldSets;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use reinhardt_backoffice_core::{BackofficeError, ContentType, Context};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Field holding a record's public path
pub const PATH_FIELD: &str = "path";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRecord {
	pub id: String,
	/// Autosave version token
	pub version: u64,
	pub data: Map<String, Value>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl PanelRecord {
	pub fn field(&self, name: &str) -> Option<&Value> {
		self.data.get(name)
	}

	pub fn str_field(&self, name: &str) -> Option<&str> {
		self.data.get(name).and_then(Value::as_str)
	}

	/// Flattened JSON form returned by the API.
	pub fn to_json(&self) -> Value {
		let mut out = self.data.clone();
		out.insert("id".into(), Value::from(self.id.clone()));
		out.insert("version".into(), Value::from(self.version));
		out.insert("created_at".into(), Value::from(self.created_at.to_rfc3339()));
		out.insert("updated_at".into(), Value::from(self.updated_at.to_rfc3339()));
		Value::Object(out)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
	pub search: Option<String>,
	/// Exact-match filters
	pub filters: BTreeMap<String, Value>,
	pub offset: usize,
	pub limit: Option<usize>,
}

impl Default for ListQuery {
	fn default() -> Self {
		Self {
			search: None,
			filters: BTreeMap::new(),
			offset: 0,
			limit: None,
		}
	}
}

impl ListQuery {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_search(mut self, term: impl Into<String>) -> Self {
		self.search = Some(term.into());
		self
	}

	pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
		self.filters.insert(field.into(), value.into());
		self
	}

	pub fn paginate(mut self, offset: usize, limit: usize) -> Self {
		self.offset = offset;
		self.limit = Some(limit);
		self
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
	pub items: Vec<PanelRecord>,
	pub total: usize,
}

/// Storage capability set a panel depends on
#[async_trait]
pub trait PanelRepository: Send + Sync {
	async fn list(&self, ctx: &Context, query: &ListQuery) -> PanelResult<ListPage>;

	async fn get(&self, ctx: &Context, id: &str) -> PanelResult<PanelRecord>;

	async fn create(&self, ctx: &Context, data: Map<String, Value>) -> PanelResult<PanelRecord>;

	/// Replaces the record data. With `expected_version` set the write only
	/// succeeds when it matches the stored version token.
	async fn update(
		&self,
		ctx: &Context,
		id: &str,
		data: Map<String, Value>,
		expected_version: Option<u64>,
	) -> PanelResult<PanelRecord>;

	async fn delete(&self, ctx: &Context, id: &str) -> PanelResult<()>;
}

pub struct InMemoryPanelRepository {
	panel_id: String,
	search_fields: RwLock<Vec<String>>,
	records: RwLock<Vec<PanelRecord>>,
}

impl InMemoryPanelRepository {
	pub fn new(panel_id: impl Into<String>) -> Self {
		Self {
			panel_id: panel_id.into(),
			search_fields: RwLock::new(Vec::new()),
			records: RwLock::new(Vec::new()),
		}
	}

	/// Restricts search to `fields`; every string field is searched otherwise.
	pub fn with_search_fields<I, S>(mut self, fields: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		*self.search_fields.get_mut() = fields.into_iter().map(Into::into).collect();
		self
	}

	/// Replaces the searched fields, e.g. after the panel schema changed.
	pub fn set_search_fields<I, S>(&self, fields: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		*self.search_fields.write() = fields.into_iter().map(Into::into).collect();
	}

	pub fn search_fields(&self) -> Vec<String> {
		self.search_fields.read().clone()
	}

	pub fn len(&self) -> usize {
		self.records.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.read().is_empty()
	}

	fn not_found(&self, id: &str) -> PanelError {
		PanelError::RecordNotFound {
			panel_id: self.panel_id.clone(),
			id: id.to_string(),
		}
	}

	fn ensure_unique_path(
		&self,
		records: &[PanelRecord],
		data: &Map<String, Value>,
		own_id: Option<&str>,
	) -> PanelResult<()> {
		let Some(path) = data.get(PATH_FIELD).and_then(Value::as_str) else {
			return Ok(());
		};
		let clash = records
			.iter()
			.find(|r| Some(r.id.as_str()) != own_id && r.str_field(PATH_FIELD) == Some(path));
		match clash {
			Some(existing) => Err(PanelError::PathConflict {
				panel_id: self.panel_id.clone(),
				path: path.to_string(),
				existing_id: existing.id.clone(),
			}),
			None => Ok(()),
		}
	}

	fn matches(&self, record: &PanelRecord, query: &ListQuery) -> bool {
		let filtered = query
			.filters
			.iter()
			.all(|(field, expected)| record.field(field) == Some(expected));
		if !filtered {
			return false;
		}
		let Some(term) = query.search.as_deref().filter(|t| !t.is_empty()) else {
			return true;
		};
		let term = term.to_lowercase();
		let hit = |value: &Value| {
			value
				.as_str()
				.is_some_and(|s| s.to_lowercase().contains(&term))
		};
		let search_fields = self.search_fields.read();
		if search_fields.is_empty() {
			record.data.values().any(hit)
		} else {
			search_fields
				.iter()
				.filter_map(|f| record.field(f))
				.any(hit)
		}
	}
}

#[async_trait]
impl PanelRepository for InMemoryPanelRepository {
	async fn list(&self, ctx: &Context, query: &ListQuery) -> PanelResult<ListPage> {
		ctx.check()?;
		let records = self.records.read();
		let matched: Vec<&PanelRecord> = records.iter().filter(|r| self.matches(r, query)).collect();
		let total = matched.len();
		let items = matched
			.into_iter()
			.skip(query.offset)
			.take(query.limit.unwrap_or(usize::MAX))
			.cloned()
			.collect();
		Ok(ListPage { items, total })
	}

	async fn get(&self, ctx: &Context, id: &str) -> PanelResult<PanelRecord> {
		ctx.check()?;
		self.records
			.read()
			.iter()
			.find(|r| r.id == id)
			.cloned()
			.ok_or_else(|| self.not_found(id))
	}

	async fn create(&self, ctx: &Context, mut data: Map<String, Value>) -> PanelResult<PanelRecord> {
		ctx.check()?;
		let id = match data.remove("id") {
			Some(Value::String(id)) if !id.is_empty() => id,
			_ => uuid::Uuid::new_v4().to_string(),
		};
		data.remove("version");

		let mut records = self.records.write();
		if records.iter().any(|r| r.id == id) {
			return Err(PanelError::Core(BackofficeError::conflict(format!(
				"record '{}' already exists in panel '{}'",
				id, self.panel_id
			))));
		}
		self.ensure_unique_path(&records, &data, None)?;

		let now = Utc::now();
		let record = PanelRecord {
			id,
			version: 1,
			data,
			created_at: now,
			updated_at: now,
		};
		records.push(record.clone());
		Ok(record)
	}

	async fn update(
		&self,
		ctx: &Context,
		id: &str,
		mut data: Map<String, Value>,
		expected_version: Option<u64>,
	) -> PanelResult<PanelRecord> {
		ctx.check()?;
		data.remove("id");
		data.remove("version");

		let mut records = self.records.write();
		self.ensure_unique_path(&records, &data, Some(id))?;
		let record = records
			.iter_mut()
			.find(|r| r.id == id)
			.ok_or_else(|| self.not_found(id))?;
		if let Some(expected) = expected_version
			&& expected != record.version
		{
			return Err(PanelError::StaleVersion {
				panel_id: self.panel_id.clone(),
				id: id.to_string(),
				expected,
				actual: record.version,
				latest_server_state: record.to_json(),
			});
		}
		record.data = data;
		record.version += 1;
		record.updated_at = Utc::now();
		Ok(record.clone())
	}

	async fn delete(&self, ctx: &Context, id: &str) -> PanelResult<()> {
		ctx.check()?;
		let mut records = self.records.write();
		let before = records.len();
		records.retain(|r| r.id != id);
		if records.len() == before {
			return Err(self.not_found(id));
		}
		Ok(())
	}
}

/// Supplies the repository a panel is bound to.
pub trait RepositoryProvider: Send + Sync {
	fn repository_for(
		&self,
		content_type: &ContentType,
		fields: &FieldSets,
	) -> PanelResult<Arc<dyn PanelRepository>>;

	/// Called once a panel is removed; the next `repository_for` of the
	/// same panel id starts from an empty repository.
	fn release(&self, _panel_id: &str) {}
}

/// Hands out one in-memory repository per panel id and keeps it across
/// refreshes, so rebuilding a panel never drops its records. Search fields
/// follow the latest field sets; removing the panel drops the repository.
#[derive(Default)]
pub struct InMemoryRepositoryProvider {
	repositories: DashMap<String, Arc<InMemoryPanelRepository>>,
}

impl InMemoryRepositoryProvider {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, panel_id: &str) -> Option<Arc<InMemoryPanelRepository>> {
		self.repositories.get(panel_id).map(|r| Arc::clone(r.value()))
	}
}

impl RepositoryProvider for InMemoryRepositoryProvider {
	fn repository_for(
		&self,
		content_type: &ContentType,
		fields: &FieldSets,
	) -> PanelResult<Arc<dyn PanelRepository>> {
		let panel_id = content_type.panel_id();
		let repository = self
			.repositories
			.entry(panel_id.to_string())
			.or_insert_with(|| Arc::new(InMemoryPanelRepository::new(panel_id)))
			.clone();
		repository.set_search_fields(fields.search.iter().cloned());
		Ok(repository)
	}

	fn release(&self, panel_id: &str) {
		if self.repositories.remove(panel_id).is_some() {
			tracing::debug!(panel_id, "panel repository released");
		}
	}
}
