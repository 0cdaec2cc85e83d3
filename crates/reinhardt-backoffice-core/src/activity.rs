//! Activity sink
//!
//! Components report what they did (panel registered, transition applied,
//! assignment created) to an [`ActivitySink`]. Recording is fire-and-forget:
//! a failing sink is logged and counted, never surfaced to the caller.

use crate::error::BackofficeError;
use crate::metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of activity recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
	ContentTypeSaved,
	ContentTypeDeleted,
	PanelRegistered,
	PanelRefreshed,
	PanelRemoved,
	WorkflowTransitioned,
	AssignmentCreated,
	AssignmentReused,
}

impl ActivityAction {
	pub fn as_str(&self) -> &'static str {
		match self {
			ActivityAction::ContentTypeSaved => "content_type_saved",
			ActivityAction::ContentTypeDeleted => "content_type_deleted",
			ActivityAction::PanelRegistered => "panel_registered",
			ActivityAction::PanelRefreshed => "panel_refreshed",
			ActivityAction::PanelRemoved => "panel_removed",
			ActivityAction::WorkflowTransitioned => "workflow_transitioned",
			ActivityAction::AssignmentCreated => "assignment_created",
			ActivityAction::AssignmentReused => "assignment_reused",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
	pub action: ActivityAction,
	pub actor: Option<String>,
	pub object_type: String,
	pub object_id: String,
	#[serde(default)]
	pub metadata: Map<String, Value>,
	pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
	pub fn new(
		action: ActivityAction,
		object_type: impl Into<String>,
		object_id: impl Into<String>,
	) -> Self {
		Self {
			action,
			actor: None,
			object_type: object_type.into(),
			object_id: object_id.into(),
			metadata: Map::new(),
			timestamp: Utc::now(),
		}
	}

	pub fn with_actor(mut self, actor: Option<&str>) -> Self {
		self.actor = actor.map(str::to_string);
		self
	}

	pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.metadata.insert(key.into(), value.into());
		self
	}
}

#[async_trait]
pub trait ActivitySink: Send + Sync {
	async fn record(&self, event: ActivityEvent) -> Result<(), BackofficeError>;
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActivitySink;

#[async_trait]
impl ActivitySink for NoopActivitySink {
	async fn record(&self, _event: ActivityEvent) -> Result<(), BackofficeError> {
		Ok(())
	}
}

/// Keeps events in memory, in arrival order.
#[derive(Debug, Default)]
pub struct InMemoryActivitySink {
	events: Mutex<Vec<ActivityEvent>>,
}

impl InMemoryActivitySink {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn events(&self) -> Vec<ActivityEvent> {
		self.events.lock().clone()
	}

	pub fn actions(&self) -> Vec<ActivityAction> {
		self.events.lock().iter().map(|e| e.action).collect()
	}
}

#[async_trait]
impl ActivitySink for InMemoryActivitySink {
	async fn record(&self, event: ActivityEvent) -> Result<(), BackofficeError> {
		self.events.lock().push(event);
		Ok(())
	}
}

/// Fire-and-forget recording.
pub async fn emit(sink: &dyn ActivitySink, event: ActivityEvent) {
	let action = event.action;
	if let Err(err) = sink.record(event).await {
		tracing::warn!(
			action = action.as_str(),
			error = %err,
			"activity sink failed"
		);
		metrics::record_side_effect_failure("activity");
	}
}
