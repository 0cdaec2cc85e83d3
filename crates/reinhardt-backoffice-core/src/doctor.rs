//! Doctor checks
//!
//! Diagnostics run on demand. A panicking check is turned into an `error`
//! finding naming the check, and the remaining checks still run.

use crate::context::Context;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Info,
	Warning,
	Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
	/// Check (component) the finding is attributed to
	pub check: String,
	pub severity: Severity,
	pub message: String,
}

impl Finding {
	pub fn new(check: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
		Self {
			check: check.into(),
			severity,
			message: message.into(),
		}
	}

	pub fn info(check: impl Into<String>, message: impl Into<String>) -> Self {
		Self::new(check, Severity::Info, message)
	}

	pub fn warning(check: impl Into<String>, message: impl Into<String>) -> Self {
		Self::new(check, Severity::Warning, message)
	}

	pub fn error(check: impl Into<String>, message: impl Into<String>) -> Self {
		Self::new(check, Severity::Error, message)
	}
}

#[async_trait]
pub trait DoctorCheck: Send + Sync {
	fn name(&self) -> &str;

	async fn run(&self) -> Vec<Finding>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorReport {
	pub findings: Vec<Finding>,
}

impl DoctorReport {
	pub fn has_errors(&self) -> bool {
		self.count(Severity::Error) > 0
	}

	pub fn count(&self, severity: Severity) -> usize {
		self.findings
			.iter()
			.filter(|f| f.severity == severity)
			.count()
	}

	pub fn for_check<'a>(&'a self, check: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
		self.findings.iter().filter(move |f| f.check == check)
	}
}

#[derive(Default)]
pub struct DoctorRunner {
	checks: Vec<Arc<dyn DoctorCheck>>,
}

impl DoctorRunner {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&mut self, check: Arc<dyn DoctorCheck>) {
		self.checks.push(check);
	}

	pub fn with_check(mut self, check: Arc<dyn DoctorCheck>) -> Self {
		self.register(check);
		self
	}

	pub fn len(&self) -> usize {
		self.checks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.checks.is_empty()
	}

	/// Runs every check in registration order.
	///
	/// Stops early (with the findings gathered so far) when `ctx` is cancelled.
	pub async fn run_all(&self, ctx: &Context) -> DoctorReport {
		let mut report = DoctorReport::default();
		for check in &self.checks {
			if ctx.is_cancelled() {
				tracing::warn!("doctor run cancelled");
				break;
			}
			let name = check.name().to_string();
			match AssertUnwindSafe(check.run()).catch_unwind().await {
				Ok(findings) => report.findings.extend(findings),
				Err(payload) => {
					let reason = panic_message(payload.as_ref());
					tracing::error!(check = %name, reason = %reason, "doctor check panicked");
					report.findings.push(Finding::error(
						name,
						format!("check panicked: {}", reason),
					));
				}
			}
		}
		report
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		(*message).to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"unknown panic".to_string()
	}
}
