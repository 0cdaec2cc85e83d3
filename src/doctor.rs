//! Settings sanity check for the doctor runner.

use async_trait::async_trait;
use reinhardt_backoffice_core::{BackofficeSettings, DoctorCheck, Finding};

pub struct SettingsCheck {
	settings: BackofficeSettings,
}

impl SettingsCheck {
	pub fn new(settings: BackofficeSettings) -> Self {
		Self { settings }
	}
}

#[async_trait]
impl DoctorCheck for SettingsCheck {
	fn name(&self) -> &str {
		"settings"
	}

	async fn run(&self) -> Vec<Finding> {
		let settings = &self.settings;
		if let Err(err) = settings.validate() {
			return vec![Finding::error(self.name(), err.to_string())];
		}

		let mut findings = Vec::new();
		if settings.debug {
			findings.push(Finding::warning(
				self.name(),
				"debug is on: error envelopes include stack traces",
			));
		}
		if !settings.rate_limit.enabled {
			findings.push(Finding::warning(
				self.name(),
				"schema validate/preview rate limiting is disabled",
			));
		}
		if settings.features.translations && settings.translation.policies.is_empty() {
			findings.push(Finding::warning(
				self.name(),
				"translations are enabled but no translation policy is configured",
			));
		}
		if settings.translation.queue_auto_create && !settings.features.translation_queue {
			findings.push(Finding::info(
				self.name(),
				"translation.queue_auto_create is ignored while the translation_queue feature is off",
			));
		}
		if findings.is_empty() {
			findings.push(Finding::info(self.name(), "settings look sane"));
		}
		findings
	}
}
