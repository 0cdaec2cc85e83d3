//! Feature switches checked at the edges of each component.

use crate::error::{BackofficeError, BackofficeResult};
use crate::settings::FeatureSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
	Workflows,
	Translations,
	TranslationQueue,
	BlockLibrary,
}

impl Feature {
	pub fn as_str(self) -> &'static str {
		match self {
			Feature::Workflows => "workflows",
			Feature::Translations => "translations",
			Feature::TranslationQueue => "translation_queue",
			Feature::BlockLibrary => "block_library",
		}
	}
}

impl fmt::Display for Feature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGate {
	enabled: HashSet<Feature>,
}

impl Default for FeatureGate {
	fn default() -> Self {
		Self::all()
	}
}

impl FeatureGate {
	pub fn all() -> Self {
		Self {
			enabled: HashSet::from([
				Feature::Workflows,
				Feature::Translations,
				Feature::TranslationQueue,
				Feature::BlockLibrary,
			]),
		}
	}

	pub fn none() -> Self {
		Self {
			enabled: HashSet::new(),
		}
	}

	/// Gate from settings; inconsistent switches are `INVALID_FEATURE_CONFIG`.
	pub fn from_settings(settings: &FeatureSettings) -> BackofficeResult<Self> {
		settings.validate()?;
		let mut gate = Self::none();
		for (feature, on) in [
			(Feature::Workflows, settings.workflows),
			(Feature::Translations, settings.translations),
			(Feature::TranslationQueue, settings.translation_queue),
			(Feature::BlockLibrary, settings.block_library),
		] {
			if on {
				gate.enabled.insert(feature);
			}
		}
		Ok(gate)
	}

	pub fn with(mut self, feature: Feature) -> Self {
		self.enabled.insert(feature);
		self
	}

	pub fn without(mut self, feature: Feature) -> Self {
		self.enabled.remove(&feature);
		self
	}

	pub fn is_enabled(&self, feature: Feature) -> bool {
		self.enabled.contains(&feature)
	}

	/// `FEATURE_DISABLED` unless `feature` is on.
	pub fn require(&self, feature: Feature) -> BackofficeResult<()> {
		if self.is_enabled(feature) {
			Ok(())
		} else {
			Err(BackofficeError::feature_disabled(feature.as_str()))
		}
	}
}
