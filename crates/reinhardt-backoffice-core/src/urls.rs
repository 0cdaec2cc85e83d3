//! URL namespaces for the admin and public surfaces.
//!
//! Each namespace owns a `base_path`, an `api_prefix` and an optional
//! `api_version`. Routes are stored as templates relative to the namespace's
//! API base and use `:name` segments for parameters.
//!
//! # Examples
//!
//! ```
//! use reinhardt_backoffice_core::urls::{UrlManager, ADMIN_NAMESPACE};
//! use reinhardt_backoffice_core::settings::UrlSettings;
//!
//! let manager = UrlManager::from_settings(&UrlSettings::default()).unwrap();
//! let url = manager
//! 	.resolve(ADMIN_NAMESPACE, "panels.detail", &[("panel", "article"), ("id", "42")])
//! 	.unwrap();
//! assert_eq!(url, "/admin/api/article/42");
//! ```

use crate::doctor::{DoctorCheck, Finding};
use crate::error::{BackofficeError, BackofficeResult};
use crate::settings::{NamespaceSettings, UrlSettings};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const ADMIN_NAMESPACE: &str = "admin";
pub const PUBLIC_NAMESPACE: &str = "public";

/// Admin routes the platform cannot run without.
pub const REQUIRED_ADMIN_ROUTES: [&str; 12] = [
	"content_types.validate",
	"content_types.preview",
	"block_definitions_meta.categories",
	"block_definitions_meta.field_types",
	"block_definitions_meta.diagnostics",
	"panels.collection",
	"panels.detail",
	"workflows.collection",
	"workflows.detail",
	"workflows.resolve",
	"workflow_bindings.collection",
	"workflow_bindings.detail",
];

/// Default admin API routes, relative to the admin API base.
pub fn default_admin_routes() -> Vec<(&'static str, &'static str)> {
	vec![
		("content_types.validate", "content_types/validate"),
		("content_types.preview", "content_types/preview"),
		(
			"block_definitions_meta.categories",
			"block_definitions_meta/categories",
		),
		(
			"block_definitions_meta.field_types",
			"block_definitions_meta/field_types",
		),
		(
			"block_definitions_meta.diagnostics",
			"block_definitions_meta/diagnostics",
		),
		("workflows.collection", "workflows"),
		("workflows.detail", "workflows/:id"),
		("workflows.resolve", "workflows/resolve"),
		("workflow_bindings.collection", "workflow_bindings"),
		("workflow_bindings.detail", "workflow_bindings/:id"),
		("panels.collection", ":panel"),
		("panels.detail", ":panel/:id"),
	]
}

pub fn default_public_routes() -> Vec<(&'static str, &'static str)> {
	vec![("content.detail", ":content_type/:id")]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlNamespace {
	name: String,
	base_path: String,
	api_prefix: String,
	api_version: Option<String>,
	routes: BTreeMap<String, String>,
}

impl UrlNamespace {
	pub fn new(
		name: impl Into<String>,
		base_path: impl Into<String>,
		api_prefix: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			base_path: base_path.into(),
			api_prefix: api_prefix.into(),
			api_version: None,
			routes: BTreeMap::new(),
		}
	}

	pub fn from_settings(name: impl Into<String>, settings: &NamespaceSettings) -> Self {
		let mut namespace = Self::new(name, &settings.base_path, &settings.api_prefix);
		namespace.api_version = settings.api_version.clone();
		namespace
	}

	pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
		self.api_version = Some(version.into());
		self
	}

	pub fn with_route(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
		self.add_route(name, template);
		self
	}

	pub fn add_route(&mut self, name: impl Into<String>, template: impl Into<String>) {
		self.routes.insert(name.into(), template.into());
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn base_path(&self) -> &str {
		&self.base_path
	}

	pub fn api_prefix(&self) -> &str {
		&self.api_prefix
	}

	pub fn api_version(&self) -> Option<&str> {
		self.api_version.as_deref()
	}

	pub fn has_route(&self, name: &str) -> bool {
		self.routes.contains_key(name)
	}

	pub fn routes(&self) -> impl Iterator<Item = (&str, &str)> {
		self.routes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// `base_path + api_prefix [+ api_version]`, always rooted and without a trailing slash.
	pub fn api_base(&self) -> String {
		let mut parts = vec![self.base_path.as_str(), self.api_prefix.as_str()];
		if let Some(version) = &self.api_version {
			parts.push(version);
		}
		join_path(&parts)
	}

	/// Resolve a named route, substituting `:param` segments.
	pub fn resolve(&self, route: &str, params: &[(&str, &str)]) -> BackofficeResult<String> {
		let template = self.routes.get(route).ok_or_else(|| {
			BackofficeError::not_found(format!("route '{}:{}' is not registered", self.name, route))
		})?;

		let mut segments = Vec::new();
		for segment in template.split('/').filter(|s| !s.is_empty()) {
			match segment.strip_prefix(':') {
				Some(param) => {
					let value = params
						.iter()
						.find(|(name, _)| *name == param)
						.map(|(_, value)| *value)
						.ok_or_else(|| {
							BackofficeError::validation(format!(
								"route '{}:{}' requires parameter '{}'",
								self.name, route, param
							))
						})?;
					segments.push(value);
				}
				None => segments.push(segment),
			}
		}

		let base = self.api_base();
		if segments.is_empty() {
			return Ok(base);
		}
		let base = base.trim_end_matches('/');
		Ok(format!("{}/{}", base, segments.join("/")))
	}

	/// Path below the API base, without the leading slash.
	///
	/// Returns `None` when `path` is outside this namespace's API.
	pub fn strip_api_base<'a>(&self, path: &'a str) -> Option<&'a str> {
		let base = self.api_base();
		let base = base.trim_end_matches('/');
		let rest = path.strip_prefix(base)?;
		if rest.is_empty() {
			return Some("");
		}
		let rest = rest.strip_prefix('/')?;
		Some(rest.trim_end_matches('/'))
	}
}

fn join_path(parts: &[&str]) -> String {
	let joined = parts
		.iter()
		.flat_map(|part| part.split('/'))
		.filter(|segment| !segment.is_empty())
		.collect::<Vec<_>>()
		.join("/");
	format!("/{}", joined)
}

/// Holds the `admin` and `public` namespaces.
#[derive(Debug, Clone)]
pub struct UrlManager {
	admin: UrlNamespace,
	public: UrlNamespace,
}

impl UrlManager {
	/// Builds a manager, failing with `SERVICE_UNAVAILABLE` when any
	/// `(namespace, route)` in `required` is missing.
	pub fn new(
		admin: UrlNamespace,
		public: UrlNamespace,
		required: &[(&str, &str)],
	) -> BackofficeResult<Self> {
		let manager = Self { admin, public };
		for (namespace, route) in required {
			let present = manager
				.namespace(namespace)
				.is_some_and(|ns| ns.has_route(route));
			if !present {
				tracing::error!(namespace = %namespace, route = %route, "required route missing");
				return Err(BackofficeError::service_unavailable(
					"url_manager",
					format!("required route '{}:{}' is not registered", namespace, route),
				)
				.with_metadata("namespace", *namespace)
				.with_metadata("route", *route));
			}
		}
		Ok(manager)
	}

	/// Manager with the default route tables.
	pub fn from_settings(settings: &UrlSettings) -> BackofficeResult<Self> {
		let mut admin = UrlNamespace::from_settings(ADMIN_NAMESPACE, &settings.admin);
		for (name, template) in default_admin_routes() {
			admin.add_route(name, template);
		}
		let mut public = UrlNamespace::from_settings(PUBLIC_NAMESPACE, &settings.public);
		for (name, template) in default_public_routes() {
			public.add_route(name, template);
		}
		Self::new(admin, public, &Self::required_routes())
	}

	pub fn required_routes() -> Vec<(&'static str, &'static str)> {
		REQUIRED_ADMIN_ROUTES
			.iter()
			.map(|route| (ADMIN_NAMESPACE, *route))
			.collect()
	}

	pub fn namespace(&self, name: &str) -> Option<&UrlNamespace> {
		match name {
			ADMIN_NAMESPACE => Some(&self.admin),
			PUBLIC_NAMESPACE => Some(&self.public),
			_ => None,
		}
	}

	pub fn admin(&self) -> &UrlNamespace {
		&self.admin
	}

	pub fn public(&self) -> &UrlNamespace {
		&self.public
	}

	pub fn resolve(
		&self,
		namespace: &str,
		route: &str,
		params: &[(&str, &str)],
	) -> BackofficeResult<String> {
		self.namespace(namespace)
			.ok_or_else(|| BackofficeError::not_found(format!("unknown namespace '{}'", namespace)))?
			.resolve(route, params)
	}
}

/// Doctor check: required routes are present and the two API bases differ.
pub struct UrlManagerCheck {
	manager: Arc<UrlManager>,
}

impl UrlManagerCheck {
	pub fn new(manager: Arc<UrlManager>) -> Self {
		Self { manager }
	}
}

#[async_trait]
impl DoctorCheck for UrlManagerCheck {
	fn name(&self) -> &str {
		"url_manager"
	}

	async fn run(&self) -> Vec<Finding> {
		let mut findings = Vec::new();
		for (namespace, route) in UrlManager::required_routes() {
			let present = self
				.manager
				.namespace(namespace)
				.is_some_and(|ns| ns.has_route(route));
			if !present {
				findings.push(Finding::error(
					self.name(),
					format!("required route '{}:{}' is missing", namespace, route),
				));
			}
		}
		if self.manager.admin.api_base() == self.manager.public.api_base() {
			findings.push(Finding::warning(
				self.name(),
				format!(
					"admin and public namespaces share the API base '{}'",
					self.manager.admin.api_base()
				),
			));
		}
		findings
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TextCode;
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn manager() -> UrlManager {
		UrlManager::from_settings(&UrlSettings::default()).unwrap()
	}

	#[rstest]
	fn test_api_base_joins_segments(manager: UrlManager) {
		assert_eq!(manager.admin().api_base(), "/admin/api");
		assert_eq!(manager.public().api_base(), "/api");
	}

	#[rstest]
	fn test_api_version_is_appended() {
		// Arrange
		let ns = UrlNamespace::new("admin", "/admin/", "api").with_api_version("v2");

		// Act & Assert
		assert_eq!(ns.api_base(), "/admin/api/v2");
	}

	#[rstest]
	#[case("content_types.validate", &[], "/admin/api/content_types/validate")]
	#[case("workflows.detail", &[("id", "w1")], "/admin/api/workflows/w1")]
	#[case("panels.collection", &[("panel", "article")], "/admin/api/article")]
	fn test_resolve(
		manager: UrlManager,
		#[case] route: &str,
		#[case] params: &[(&str, &str)],
		#[case] expected: &str,
	) {
		assert_eq!(manager.resolve(ADMIN_NAMESPACE, route, params).unwrap(), expected);
	}

	#[rstest]
	fn test_resolve_missing_param(manager: UrlManager) {
		// Act
		let err = manager
			.resolve(ADMIN_NAMESPACE, "panels.detail", &[("panel", "article")])
			.unwrap_err();

		// Assert
		assert_eq!(err.text_code(), TextCode::ValidationError);
	}

	#[rstest]
	fn test_missing_required_route_is_service_unavailable() {
		// Arrange
		let admin = UrlNamespace::new(ADMIN_NAMESPACE, "/admin", "/api")
			.with_route("content_types.validate", "content_types/validate");
		let public = UrlNamespace::new(PUBLIC_NAMESPACE, "/", "/api");

		// Act
		let err = UrlManager::new(admin, public, &UrlManager::required_routes()).unwrap_err();

		// Assert
		assert_eq!(err.text_code(), TextCode::ServiceUnavailable);
		assert_eq!(err.metadata_value("component"), Some(&json!("url_manager")));
		assert_eq!(err.metadata_value("route"), Some(&json!("content_types.preview")));
	}

	#[rstest]
	#[case("/admin/api/content_types/validate", Some("content_types/validate"))]
	#[case("/admin/api/article/1/", Some("article/1"))]
	#[case("/admin/api", Some(""))]
	#[case("/admin/apix/article", None)]
	#[case("/public/article", None)]
	fn test_strip_api_base(
		manager: UrlManager,
		#[case] path: &str,
		#[case] expected: Option<&str>,
	) {
		assert_eq!(manager.admin().strip_api_base(path), expected);
	}

	#[rstest]
	#[tokio::test]
	async fn test_doctor_check_passes_for_defaults(manager: UrlManager) {
		// Arrange
		let check = UrlManagerCheck::new(Arc::new(manager));

		// Act
		let findings = check.run().await;

		// Assert
		assert!(findings.is_empty());
	}
}
