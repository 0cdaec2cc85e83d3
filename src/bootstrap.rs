//! Wiring of every back-office service from [`BackofficeSettings`].
//!
//! The builder validates settings and feature switches before anything is
//! constructed, so an inconsistent configuration fails with
//! `INVALID_FEATURE_CONFIG` instead of a half-wired platform.

use crate::doctor::SettingsCheck;
use reinhardt_backoffice_core::urls::UrlManagerCheck;
use reinhardt_backoffice_core::{
	ActivitySink, BackofficeResult, BackofficeSettings, DoctorReport, DoctorRunner, ErrorPresenter,
	Feature, FeatureGate, NoopActivitySink, UrlManager, Context, metrics,
};
use reinhardt_backoffice_panels::{
	AdminRegistry, AllowAll, ContentTypeRepository, ContentTypeService, InMemoryContentTypeRepository,
	InMemoryMenuService, InMemoryPermissionRegistry, InMemoryRepositoryProvider,
	InMemorySearchRegistry, MenuService, PanelCrudOptions, PanelCrudService, PanelFactory,
	PanelNavigationCheck, PermissionChecker, RepositoryProvider,
};
use reinhardt_backoffice_schema::{
	BlockDefinitionMeta, BlockDefinitionService, FormGenerator, InMemoryBlockDefinitionService,
	SchemaGuardrails, SchemaValidator,
};
use reinhardt_backoffice_workflow::{
	AssignmentRepository, InMemoryAssignmentRepository, InMemoryBindingRepository,
	InMemoryTranslationChecker, InMemoryWorkflowRepository, StaticPolicyResolver, TranslationChecker,
	TranslationGate, TranslationQueueHook, WorkflowRuntime, WorkflowService,
};
use std::sync::Arc;

/// Fully wired platform.
pub struct Backoffice {
	settings: BackofficeSettings,
	features: FeatureGate,
	urls: Arc<UrlManager>,
	presenter: ErrorPresenter,
	validator: Arc<SchemaValidator>,
	blocks: Arc<BlockDefinitionMeta>,
	factory: Arc<PanelFactory>,
	content_types: Arc<ContentTypeService>,
	crud: Arc<PanelCrudService>,
	workflows: Arc<WorkflowService>,
	runtime: Arc<WorkflowRuntime>,
	doctor: DoctorRunner,
}

impl Backoffice {
	pub fn builder(settings: BackofficeSettings) -> BackofficeBuilder {
		BackofficeBuilder::new(settings)
	}

	/// Platform with default settings and in-memory storage.
	pub fn in_memory() -> BackofficeResult<Self> {
		BackofficeBuilder::new(BackofficeSettings::default()).build()
	}

	pub fn settings(&self) -> &BackofficeSettings {
		&self.settings
	}

	pub fn features(&self) -> &FeatureGate {
		&self.features
	}

	pub fn urls(&self) -> &Arc<UrlManager> {
		&self.urls
	}

	pub fn presenter(&self) -> ErrorPresenter {
		self.presenter
	}

	pub fn validator(&self) -> &Arc<SchemaValidator> {
		&self.validator
	}

	pub fn blocks(&self) -> &Arc<BlockDefinitionMeta> {
		&self.blocks
	}

	pub fn registry(&self) -> &Arc<AdminRegistry> {
		self.factory.registry()
	}

	pub fn factory(&self) -> &Arc<PanelFactory> {
		&self.factory
	}

	pub fn content_types(&self) -> &Arc<ContentTypeService> {
		&self.content_types
	}

	pub fn crud(&self) -> &Arc<PanelCrudService> {
		&self.crud
	}

	pub fn workflows(&self) -> &Arc<WorkflowService> {
		&self.workflows
	}

	pub fn runtime(&self) -> &Arc<WorkflowRuntime> {
		&self.runtime
	}

	/// Runs every registered doctor check.
	pub async fn doctor(&self, ctx: &Context) -> DoctorReport {
		self.doctor.run_all(ctx).await
	}
}

/// Builder for [`Backoffice`]. Every collaborator defaults to its
/// in-memory implementation.
pub struct BackofficeBuilder {
	settings: BackofficeSettings,
	permission_checker: Arc<dyn PermissionChecker>,
	form_generator: Option<Arc<dyn FormGenerator>>,
	translation_checker: Arc<dyn TranslationChecker>,
	assignments: Arc<dyn AssignmentRepository>,
	block_service: Arc<dyn BlockDefinitionService>,
	content_type_repository: Arc<dyn ContentTypeRepository>,
	repositories: Arc<dyn RepositoryProvider>,
	menu: Arc<dyn MenuService>,
	activity: Arc<dyn ActivitySink>,
	crud_options: PanelCrudOptions,
}

impl BackofficeBuilder {
	pub fn new(settings: BackofficeSettings) -> Self {
		Self {
			settings,
			permission_checker: Arc::new(AllowAll),
			form_generator: None,
			translation_checker: Arc::new(InMemoryTranslationChecker::new()),
			assignments: Arc::new(InMemoryAssignmentRepository::new()),
			block_service: Arc::new(InMemoryBlockDefinitionService::new()),
			content_type_repository: Arc::new(InMemoryContentTypeRepository::new()),
			repositories: Arc::new(InMemoryRepositoryProvider::new()),
			menu: Arc::new(InMemoryMenuService::new()),
			activity: Arc::new(NoopActivitySink),
			crud_options: PanelCrudOptions::default(),
		}
	}

	pub fn with_permission_checker(mut self, checker: Arc<dyn PermissionChecker>) -> Self {
		self.permission_checker = checker;
		self
	}

	/// Enables `preview`; without a generator preview is `SERVICE_UNAVAILABLE`.
	pub fn with_form_generator(mut self, generator: Arc<dyn FormGenerator>) -> Self {
		self.form_generator = Some(generator);
		self
	}

	pub fn with_translation_checker(mut self, checker: Arc<dyn TranslationChecker>) -> Self {
		self.translation_checker = checker;
		self
	}

	pub fn with_assignments(mut self, assignments: Arc<dyn AssignmentRepository>) -> Self {
		self.assignments = assignments;
		self
	}

	pub fn with_block_service(mut self, service: Arc<dyn BlockDefinitionService>) -> Self {
		self.block_service = service;
		self
	}

	pub fn with_content_type_repository(mut self, repository: Arc<dyn ContentTypeRepository>) -> Self {
		self.content_type_repository = repository;
		self
	}

	pub fn with_repositories(mut self, repositories: Arc<dyn RepositoryProvider>) -> Self {
		self.repositories = repositories;
		self
	}

	pub fn with_menu(mut self, menu: Arc<dyn MenuService>) -> Self {
		self.menu = menu;
		self
	}

	pub fn with_activity(mut self, activity: Arc<dyn ActivitySink>) -> Self {
		self.activity = activity;
		self
	}

	pub fn with_crud_options(mut self, options: PanelCrudOptions) -> Self {
		self.crud_options = options;
		self
	}

	pub fn build(self) -> BackofficeResult<Backoffice> {
		let settings = self.settings;
		settings.validate()?;
		let features = FeatureGate::from_settings(&settings.features)?;
		metrics::describe_all();

		let urls = Arc::new(UrlManager::from_settings(&settings.urls)?);

		let mut validator = SchemaValidator::from_settings(&settings);
		if let Some(generator) = self.form_generator {
			validator = validator.with_generator(generator);
		}
		let blocks = BlockDefinitionMeta::new(self.block_service);

		let workflows = WorkflowService::new(
			Arc::new(InMemoryWorkflowRepository::new()),
			Arc::new(InMemoryBindingRepository::new()),
		)
		.with_features(features.clone());
		let mut runtime = WorkflowRuntime::new(workflows.resolver().clone(), workflows.workflows())
			.with_features(features.clone())
			.with_activity(self.activity.clone());
		if features.is_enabled(Feature::Translations) {
			let policies = StaticPolicyResolver::from_settings(&settings.translation)?;
			runtime = runtime.with_gate(TranslationGate::new(
				Arc::new(policies),
				self.translation_checker,
			));
		}
		if features.is_enabled(Feature::TranslationQueue) && settings.translation.queue_auto_create {
			let hook = TranslationQueueHook::from_settings(self.assignments, &settings.translation)?
				.with_activity(self.activity.clone());
			runtime = runtime.with_queue_hook(hook);
		}
		let runtime = Arc::new(runtime);

		let registry = Arc::new(AdminRegistry::new());
		let factory = Arc::new(
			PanelFactory::new(
				registry.clone(),
				self.menu.clone(),
				Arc::new(InMemoryPermissionRegistry::new()),
				self.repositories,
			)
			.with_search(Arc::new(InMemorySearchRegistry::new()))
			.with_navigation(settings.navigation.clone())
			.with_activity(self.activity.clone()),
		);
		let content_types = Arc::new(
			ContentTypeService::new(self.content_type_repository, factory.clone())
				.with_guardrails(SchemaGuardrails::from_settings(&settings.guardrails))
				.with_activity(self.activity.clone()),
		);
		let mut crud = PanelCrudService::new(registry.clone(), self.permission_checker)
			.with_options(self.crud_options);
		if features.is_enabled(Feature::Workflows) {
			crud = crud.with_runtime(runtime.clone());
		}

		let doctor = DoctorRunner::new()
			.with_check(Arc::new(SettingsCheck::new(settings.clone())))
			.with_check(Arc::new(UrlManagerCheck::new(urls.clone())))
			.with_check(Arc::new(PanelNavigationCheck::new(
				registry,
				self.menu,
				settings.navigation.menu.clone(),
			)));

		tracing::info!(
			workflows = features.is_enabled(Feature::Workflows),
			translations = features.is_enabled(Feature::Translations),
			translation_queue = features.is_enabled(Feature::TranslationQueue),
			block_library = features.is_enabled(Feature::BlockLibrary),
			admin_api = %urls.admin().api_base(),
			"back-office initialized"
		);

		Ok(Backoffice {
			presenter: ErrorPresenter::new(settings.debug),
			settings,
			features,
			urls,
			validator: Arc::new(validator),
			blocks: Arc::new(blocks),
			factory,
			content_types,
			crud: Arc::new(crud),
			workflows: Arc::new(workflows),
			runtime,
			doctor,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use reinhardt_backoffice_core::{Severity, TextCode};
	use rstest::rstest;

	#[rstest]
	fn test_inconsistent_features_fail_at_build() {
		// Arrange
		let mut settings = BackofficeSettings::default();
		settings.features.translations = false;

		// Act
		let err = Backoffice::builder(settings).build().err().unwrap();

		// Assert
		assert_eq!(err.text_code(), TextCode::InvalidFeatureConfig);
	}

	#[rstest]
	#[tokio::test]
	async fn test_fresh_platform_passes_doctor() {
		// Arrange
		let backoffice = Backoffice::in_memory().unwrap();

		// Act
		let report = backoffice.doctor(&Context::new()).await;

		// Assert
		assert!(!report.has_errors());
		assert_eq!(report.for_check("panel_navigation").count(), 1);
		assert_eq!(report.count(Severity::Error), 0);
	}
}
