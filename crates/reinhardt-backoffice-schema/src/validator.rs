//! Schema validation and preview
//!
//! Both entry points run the same pipeline: rate limit, guardrails,
//! normalization, then compilation through the form generator. Preview also
//! renders the compiled form.

use crate::error::{SchemaError, SchemaResult};
use crate::formgen::{
	DefaultFormGenerator, FormDefinition, FormGenerator, FormRequest, HybridJsonTransformer,
};
use crate::guardrails::{SchemaGuardrails, SchemaValidation};
use crate::normalize::{NormalizeOptions, NormalizedSchema, SchemaNormalizer};
use crate::rate_limit::RateLimiter;
use reinhardt_backoffice_core::Context;
use reinhardt_backoffice_core::settings::BackofficeSettings;
use serde_json::Value;
use std::sync::Arc;

pub type ValidateOptions = NormalizeOptions;

/// Rate-limit key for requests without a client key.
pub const ANONYMOUS_CLIENT: &str = "anonymous";

#[derive(Clone, Default)]
pub struct SchemaValidator {
	guardrails: SchemaGuardrails,
	normalizer: SchemaNormalizer,
	generator: Option<Arc<dyn FormGenerator>>,
	rate_limiter: Option<Arc<RateLimiter>>,
}

impl std::fmt::Debug for SchemaValidator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SchemaValidator")
			.field("guardrails", &self.guardrails)
			.field("generator", &self.generator.is_some())
			.field("rate_limiter", &self.rate_limiter)
			.finish()
	}
}

impl SchemaValidator {
	pub fn new(guardrails: SchemaGuardrails) -> Self {
		Self {
			guardrails,
			..Self::default()
		}
	}

	/// Guardrails and rate limiter from settings, no generator.
	pub fn from_settings(settings: &BackofficeSettings) -> Self {
		let mut validator = Self::new(SchemaGuardrails::from_settings(&settings.guardrails));
		if settings.rate_limit.enabled {
			validator.rate_limiter = Some(Arc::new(RateLimiter::from_settings(&settings.rate_limit)));
		}
		validator
	}

	pub fn with_generator(mut self, generator: Arc<dyn FormGenerator>) -> Self {
		self.generator = Some(generator);
		self
	}

	pub fn with_normalizer(mut self, normalizer: SchemaNormalizer) -> Self {
		self.normalizer = normalizer;
		self
	}

	pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
		self.rate_limiter = Some(limiter);
		self
	}

	pub fn guardrails(&self) -> &SchemaGuardrails {
		&self.guardrails
	}

	pub fn has_generator(&self) -> bool {
		self.generator.is_some()
	}

	fn throttle(&self, ctx: &Context) -> SchemaResult<()> {
		if let Some(limiter) = &self.rate_limiter {
			limiter.check(ctx.client_key().unwrap_or(ANONYMOUS_CLIENT))?;
		}
		Ok(())
	}

	/// Checks that `schema` normalizes and compiles.
	///
	/// Falls back to [`DefaultFormGenerator`] when none is configured.
	pub async fn validate(
		&self,
		ctx: &Context,
		schema: &Value,
		opts: &ValidateOptions,
	) -> SchemaResult<SchemaValidation> {
		self.throttle(ctx)?;
		let report = self.guardrails.validate_schema(schema, opts.ui_schema.as_ref())?;
		let fallback: Arc<dyn FormGenerator> = Arc::new(DefaultFormGenerator::new());
		let generator = self.generator.as_ref().unwrap_or(&fallback);
		self.compile_with(ctx, generator.as_ref(), schema, opts).await?;
		Ok(report)
	}

	/// Renders the generated form as HTML.
	pub async fn preview(
		&self,
		ctx: &Context,
		schema: &Value,
		opts: &ValidateOptions,
	) -> SchemaResult<String> {
		self.throttle(ctx)?;
		let generator = self.generator.clone().ok_or_else(|| {
			SchemaError::GeneratorUnavailable("no form generator configured".to_string())
		})?;
		self.guardrails.validate_schema(schema, opts.ui_schema.as_ref())?;
		let (_, form) = self.compile_with(ctx, generator.as_ref(), schema, opts).await?;
		ctx.run(async {
			generator
				.render(&form)
				.await
				.map_err(SchemaError::from)
		})
		.await
	}

	/// Normalizes and compiles without throttling or guardrails.
	pub async fn compile(
		&self,
		ctx: &Context,
		schema: &Value,
		opts: &ValidateOptions,
	) -> SchemaResult<(NormalizedSchema, FormDefinition)> {
		let fallback: Arc<dyn FormGenerator> = Arc::new(DefaultFormGenerator::new());
		let generator = self.generator.as_ref().unwrap_or(&fallback);
		self.compile_with(ctx, generator.as_ref(), schema, opts).await
	}

	async fn compile_with(
		&self,
		ctx: &Context,
		generator: &dyn FormGenerator,
		schema: &Value,
		opts: &ValidateOptions,
	) -> SchemaResult<(NormalizedSchema, FormDefinition)> {
		let normalized = self.normalizer.normalize(ctx, schema, opts).await?;
		let request = FormRequest::new(normalized.form_id.clone(), normalized.schema.clone())
			.with_ui_schema(normalized.ui_schema.clone())
			.with_transformer(Arc::new(HybridJsonTransformer));
		let form = ctx
			.run(async {
				generator
					.generate(&request)
					.await
					.map_err(SchemaError::from)
			})
			.await?;
		tracing::debug!(
			form_id = %normalized.form_id,
			fields = form.fields.len(),
			"schema compiled"
		);
		Ok((normalized, form))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::formgen::FormGenerationError;
	use crate::rate_limit::ManualClock;
	use async_trait::async_trait;
	use reinhardt_backoffice_core::{BackofficeError, TextCode};
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::time::Duration;

	struct FailingGenerator;

	#[async_trait]
	impl FormGenerator for FailingGenerator {
		async fn generate(&self, _request: &FormRequest) -> Result<FormDefinition, FormGenerationError> {
			Err(FormGenerationError::Backend("connection refused".into()))
		}

		async fn render(&self, _form: &FormDefinition) -> Result<String, FormGenerationError> {
			Err(FormGenerationError::Backend("connection refused".into()))
		}
	}

	struct SlowGenerator;

	#[async_trait]
	impl FormGenerator for SlowGenerator {
		async fn generate(&self, request: &FormRequest) -> Result<FormDefinition, FormGenerationError> {
			tokio::time::sleep(Duration::from_secs(30)).await;
			DefaultFormGenerator::new().compile(request)
		}

		async fn render(&self, _form: &FormDefinition) -> Result<String, FormGenerationError> {
			Ok(String::new())
		}
	}

	#[fixture]
	fn schema() -> Value {
		json!({
			"type": "object",
			"properties": {"title": {"type": "string"}, "extra": {"type": "object"}}
		})
	}

	#[rstest]
	#[tokio::test]
	async fn test_validate_uses_default_generator(schema: Value) {
		// Arrange
		let validator = SchemaValidator::default();

		// Act
		let report = validator
			.validate(&Context::new(), &schema, &ValidateOptions::new())
			.await
			.unwrap();

		// Assert
		assert!(report.valid);
		assert_eq!(report.field_count, 2);
	}

	#[rstest]
	#[tokio::test]
	async fn test_preview_requires_generator(schema: Value) {
		// Arrange
		let validator = SchemaValidator::default();

		// Act
		let err = validator
			.preview(&Context::new(), &schema, &ValidateOptions::new())
			.await
			.unwrap_err();

		// Assert
		let mapped = BackofficeError::from(err);
		assert_eq!(mapped.text_code(), TextCode::ServiceUnavailable);
		assert_eq!(mapped.metadata_value("component"), Some(&json!("form_generator")));
	}

	#[rstest]
	#[tokio::test]
	async fn test_preview_renders_hybrid_editor(schema: Value) {
		// Arrange
		let validator =
			SchemaValidator::default().with_generator(Arc::new(DefaultFormGenerator::new()));
		let opts = ValidateOptions::new().with_slug("article");

		// Act
		let html = validator.preview(&Context::new(), &schema, &opts).await.unwrap();

		// Assert
		assert!(html.contains("id=\"article.edit\""));
		assert!(html.contains("data-editor-mode=\"hybrid\""));
	}

	#[rstest]
	#[tokio::test]
	async fn test_backend_failure_is_service_unavailable(schema: Value) {
		// Arrange
		let validator = SchemaValidator::default().with_generator(Arc::new(FailingGenerator));

		// Act
		let err = validator
			.validate(&Context::new(), &schema, &ValidateOptions::new())
			.await
			.unwrap_err();

		// Assert
		assert!(matches!(err, SchemaError::GeneratorUnavailable(_)));
	}

	#[rstest]
	#[tokio::test]
	async fn test_cancellation_aborts_generator_call(schema: Value) {
		// Arrange
		let validator = SchemaValidator::default().with_generator(Arc::new(SlowGenerator));
		let ctx = Context::new();
		let canceller = ctx.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(10)).await;
			canceller.cancel();
		});

		// Act
		let err = validator
			.validate(&ctx, &schema, &ValidateOptions::new())
			.await
			.unwrap_err();

		// Assert
		assert_eq!(BackofficeError::from(err).text_code(), TextCode::ContextCanceled);
	}

	#[rstest]
	#[tokio::test]
	async fn test_rate_limit_keyed_by_client(schema: Value) {
		// Arrange
		let clock = Arc::new(ManualClock::default());
		let limiter = Arc::new(RateLimiter::with_clock(1, Duration::from_secs(60), clock));
		let validator = SchemaValidator::default().with_rate_limiter(limiter);
		let alice = Context::new().with_client_key("10.0.0.1:alice");
		let bob = Context::new().with_client_key("10.0.0.1:bob");
		let opts = ValidateOptions::new();

		// Act
		let first = validator.validate(&alice, &schema, &opts).await;
		let second = validator.validate(&alice, &schema, &opts).await;
		let other = validator.validate(&bob, &schema, &opts).await;

		// Assert
		assert!(first.is_ok());
		assert!(matches!(second, Err(SchemaError::RateLimited { .. })));
		assert!(other.is_ok());
	}
}
