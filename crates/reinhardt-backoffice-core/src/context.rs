//! Request-scoped context.
//!
//! The context is the only request state the platform carries: who is acting,
//! in which environment and locale, the rate-limit key, and a cancellation
//! token. External calls are raced against cancellation through
//! [`Context::run`].

use crate::error::BackofficeError;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Environment used when a request does not name one.
pub const DEFAULT_ENVIRONMENT: &str = "default";

#[derive(Debug, Clone)]
pub struct Context {
	cancel: CancellationToken,
	actor: Option<String>,
	environment: String,
	locale: Option<String>,
	client_key: Option<String>,
	path: String,
}

impl Default for Context {
	fn default() -> Self {
		Self::new()
	}
}

impl Context {
	pub fn new() -> Self {
		Self {
			cancel: CancellationToken::new(),
			actor: None,
			environment: DEFAULT_ENVIRONMENT.to_string(),
			locale: None,
			client_key: None,
			path: String::new(),
		}
	}

	pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
		self.actor = Some(actor.into());
		self
	}

	pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
		let environment = environment.into();
		self.environment = if environment.trim().is_empty() {
			DEFAULT_ENVIRONMENT.to_string()
		} else {
			environment
		};
		self
	}

	pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
		self.locale = Some(locale.into());
		self
	}

	/// Rate-limit key, usually `ip:user`.
	pub fn with_client_key(mut self, client_key: impl Into<String>) -> Self {
		self.client_key = Some(client_key.into());
		self
	}

	pub fn with_path(mut self, path: impl Into<String>) -> Self {
		self.path = path.into();
		self
	}

	pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
		self.cancel = token;
		self
	}

	pub fn actor(&self) -> Option<&str> {
		self.actor.as_deref()
	}

	pub fn environment(&self) -> &str {
		&self.environment
	}

	pub fn locale(&self) -> Option<&str> {
		self.locale.as_deref()
	}

	pub fn client_key(&self) -> Option<&str> {
		self.client_key.as_deref()
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	pub fn cancellation_token(&self) -> &CancellationToken {
		&self.cancel
	}

	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Context sharing everything but with a child token, so cancelling the
	/// child leaves the parent running.
	pub fn child(&self) -> Self {
		let mut child = self.clone();
		child.cancel = self.cancel.child_token();
		child
	}

	/// Fails fast when the context is already cancelled.
	pub fn check(&self) -> Result<(), BackofficeError> {
		if self.is_cancelled() {
			return Err(BackofficeError::cancelled());
		}
		Ok(())
	}

	/// Races `fut` against cancellation.
	///
	/// A cancelled context always yields `CONTEXT_CANCELED`, even when the
	/// future was ready at the same time.
	pub async fn run<F, T, E>(&self, fut: F) -> Result<T, E>
	where
		F: Future<Output = Result<T, E>>,
		E: From<BackofficeError>,
	{
		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(E::from(BackofficeError::cancelled())),
			result = fut => result,
		}
	}
}
