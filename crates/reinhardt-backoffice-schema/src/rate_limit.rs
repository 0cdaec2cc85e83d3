//! Fixed-window rate limiter for the schema validate/preview endpoints.
//!
//! Each client key (IP + user id) owns a `{count, window_start}` entry. The
//! first request after a window has elapsed opens a new window. Idle entries
//! are swept lazily every `cleanup_interval` calls to [`RateLimiter::allow`],
//! or on demand through [`RateLimiter::cleanup`].

use crate::error::{SchemaError, SchemaResult};
use parking_lot::Mutex;
use reinhardt_backoffice_core::metrics;
use reinhardt_backoffice_core::settings::RateLimitSettings;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Entry stored per client key
#[derive(Debug, Clone)]
struct WindowEntry {
	count: usize,
	window_start: Instant,
}

/// Source of the current instant for window bookkeeping.
pub trait Clock: Send + Sync {
	fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Instant {
		Instant::now()
	}
}

/// Clock that only moves through [`ManualClock::advance`].
#[derive(Debug)]
pub struct ManualClock {
	origin: Instant,
	elapsed: Mutex<Duration>,
}

impl ManualClock {
	pub fn new() -> Self {
		Self {
			origin: Instant::now(),
			elapsed: Mutex::new(Duration::ZERO),
		}
	}

	pub fn advance(&self, by: Duration) {
		*self.elapsed.lock() += by;
	}
}

impl Default for ManualClock {
	fn default() -> Self {
		Self::new()
	}
}

impl Clock for ManualClock {
	fn now(&self) -> Instant {
		self.origin + *self.elapsed.lock()
	}
}

/// Sweep idle keys roughly once per this many `allow` calls.
const DEFAULT_CLEANUP_INTERVAL: u64 = 100;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
	pub allowed: bool,
	pub remaining: usize,
	/// Time until the current window closes
	pub retry_after: Duration,
}

pub struct RateLimiter {
	storage: Mutex<HashMap<String, WindowEntry>>,
	max_requests: usize,
	window: Duration,
	cleanup_interval: u64,
	scope: String,
	clock: Arc<dyn Clock>,
	/// Counter for lazy cleanup scheduling
	ops_counter: AtomicU64,
}

impl std::fmt::Debug for RateLimiter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RateLimiter")
			.field("max_requests", &self.max_requests)
			.field("window", &self.window)
			.field("scope", &self.scope)
			.finish()
	}
}

impl RateLimiter {
	/// Creates a limiter on the system clock.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_backoffice_schema::rate_limit::RateLimiter;
	/// use std::time::Duration;
	///
	/// let limiter = RateLimiter::new(2, Duration::from_secs(60));
	/// assert!(limiter.allow("10.0.0.1:7"));
	/// assert!(limiter.allow("10.0.0.1:7"));
	/// assert!(!limiter.allow("10.0.0.1:7"));
	/// assert!(limiter.allow("10.0.0.2:7"));
	/// ```
	pub fn new(max_requests: usize, window: Duration) -> Self {
		Self::with_clock(max_requests, window, Arc::new(SystemClock))
	}

	pub fn with_clock(max_requests: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
		Self {
			storage: Mutex::new(HashMap::new()),
			max_requests,
			window,
			cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
			scope: "schema".to_string(),
			clock,
			ops_counter: AtomicU64::new(0),
		}
	}

	pub fn from_settings(settings: &RateLimitSettings) -> Self {
		Self::new(settings.max_requests, settings.window())
			.with_cleanup_interval(settings.cleanup_interval)
	}

	pub fn with_cleanup_interval(mut self, interval: u64) -> Self {
		self.cleanup_interval = interval.max(1);
		self
	}

	/// Metric label for denials
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = scope.into();
		self
	}

	pub fn max_requests(&self) -> usize {
		self.max_requests
	}

	pub fn window(&self) -> Duration {
		self.window
	}

	fn expired(&self, entry: &WindowEntry, now: Instant) -> bool {
		now.duration_since(entry.window_start) >= self.window
	}

	fn maybe_cleanup(&self) {
		let count = self.ops_counter.fetch_add(1, Ordering::Relaxed);
		if count % self.cleanup_interval != 0 {
			return;
		}
		self.cleanup();
	}

	/// Removes idle keys, returning how many were dropped.
	pub fn cleanup(&self) -> usize {
		let now = self.clock.now();
		let mut storage = self.storage.lock();
		let before = storage.len();
		storage.retain(|_, entry| !self.expired(entry, now));
		before - storage.len()
	}

	/// Counts one request against `key`.
	pub fn decide(&self, key: &str) -> RateDecision {
		self.maybe_cleanup();

		let now = self.clock.now();
		let mut storage = self.storage.lock();
		let entry = storage.entry(key.to_string()).or_insert(WindowEntry {
			count: 0,
			window_start: now,
		});
		if self.expired(entry, now) {
			*entry = WindowEntry {
				count: 0,
				window_start: now,
			};
		}

		let retry_after = self
			.window
			.saturating_sub(now.duration_since(entry.window_start));
		if entry.count >= self.max_requests {
			return RateDecision {
				allowed: false,
				remaining: 0,
				retry_after,
			};
		}
		entry.count += 1;
		RateDecision {
			allowed: true,
			remaining: self.max_requests - entry.count,
			retry_after,
		}
	}

	pub fn allow(&self, key: &str) -> bool {
		self.decide(key).allowed
	}

	/// `RATE_LIMITED` when `key` is over its budget.
	pub fn check(&self, key: &str) -> SchemaResult<()> {
		let decision = self.decide(key);
		if decision.allowed {
			return Ok(());
		}
		tracing::warn!(
			client_key = %key,
			scope = %self.scope,
			retry_after_ms = decision.retry_after.as_millis() as u64,
			"rate limit exceeded"
		);
		metrics::record_rate_limited(&self.scope);
		Err(SchemaError::RateLimited {
			key: key.to_string(),
			retry_after_ms: decision.retry_after.as_millis() as u64,
		})
	}

	/// Requests left for `key` in its current window.
	pub fn remaining(&self, key: &str) -> usize {
		let now = self.clock.now();
		let storage = self.storage.lock();
		match storage.get(key) {
			Some(entry) if !self.expired(entry, now) => {
				self.max_requests.saturating_sub(entry.count)
			}
			_ => self.max_requests,
		}
	}

	pub fn tracked_keys(&self) -> usize {
		self.storage.lock().len()
	}
}
