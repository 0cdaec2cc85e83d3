// Counters for the back-office side effects.
// Recording goes through the `metrics` facade; the host installs the recorder.

use metrics::{counter, describe_counter};

pub const TRANSLATION_BLOCKED_TRANSITIONS: &str = "backoffice_translation_blocked_transitions_total";
pub const TRANSLATION_ASSIGNMENTS: &str = "backoffice_translation_assignments_total";
pub const RATE_LIMITED: &str = "backoffice_rate_limited_total";
pub const PANEL_REGISTRATIONS: &str = "backoffice_panel_registrations_total";
pub const SIDE_EFFECT_FAILURES: &str = "backoffice_side_effect_failures_total";

/// Register metric descriptions.
/// Should be called once at startup
pub fn describe_all() {
	describe_counter!(
		TRANSLATION_BLOCKED_TRANSITIONS,
		"Workflow transitions blocked by missing translations"
	);
	describe_counter!(
		TRANSLATION_ASSIGNMENTS,
		"Translation assignments handled by the queue auto-create hook"
	);
	describe_counter!(RATE_LIMITED, "Requests denied by the schema rate limiter");
	describe_counter!(
		PANEL_REGISTRATIONS,
		"Dynamic panel register, refresh and remove operations"
	);
	describe_counter!(
		SIDE_EFFECT_FAILURES,
		"Failures swallowed inside fire-and-forget hooks"
	);

	tracing::debug!("Back-office metrics described");
}

/// Record a transition blocked by the translation gate, once per missing locale
pub fn record_blocked_transition(entity: &str, locale: &str, transition: &str, environment: &str) {
	counter!(
		TRANSLATION_BLOCKED_TRANSITIONS,
		"entity" => entity.to_string(),
		"locale" => locale.to_string(),
		"transition" => transition.to_string(),
		"environment" => environment.to_string()
	)
	.increment(1);
}

/// Record an assignment outcome: `created`, `reused` or `failed`
pub fn record_assignment(outcome: &str) {
	counter!(TRANSLATION_ASSIGNMENTS, "outcome" => outcome.to_string()).increment(1);
}

pub fn record_rate_limited(scope: &str) {
	counter!(RATE_LIMITED, "scope" => scope.to_string()).increment(1);
}

/// Record a panel operation: `register`, `refresh` or `remove`
pub fn record_panel_operation(operation: &str) {
	counter!(PANEL_REGISTRATIONS, "operation" => operation.to_string()).increment(1);
}

pub fn record_side_effect_failure(hook: &str) {
	counter!(SIDE_EFFECT_FAILURES, "hook" => hook.to_string()).increment(1);
}
