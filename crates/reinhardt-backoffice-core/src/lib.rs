//! # Reinhardt Back-office Core
//!
//! Shared building blocks for the back-office crates:
//!
//! - [`error`]: `BackofficeError` with kinds, registered text codes and metadata
//! - [`presenter`]: the JSON error envelope and its HTML rendering
//! - [`context`]: request context with cancellation
//! - [`settings`]: configuration loaded from files or `BACKOFFICE_*` variables
//! - [`urls`]: `admin`/`public` URL namespaces
//! - [`doctor`]: panic-safe diagnostic checks
//! - [`content_type`]: the content-type model shared by schema and panels

pub mod activity;
pub mod content_type;
pub mod context;
pub mod doctor;
pub mod error;
pub mod features;
pub mod logging;
pub mod metrics;
pub mod presenter;
pub mod settings;
pub mod text;
pub mod urls;

pub use activity::{ActivityAction, ActivityEvent, ActivitySink, InMemoryActivitySink, NoopActivitySink};
pub use content_type::{Capabilities, ContentType, ContentTypeStatus};
pub use context::{Context, DEFAULT_ENVIRONMENT};
pub use doctor::{DoctorCheck, DoctorReport, DoctorRunner, Finding, Severity};
pub use error::{BackofficeError, BackofficeResult, ErrorKind, TextCode};
pub use features::{Feature, FeatureGate};
pub use presenter::{ErrorBody, ErrorEnvelope, ErrorPresenter};
pub use settings::{BackofficeSettings, SettingsError};
pub use urls::{UrlManager, UrlNamespace};
