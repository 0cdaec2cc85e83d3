//! Central error presenter.
//!
//! Every handler funnels its failures through [`ErrorPresenter`], which maps a
//! [`BackofficeError`] onto the JSON envelope
//! `{ "error": { code, text_code, message, metadata, stack_trace? } }` and,
//! for template endpoints, onto a small HTML page carrying the same text code.

use crate::error::BackofficeError;
use crate::text::escape_html;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::backtrace::Backtrace;

/// JSON error envelope returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
	pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// HTTP status
	pub code: u16,
	pub text_code: String,
	pub message: String,
	#[serde(default)]
	pub metadata: Map<String, Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stack_trace: Option<Vec<String>>,
}

/// Maps errors to envelopes. Stack traces are attached only when enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorPresenter {
	include_stack: bool,
}

impl ErrorPresenter {
	pub fn new(include_stack: bool) -> Self {
		Self { include_stack }
	}

	pub fn include_stack(&self) -> bool {
		self.include_stack
	}

	/// Builds the envelope, injecting the request path into `metadata.path`.
	pub fn present(&self, err: &BackofficeError, path: &str) -> ErrorEnvelope {
		let mut metadata = err.metadata().clone();
		metadata.insert("path".to_string(), Value::String(path.to_string()));

		if err.status() >= 500 {
			tracing::error!(
				text_code = %err.text_code(),
				status = err.status(),
				path = %path,
				"{}",
				err.message()
			);
		} else {
			tracing::debug!(
				text_code = %err.text_code(),
				status = err.status(),
				path = %path,
				"{}",
				err.message()
			);
		}

		ErrorEnvelope {
			error: ErrorBody {
				code: err.status(),
				text_code: err.text_code().as_str().to_string(),
				message: err.message().to_string(),
				metadata,
				stack_trace: self.include_stack.then(capture_stack),
			},
		}
	}

	/// Serialized envelope body.
	pub fn to_json(&self, err: &BackofficeError, path: &str) -> Vec<u8> {
		let envelope = self.present(err, path);
		serde_json::to_vec(&envelope).unwrap_or_else(|_| {
			format!(
				r#"{{"error":{{"code":{},"text_code":"{}","message":"","metadata":{{}}}}}}"#,
				err.status(),
				err.text_code()
			)
			.into_bytes()
		})
	}

	/// Friendly page for template endpoints, keyed by the same text code.
	pub fn render_html(&self, err: &BackofficeError, path: &str) -> String {
		let envelope = self.present(err, path);
		let body = envelope.error;
		let mut html = String::new();
		html.push_str("<section class=\"backoffice-error\" data-text-code=\"");
		html.push_str(&body.text_code);
		html.push_str("\">\n");
		html.push_str(&format!("\t<h1>{}</h1>\n", body.code));
		html.push_str(&format!("\t<p>{}</p>\n", escape_html(&body.message)));
		if let Some(frames) = body.stack_trace {
			html.push_str("\t<pre class=\"stack-trace\">");
			html.push_str(&escape_html(&frames.join("\n")));
			html.push_str("</pre>\n");
		}
		html.push_str("</section>\n");
		html
	}
}

fn capture_stack() -> Vec<String> {
	Backtrace::force_capture()
		.to_string()
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty())
		.map(String::from)
		.collect()
}
