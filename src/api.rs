//! JSON HTTP surface over `http::Request<Bytes>`.
//!
//! Paths are matched below the admin API base (`/admin/api` by default).
//! Every failure, unknown routes and malformed bodies included, is rendered
//! through [`ErrorPresenter`] with `metadata.path` set to the request path.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST | `content_types/validate` | schema validation |
//! | POST | `content_types/preview` | form preview |
//! | GET, POST | `content_types` | list / create content types |
//! | GET, PUT, DELETE | `content_types/:id` | content type detail |
//! | GET | `block_definitions_meta/{categories,field_types,diagnostics}` | block metadata |
//! | GET, POST | `workflows` | list / create workflows |
//! | POST | `workflows/resolve` | binding resolution |
//! | GET, PUT | `workflows/:id` | workflow detail, update, rollback |
//! | GET, POST | `workflow_bindings` | list / create bindings |
//! | GET, PUT | `workflow_bindings/:id` | binding detail / update |
//! | GET, POST | `:panel` | panel records |
//! | GET, PUT, DELETE | `:panel/:id` | panel record detail |

use crate::bootstrap::Backoffice;
use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Request, Response, StatusCode};
use reinhardt_backoffice_core::{BackofficeError, BackofficeResult, ContentType, Context, Feature};
use reinhardt_backoffice_panels::{ContentTypeUpdate, ListQuery};
use reinhardt_backoffice_schema::ValidateOptions;
use reinhardt_backoffice_workflow::{
	BindingUpdate, PersistedWorkflow, ResolveInput, WorkflowBinding, WorkflowUpdate,
};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Body of `content_types/validate` and `content_types/preview`.
#[derive(Debug, Deserialize)]
struct SchemaPayload {
	schema: Value,
	#[serde(default)]
	ui_schema: Option<Value>,
	#[serde(default)]
	slug: Option<String>,
	#[serde(default)]
	form_id: Option<String>,
}

impl SchemaPayload {
	fn options(&self) -> ValidateOptions {
		ValidateOptions {
			slug: self.slug.clone(),
			form_id: self.form_id.clone(),
			ui_schema: self.ui_schema.clone(),
		}
	}
}

/// Query keys of a panel list that are not field filters.
const LIST_PARAMS: [&str; 3] = ["search", "offset", "limit"];

/// Request dispatcher for a [`Backoffice`].
#[derive(Clone)]
pub struct BackofficeApi {
	backoffice: Arc<Backoffice>,
}

impl BackofficeApi {
	pub fn new(backoffice: Arc<Backoffice>) -> Self {
		Self { backoffice }
	}

	pub fn backoffice(&self) -> &Arc<Backoffice> {
		&self.backoffice
	}

	/// Handles one request. Never fails: errors become JSON envelopes.
	pub async fn handle(&self, ctx: &Context, request: Request<Bytes>) -> Response<Bytes> {
		let path = request.uri().path().to_string();
		let method = request.method().as_str().to_string();
		let ctx = ctx.clone().with_path(path.clone());

		let response = match self.dispatch(&ctx, &request).await {
			Ok(response) => response,
			Err(err) => self.error_response(&err, &path),
		};
		tracing::debug!(
			method = %method,
			path = %path,
			status = response.status().as_u16(),
			"back-office request handled"
		);
		response
	}

	fn error_response(&self, err: &BackofficeError, path: &str) -> Response<Bytes> {
		let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		json_bytes(status, self.backoffice.presenter().to_json(err, path))
	}

	async fn dispatch(&self, ctx: &Context, request: &Request<Bytes>) -> BackofficeResult<Response<Bytes>> {
		let path = request.uri().path();
		let rest = self
			.backoffice
			.urls()
			.admin()
			.strip_api_base(path)
			.ok_or_else(|| route_not_found(request))?;
		let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
		let body = request.body();
		let query = request.uri().query().unwrap_or("");

		match (request.method().as_str(), segments.as_slice()) {
			("POST", ["content_types", "validate"]) => self.validate_schema(ctx, body).await,
			("POST", ["content_types", "preview"]) => self.preview_schema(ctx, body).await,
			("GET", ["content_types"]) => {
				let content_types = self.backoffice.content_types().list(ctx).await?;
				ok_json(&content_types)
			}
			("POST", ["content_types"]) => {
				let content_type: ContentType = from_object(with_generated_id(object_body(body)?))?;
				let created = self.backoffice.content_types().create(ctx, content_type).await?;
				json_response(StatusCode::CREATED, &created)
			}
			("GET", ["content_types", id]) => {
				ok_json(&self.backoffice.content_types().get(ctx, id).await?)
			}
			("PUT", ["content_types", id]) => {
				let update: ContentTypeUpdate = parse_json(body)?;
				ok_json(&self.backoffice.content_types().update(ctx, id, update).await?)
			}
			("DELETE", ["content_types", id]) => {
				self.backoffice.content_types().delete(ctx, id).await?;
				Ok(no_content())
			}

			("GET", ["block_definitions_meta", resource]) => {
				self.block_meta(ctx, resource).await?.ok_or_else(|| route_not_found(request))
			}

			("GET", ["workflows"]) => {
				let params = query_params(query)?;
				let environment = params.get("environment").map(String::as_str);
				ok_json(&self.backoffice.workflows().list_workflows(ctx, environment).await?)
			}
			("POST", ["workflows"]) => {
				let workflow: PersistedWorkflow = from_object(with_generated_id(object_body(body)?))?;
				let created = self.backoffice.workflows().create_workflow(ctx, workflow).await?;
				json_response(StatusCode::CREATED, &created)
			}
			("POST", ["workflows", "resolve"]) => {
				let input: ResolveInput = parse_json(body)?;
				ok_json(&self.backoffice.workflows().resolve(ctx, &input).await?)
			}
			("GET", ["workflows", id]) => {
				ok_json(&self.backoffice.workflows().get_workflow(ctx, id).await?)
			}
			("PUT", ["workflows", id]) => {
				let update: WorkflowUpdate = parse_json(body)?;
				ok_json(&self.backoffice.workflows().update_workflow(ctx, id, update).await?)
			}

			("GET", ["workflow_bindings"]) => {
				ok_json(&self.backoffice.workflows().list_bindings(ctx).await?)
			}
			("POST", ["workflow_bindings"]) => {
				let binding: WorkflowBinding = from_object(with_generated_id(object_body(body)?))?;
				let created = self.backoffice.workflows().create_binding(ctx, binding).await?;
				json_response(StatusCode::CREATED, &created)
			}
			("GET", ["workflow_bindings", id]) => {
				ok_json(&self.backoffice.workflows().get_binding(ctx, id).await?)
			}
			("PUT", ["workflow_bindings", id]) => {
				let update: BindingUpdate = parse_json(body)?;
				ok_json(&self.backoffice.workflows().update_binding(ctx, id, update).await?)
			}

			("GET", [panel]) => self.list_records(ctx, panel, query).await,
			("POST", [panel]) => {
				let record = self.backoffice.crud().create(ctx, panel, object_body(body)?).await?;
				json_response(StatusCode::CREATED, &record.to_json())
			}
			("GET", [panel, id]) => {
				ok_json(&self.backoffice.crud().get(ctx, panel, id).await?.to_json())
			}
			("PUT", [panel, id]) => {
				let mut data = object_body(body)?;
				let expected_version = match data.remove("version") {
					None | Some(Value::Null) => None,
					Some(value) => Some(value.as_u64().ok_or_else(|| {
						BackofficeError::validation_fields(
							"version must be a non-negative integer",
							[("version".to_string(), "invalid".to_string())],
						)
					})?),
				};
				let update = self
					.backoffice
					.crud()
					.update(ctx, panel, id, data, expected_version)
					.await?;
				ok_json(&json!({
					"record": update.record.to_json(),
					"transition": update.transition,
				}))
			}
			("DELETE", [panel, id]) => {
				self.backoffice.crud().delete(ctx, panel, id).await?;
				Ok(no_content())
			}

			_ => Err(route_not_found(request)),
		}
	}

	async fn validate_schema(&self, ctx: &Context, body: &Bytes) -> BackofficeResult<Response<Bytes>> {
		let payload: SchemaPayload = parse_json(body)?;
		let report = self
			.backoffice
			.validator()
			.validate(ctx, &payload.schema, &payload.options())
			.await?;
		ok_json(&json!({"valid": report.valid, "field_count": report.field_count}))
	}

	async fn preview_schema(&self, ctx: &Context, body: &Bytes) -> BackofficeResult<Response<Bytes>> {
		let payload: SchemaPayload = parse_json(body)?;
		let html = self
			.backoffice
			.validator()
			.preview(ctx, &payload.schema, &payload.options())
			.await?;
		ok_json(&json!({"html": html}))
	}

	/// `None` for an unknown resource.
	async fn block_meta(&self, ctx: &Context, resource: &str) -> BackofficeResult<Option<Response<Bytes>>> {
		self.backoffice.features().require(Feature::BlockLibrary)?;
		let blocks = self.backoffice.blocks();
		let response = match resource {
			"categories" => ok_json(&blocks.categories(ctx).await?)?,
			"field_types" => ok_json(&blocks.field_types())?,
			"diagnostics" => ok_json(&blocks.diagnostics(ctx).await?)?,
			_ => return Ok(None),
		};
		Ok(Some(response))
	}

	async fn list_records(&self, ctx: &Context, panel: &str, query: &str) -> BackofficeResult<Response<Bytes>> {
		let params = query_params(query)?;
		let mut list = ListQuery::new();
		if let Some(search) = params.get("search").filter(|s| !s.trim().is_empty()) {
			list = list.with_search(search.clone());
		}
		let offset = numeric_param(&params, "offset")?.unwrap_or(0);
		if let Some(limit) = numeric_param(&params, "limit")? {
			list = list.paginate(offset, limit);
		} else {
			list.offset = offset;
		}
		for (key, value) in params.iter().filter(|(k, _)| !LIST_PARAMS.contains(&k.as_str())) {
			list = list.with_filter(key.clone(), filter_value(value));
		}

		let page = self.backoffice.crud().list(ctx, panel, &list).await?;
		let items: Vec<Value> = page.items.iter().map(|r| r.to_json()).collect();
		ok_json(&json!({"items": items, "total": page.total}))
	}
}

/// Query values are JSON literals when they parse as one (`true`, `3`),
/// plain strings otherwise.
fn filter_value(raw: &str) -> Value {
	serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn route_not_found(request: &Request<Bytes>) -> BackofficeError {
	BackofficeError::not_found(format!(
		"no route for {} {}",
		request.method(),
		request.uri().path()
	))
	.with_metadata("method", request.method().as_str())
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> BackofficeResult<T> {
	serde_json::from_slice(body).map_err(|e| {
		BackofficeError::validation(format!("malformed JSON body: {}", e))
			.with_metadata("line", e.line())
			.with_metadata("column", e.column())
	})
}

fn object_body(body: &Bytes) -> BackofficeResult<Map<String, Value>> {
	match parse_json::<Value>(body)? {
		Value::Object(map) => Ok(map),
		_ => Err(BackofficeError::validation("request body must be a JSON object")),
	}
}

fn with_generated_id(mut map: Map<String, Value>) -> Map<String, Value> {
	map.entry("id")
		.or_insert_with(|| Value::from(uuid::Uuid::new_v4().to_string()));
	map
}

fn from_object<T: DeserializeOwned>(map: Map<String, Value>) -> BackofficeResult<T> {
	serde_json::from_value(Value::Object(map))
		.map_err(|e| BackofficeError::validation(format!("invalid request body: {}", e)))
}

fn query_params(query: &str) -> BackofficeResult<BTreeMap<String, String>> {
	serde_urlencoded::from_str::<Vec<(String, String)>>(query)
		.map(|pairs| pairs.into_iter().collect())
		.map_err(|e| BackofficeError::validation(format!("malformed query string: {}", e)))
}

fn numeric_param(params: &BTreeMap<String, String>, key: &str) -> BackofficeResult<Option<usize>> {
	params
		.get(key)
		.map(|raw| {
			raw.parse::<usize>().map_err(|_| {
				BackofficeError::validation_fields(
					format!("query parameter '{}' must be a non-negative integer", key),
					[(key.to_string(), "invalid".to_string())],
				)
			})
		})
		.transpose()
}

fn ok_json<T: Serialize>(value: &T) -> BackofficeResult<Response<Bytes>> {
	json_response(StatusCode::OK, value)
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> BackofficeResult<Response<Bytes>> {
	let body = serde_json::to_vec(value)
		.map_err(|e| BackofficeError::internal(format!("response serialization failed: {}", e)))?;
	Ok(json_bytes(status, body))
}

fn json_bytes(status: StatusCode, body: Vec<u8>) -> Response<Bytes> {
	let mut response = Response::new(Bytes::from(body));
	*response.status_mut() = status;
	response
		.headers_mut()
		.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
	response
}

fn no_content() -> Response<Bytes> {
	let mut response = Response::new(Bytes::new());
	*response.status_mut() = StatusCode::NO_CONTENT;
	response
}
