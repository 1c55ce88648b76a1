//! JSON API for the purchase-request workflow.
//!
//! Endpoints:
//! - `POST /api/requests?intent=save|submit`     — create a request
//! - `PUT  /api/requests/{id}?intent=save|submit` — edit a Draft/Rejected request
//! - `GET  /api/requests/{id}`                   — detail with timeline and permissions
//! - `GET  /api/requests/code/{code}`            — detail by document code
//! - `GET  /api/requests/mine`                   — the caller's own requests
//! - `GET  /api/requests/pending-approvals`      — documents waiting on the caller
//! - `GET  /api/requests/approved`               — fully approved documents
//! - `POST /api/requests/{id}/approve`           — approve the current step
//! - `POST /api/requests/{id}/reject`            — reject and cancel downstream
//! - `GET  /api/attachments/{quotation_id}`      — download an attached file
//! - `GET  /api/dashboard`                       — per-status document counts
//!
//! The acting identity arrives in the `X-Actor-Id` header; authorization
//! against the workflow route happens in the service and core layers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use procura_core::{
    ApplicationError, InterfaceError, NewAttachment, QuotationId, RequestId, RequestSummary,
    SubmitIntent, DOCUMENT_TYPE_OTHER,
};
use procura_db::repositories::StatusCounts;

use crate::service::{CreateRequestCommand, RequestDetail, RequestService, UpdateRequestCommand};

#[derive(Clone)]
pub struct ApiState {
    service: Arc<RequestService>,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub content_type: String,
    pub document_type_id: Option<i64>,
    /// Base64-encoded file bytes.
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequestBody {
    pub title: String,
    pub vendor_id: i64,
    pub vendor_name: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub remark: Option<String>,
    pub comment: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

#[derive(Debug, Deserialize)]
pub struct RetypeQuotation {
    pub quotation_id: i64,
    pub document_type_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequestBody {
    pub title: String,
    pub vendor_id: i64,
    pub vendor_name: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub remark: Option<String>,
    pub comment: Option<String>,
    #[serde(default)]
    pub new_attachments: Vec<AttachmentUpload>,
    #[serde(default)]
    pub deleted_quotation_ids: Vec<i64>,
    #[serde(default)]
    pub retyped: Vec<RetypeQuotation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IntentQuery {
    pub intent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActionBody {
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub requests: Vec<RequestSummary>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub draft: i64,
    pub pending: i64,
    pub approved: i64,
    pub completed: i64,
    pub rejected: i64,
    pub cancelled: i64,
}

impl From<StatusCounts> for DashboardResponse {
    fn from(counts: StatusCounts) -> Self {
        Self {
            draft: counts.draft,
            pending: counts.pending,
            approved: counts.approved,
            completed: counts.completed,
            rejected: counts.rejected,
            cancelled: counts.cancelled,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);
type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(service: Arc<RequestService>) -> Router {
    Router::new()
        .route("/api/requests", post(create_request))
        .route("/api/requests/mine", get(my_requests))
        .route("/api/requests/pending-approvals", get(pending_approvals))
        .route("/api/requests/approved", get(approved_requests))
        .route("/api/requests/code/{code}", get(request_by_code))
        .route("/api/requests/{id}", put(update_request).get(request_detail))
        .route("/api/requests/{id}/approve", post(approve_request))
        .route("/api/requests/{id}/reject", post(reject_request))
        .route("/api/attachments/{quotation_id}", get(download_attachment))
        .route("/api/dashboard", get(dashboard))
        .with_state(ApiState { service })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn bad_request(message: impl Into<String>, correlation_id: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody { error: message.into(), correlation_id: correlation_id.to_string() }),
    )
}

/// Resolves the acting identity from the `X-Actor-Id` header.
fn actor_id(headers: &HeaderMap, correlation_id: &str) -> Result<String, ApiError> {
    headers
        .get("x-actor-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| bad_request("missing X-Actor-Id header", correlation_id))
}

fn parse_intent(query: &IntentQuery, correlation_id: &str) -> Result<SubmitIntent, ApiError> {
    match query.intent.as_deref() {
        None | Some("save") => Ok(SubmitIntent::Save),
        Some("submit") => Ok(SubmitIntent::Submit),
        Some(other) => {
            Err(bad_request(format!("unknown intent '{other}', expected save or submit"), correlation_id))
        }
    }
}

fn decode_attachment(
    upload: AttachmentUpload,
    correlation_id: &str,
) -> Result<NewAttachment, ApiError> {
    let data = BASE64.decode(upload.data.as_bytes()).map_err(|_| {
        bad_request(
            format!("attachment '{}' is not valid base64", upload.file_name),
            correlation_id,
        )
    })?;
    Ok(NewAttachment {
        file_name: upload.file_name,
        content_type: upload.content_type,
        document_type_id: upload.document_type_id.unwrap_or(DOCUMENT_TYPE_OTHER),
        data,
    })
}

/// Builds the download header. Quotes, backslashes, and anything outside
/// printable ASCII would corrupt the quoted-string form, so they are
/// replaced before formatting.
fn content_disposition(file_name: &str) -> String {
    let sanitized: String = file_name
        .chars()
        .map(|c| {
            if c == '"' || c == '\\' || !(c.is_ascii_graphic() || c == ' ') {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("attachment; filename=\"{sanitized}\"")
}

fn into_api_error(error: ApplicationError, correlation_id: String) -> ApiError {
    warn!(
        event_name = "api.request_failed",
        correlation_id = %correlation_id,
        error = %error,
        "request handling failed"
    );
    let interface = error.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorBody {
        error: interface.user_message().to_string(),
        correlation_id: interface.correlation_id().to_string(),
    };
    (status, Json(body))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_request(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<IntentQuery>,
    Json(body): Json<CreateRequestBody>,
) -> ApiResult<RequestDetail> {
    let correlation_id = new_correlation_id();
    let actor = actor_id(&headers, &correlation_id)?;
    let intent = parse_intent(&query, &correlation_id)?;

    let attachments = body
        .attachments
        .into_iter()
        .map(|upload| decode_attachment(upload, &correlation_id))
        .collect::<Result<Vec<_>, ApiError>>()?;

    let command = CreateRequestCommand {
        title: body.title,
        vendor_id: body.vendor_id,
        vendor_name: body.vendor_name,
        valid_from: body.valid_from,
        valid_until: body.valid_until,
        remark: body.remark,
        comment: body.comment,
        attachments,
    };

    state
        .service
        .create(&correlation_id, &actor, intent, command)
        .await
        .map(Json)
        .map_err(|error| into_api_error(error, correlation_id))
}

async fn update_request(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<IntentQuery>,
    Json(body): Json<UpdateRequestBody>,
) -> ApiResult<RequestDetail> {
    let correlation_id = new_correlation_id();
    let actor = actor_id(&headers, &correlation_id)?;
    let intent = parse_intent(&query, &correlation_id)?;

    let new_attachments = body
        .new_attachments
        .into_iter()
        .map(|upload| decode_attachment(upload, &correlation_id))
        .collect::<Result<Vec<_>, ApiError>>()?;

    let command = UpdateRequestCommand {
        title: body.title,
        vendor_id: body.vendor_id,
        vendor_name: body.vendor_name,
        valid_from: body.valid_from,
        valid_until: body.valid_until,
        remark: body.remark,
        comment: body.comment,
        new_attachments,
        deleted_quotation_ids: body.deleted_quotation_ids,
        retyped: body.retyped.into_iter().map(|r| (r.quotation_id, r.document_type_id)).collect(),
    };

    state
        .service
        .update(&correlation_id, &actor, RequestId(id), intent, command)
        .await
        .map(Json)
        .map_err(|error| into_api_error(error, correlation_id))
}

async fn request_detail(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<RequestDetail> {
    let correlation_id = new_correlation_id();
    let actor = actor_id(&headers, &correlation_id)?;

    state
        .service
        .detail(&correlation_id, &actor, RequestId(id))
        .await
        .map(Json)
        .map_err(|error| into_api_error(error, correlation_id))
}

async fn request_by_code(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> ApiResult<RequestDetail> {
    let correlation_id = new_correlation_id();
    let actor = actor_id(&headers, &correlation_id)?;

    state
        .service
        .detail_by_code(&correlation_id, &actor, &code)
        .await
        .map(Json)
        .map_err(|error| into_api_error(error, correlation_id))
}

async fn approve_request(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ActionBody>,
) -> ApiResult<RequestDetail> {
    let correlation_id = new_correlation_id();
    let actor = actor_id(&headers, &correlation_id)?;

    state
        .service
        .approve(&correlation_id, &actor, RequestId(id), body.comment)
        .await
        .map(Json)
        .map_err(|error| into_api_error(error, correlation_id))
}

async fn reject_request(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ActionBody>,
) -> ApiResult<RequestDetail> {
    let correlation_id = new_correlation_id();
    let actor = actor_id(&headers, &correlation_id)?;

    state
        .service
        .reject(&correlation_id, &actor, RequestId(id), body.comment)
        .await
        .map(Json)
        .map_err(|error| into_api_error(error, correlation_id))
}

async fn my_requests(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<ListResponse> {
    let correlation_id = new_correlation_id();
    let actor = actor_id(&headers, &correlation_id)?;

    state
        .service
        .my_requests(&actor)
        .await
        .map(|requests| Json(ListResponse { requests }))
        .map_err(|error| into_api_error(error, correlation_id))
}

async fn pending_approvals(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<ListResponse> {
    let correlation_id = new_correlation_id();
    let actor = actor_id(&headers, &correlation_id)?;

    state
        .service
        .pending_approvals(&actor)
        .await
        .map(|requests| Json(ListResponse { requests }))
        .map_err(|error| into_api_error(error, correlation_id))
}

async fn approved_requests(State(state): State<ApiState>) -> ApiResult<ListResponse> {
    let correlation_id = new_correlation_id();

    state
        .service
        .approved_requests()
        .await
        .map(|requests| Json(ListResponse { requests }))
        .map_err(|error| into_api_error(error, correlation_id))
}

async fn download_attachment(
    State(state): State<ApiState>,
    Path(quotation_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = new_correlation_id();

    let payload = state
        .service
        .attachment(QuotationId(quotation_id))
        .await
        .map_err(|error| into_api_error(error, correlation_id))?;

    let headers = [
        (header::CONTENT_TYPE, payload.content_type),
        (header::CONTENT_DISPOSITION, content_disposition(&payload.file_name)),
    ];
    Ok((headers, payload.data))
}

async fn dashboard(State(state): State<ApiState>) -> ApiResult<DashboardResponse> {
    let correlation_id = new_correlation_id();

    state
        .service
        .dashboard()
        .await
        .map(|counts| Json(DashboardResponse::from(counts)))
        .map_err(|error| into_api_error(error, correlation_id))
}
