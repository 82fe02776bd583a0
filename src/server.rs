//! Timecap HTTP surface
//!
//! REST API over the mutation pipeline. Identity comes exclusively from the
//! `Authorization: Bearer` header; request bodies never carry an actor.
//!
//! Run with: cargo run --release --features server --bin timecap-server

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::claims::Identity;
use crate::error::Error;
use crate::model::{EntryTag, Project, TimeEntry};
use crate::{auth, bootstrap, caps, pipeline, resolver};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapRequest {
    root_subject: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BootstrapResponse {
    root_subject: String,
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    subject: String,
    claims: Vec<String>,
    ttl_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct CreateProjectRequest {
    code: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProjectRequest {
    name: Option<String>,
    is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct AddTaskRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTaskRequest {
    name: Option<String>,
    is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetTagConfigurationRequest {
    allowed_values: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEntryRequest {
    project_code: String,
    task_id: u64,
    standard_hours: f64,
    overtime_hours: f64,
    start_date: NaiveDate,
    completion_date: NaiveDate,
    description: Option<String>,
    issue_id: Option<String>,
    #[serde(default)]
    tags: Vec<EntryTag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateEntryRequest {
    task_id: Option<u64>,
    standard_hours: Option<f64>,
    overtime_hours: Option<f64>,
    start_date: Option<NaiveDate>,
    completion_date: Option<NaiveDate>,
    description: Option<String>,
    issue_id: Option<String>,
    tags: Option<Vec<EntryTag>>,
}

#[derive(Debug, Deserialize)]
struct DeclineRequest {
    comment: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveRequest {
    project_code: String,
    task_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MoveResponse {
    entry: TimeEntry,
    dropped_tags: Vec<EntryTag>,
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

#[derive(Debug, Serialize)]
struct RevokedResponse {
    revoked: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_capability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_status: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            // A missing/invalid session is an authentication failure, not a
            // resource miss.
            Error::NotFound { kind: "session", .. } => StatusCode::UNAUTHORIZED,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let mut body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
            resource_path: None,
            required_capability: None,
            fields: None,
            current_status: None,
            expected_status: None,
        };
        match self {
            Error::Forbidden { path, required } => {
                body.resource_path = Some(path);
                body.required_capability = Some(required.to_string());
            }
            Error::Validation { fields, .. } => body.fields = Some(fields),
            Error::Conflict { current, expected } => {
                body.current_status = Some(current);
                body.expected_status = Some(expected);
            }
            _ => {}
        }
        (status, Json(ErrorResponse { error: body })).into_response()
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Bearer token wrapper so handlers can both authenticate and revoke
struct Bearer(String);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Bearer {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| Bearer(t.to_string()))
            .ok_or_else(|| Error::not_found("session", "missing bearer token"))
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Bearer(token) = Bearer::from_request_parts(parts, state).await?;
        auth::validate_session(&token)
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

async fn bootstrap_system(
    Json(req): Json<BootstrapRequest>,
) -> Result<Json<BootstrapResponse>, Error> {
    let result = bootstrap::bootstrap(&req.root_subject)?;
    Ok(Json(BootstrapResponse { root_subject: result.root_subject, token: result.token }))
}

/// Mint a session for a subject with an explicit claim set. Requires Manage
/// on the project tree root.
async fn create_session(
    identity: Identity,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, Error> {
    resolver::require(&identity, "Project", caps::MANAGE)?;
    let token = auth::create_session(&req.subject, &req.claims, req.ttl_secs)?;
    Ok(Json(SessionResponse { token }))
}

/// Revoke the presented session
async fn revoke_session(Bearer(token): Bearer) -> Result<Json<RevokedResponse>, Error> {
    Ok(Json(RevokedResponse { revoked: auth::revoke_session(&token)? }))
}

async fn create_project(
    identity: Identity,
    Json(req): Json<CreateProjectRequest>,
) -> Result<Json<Project>, Error> {
    Ok(Json(pipeline::create_project(&identity, &req.code, &req.name)?))
}

async fn list_projects(identity: Identity) -> Result<Json<Vec<Project>>, Error> {
    Ok(Json(pipeline::list_projects(&identity)?))
}

async fn get_project(
    identity: Identity,
    Path(code): Path<String>,
) -> Result<Json<Project>, Error> {
    Ok(Json(pipeline::get_project(&identity, &code)?))
}

async fn update_project(
    identity: Identity,
    Path(code): Path<String>,
    Json(req): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, Error> {
    let patch = pipeline::ProjectPatch { name: req.name, is_active: req.is_active };
    Ok(Json(pipeline::update_project(&identity, &code, patch)?))
}

async fn delete_project(
    identity: Identity,
    Path(code): Path<String>,
) -> Result<Json<DeletedResponse>, Error> {
    Ok(Json(DeletedResponse { deleted: pipeline::delete_project(&identity, &code)? }))
}

async fn add_task(
    identity: Identity,
    Path(code): Path<String>,
    Json(req): Json<AddTaskRequest>,
) -> Result<Json<Project>, Error> {
    Ok(Json(pipeline::add_task(&identity, &code, &req.name)?))
}

async fn update_task(
    identity: Identity,
    Path((code, task_id)): Path<(String, u64)>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<Project>, Error> {
    let patch = pipeline::TaskPatch { name: req.name, is_active: req.is_active };
    Ok(Json(pipeline::update_task(&identity, &code, task_id, patch)?))
}

async fn set_tag_configuration(
    identity: Identity,
    Path((code, tag_name)): Path<(String, String)>,
    Json(req): Json<SetTagConfigurationRequest>,
) -> Result<Json<Project>, Error> {
    Ok(Json(pipeline::set_tag_configuration(&identity, &code, &tag_name, req.allowed_values)?))
}

async fn list_project_entries(
    identity: Identity,
    Path(code): Path<String>,
) -> Result<Json<Vec<TimeEntry>>, Error> {
    Ok(Json(pipeline::list_project_entries(&identity, &code)?))
}

async fn create_entry(
    identity: Identity,
    Json(req): Json<CreateEntryRequest>,
) -> Result<Json<TimeEntry>, Error> {
    let new = pipeline::NewEntry {
        project_code: req.project_code,
        task_id: req.task_id,
        standard_hours: req.standard_hours,
        overtime_hours: req.overtime_hours,
        start_date: req.start_date,
        completion_date: req.completion_date,
        description: req.description,
        issue_id: req.issue_id,
        tags: req.tags,
    };
    Ok(Json(pipeline::create_entry(&identity, new)?))
}

async fn list_own_entries(identity: Identity) -> Result<Json<Vec<TimeEntry>>, Error> {
    Ok(Json(pipeline::list_entries_for_owner(&identity)?))
}

async fn get_entry(identity: Identity, Path(id): Path<u64>) -> Result<Json<TimeEntry>, Error> {
    Ok(Json(pipeline::get_entry(&identity, id)?))
}

async fn update_entry(
    identity: Identity,
    Path(id): Path<u64>,
    Json(req): Json<UpdateEntryRequest>,
) -> Result<Json<TimeEntry>, Error> {
    let patch = pipeline::EntryPatch {
        task_id: req.task_id,
        standard_hours: req.standard_hours,
        overtime_hours: req.overtime_hours,
        start_date: req.start_date,
        completion_date: req.completion_date,
        description: req.description.map(Some),
        issue_id: req.issue_id.map(Some),
        tags: req.tags,
    };
    Ok(Json(pipeline::update_entry(&identity, id, patch)?))
}

async fn delete_entry(
    identity: Identity,
    Path(id): Path<u64>,
) -> Result<Json<DeletedResponse>, Error> {
    Ok(Json(DeletedResponse { deleted: pipeline::delete_entry(&identity, id)? }))
}

async fn submit_entry(identity: Identity, Path(id): Path<u64>) -> Result<Json<TimeEntry>, Error> {
    Ok(Json(pipeline::submit_entry(&identity, id)?))
}

async fn approve_entry(identity: Identity, Path(id): Path<u64>) -> Result<Json<TimeEntry>, Error> {
    Ok(Json(pipeline::approve_entry(&identity, id)?))
}

async fn decline_entry(
    identity: Identity,
    Path(id): Path<u64>,
    Json(req): Json<DeclineRequest>,
) -> Result<Json<TimeEntry>, Error> {
    Ok(Json(pipeline::decline_entry(&identity, id, &req.comment)?))
}

async fn move_entry(
    identity: Identity,
    Path(id): Path<u64>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<MoveResponse>, Error> {
    let outcome = pipeline::move_entry(&identity, id, &req.project_code, &req.task_name)?;
    Ok(Json(MoveResponse { entry: outcome.entry, dropped_tags: outcome.dropped_tags }))
}

// ============================================================================
// Router
// ============================================================================

/// Build the full API router. The database must be initialized first.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/bootstrap", post(bootstrap_system))
        .route("/auth/sessions", post(create_session).delete(revoke_session))
        .route("/projects", post(create_project).get(list_projects))
        .route(
            "/projects/:code",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/projects/:code/tasks", post(add_task))
        .route("/projects/:code/tasks/:task_id", patch(update_task))
        .route("/projects/:code/tags/:tag_name", put(set_tag_configuration))
        .route("/projects/:code/entries", get(list_project_entries))
        .route("/entries", post(create_entry).get(list_own_entries))
        .route("/entries/:id", get(get_entry).patch(update_entry).delete(delete_entry))
        .route("/entries/:id/submit", post(submit_entry))
        .route("/entries/:id/approve", post(approve_entry))
        .route("/entries/:id/decline", post(decline_entry))
        .route("/entries/:id/move", post(move_entry))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
