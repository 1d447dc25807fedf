//! HTTP interface: provision intake, status queries and operator retry.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tenantd_application::{ProvisioningService, SubmitOutcome};
use tenantd_domain::{DomainError, ProvisionIntake, ProvisionRequest, RequestId};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ProvisioningService>,
    pub secret_1: String,
    pub secret_2: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/provision", post(submit))
        .route("/api/provision/:id", get(status))
        .route("/api/provision/:id/retry", post(retry))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ProvisionBody {
    secret1: String,
    secret2: String,
    client_ref: Option<String>,
    client_name: String,
    subdomain: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    company: String,
    password: Option<String>,
    backend_repo: Option<String>,
    frontend_repo: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    id: String,
    status: String,
    progress: String,
    failed: bool,
    backend_domain: Option<String>,
    frontend_domain: Option<String>,
    detail: String,
}

impl StatusBody {
    fn from_request(request: &ProvisionRequest) -> Self {
        Self {
            id: request.id.to_string(),
            status: request.status.clone(),
            progress: request.progress.as_str().to_string(),
            failed: request.failed,
            backend_domain: request.backend_domain.clone(),
            frontend_domain: request.frontend_domain.clone(),
            detail: request.detail.clone(),
        }
    }
}

fn error_response(err: DomainError) -> Response {
    let (status, detail) = match &err {
        DomainError::InvalidRequest { .. }
        | DomainError::DuplicateSubdomain { .. }
        | DomainError::DuplicateClientRef { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::RequestNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };
    (status, Json(json!({ "detail": detail }))).into_response()
}

async fn submit(State(state): State<AppState>, Json(body): Json<ProvisionBody>) -> Response {
    if body.secret1 != state.secret_1 || body.secret2 != state.secret_2 {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "unauthorized" })),
        )
            .into_response();
    }

    let intake = ProvisionIntake {
        client_ref: body.client_ref,
        client_name: body.client_name,
        subdomain: body.subdomain,
        email: body.email,
        company: body.company,
        admin_password: body.password,
        backend_repo: body.backend_repo,
        frontend_repo: body.frontend_repo,
    };

    match state.service.submit(intake).await {
        Ok(SubmitOutcome::Accepted { request_id }) => (
            StatusCode::ACCEPTED,
            Json(json!({ "detail": "accepted", "id": request_id.to_string() })),
        )
            .into_response(),
        Ok(SubmitOutcome::AlreadyProvisioned { request }) => (
            StatusCode::OK,
            Json(json!({
                "detail": "already_provisioned",
                "request": StatusBody::from_request(&request),
            })),
        )
            .into_response(),
        Ok(SubmitOutcome::AlreadyInProgress { request }) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "detail": "already_exists",
                "request": StatusBody::from_request(&request),
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn status(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.service.status(&RequestId(id)).await {
        Ok(Some(request)) => {
            (StatusCode::OK, Json(StatusBody::from_request(&request))).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "not_found" })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn retry(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.service.retry(&RequestId(id)).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({ "detail": "retry_scheduled" })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}
