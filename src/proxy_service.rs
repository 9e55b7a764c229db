//! HTTP surface of the gateway: registry CRUD plus the proxy endpoint.
//!
//! The proxy handler is the orchestrator for the core pipeline and runs it
//! strictly in order, terminal on first failure:
//!
//! 1. caller authorization (identity header, `request` scope)
//! 2. longest-prefix path resolution
//! 3. target authorization (`receive` scope)
//! 4. upstream forwarding
//!
//! Each inbound request is one pass with no retained state; all shared state
//! lives behind [`AppState`].

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderName, StatusCode};
use axum::response::Response;
use axum::routing::{MethodFilter, delete, get, on, post};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::authz::{authorize_caller, authorize_target};
use crate::error::GatewayError;
use crate::forwarder::{ProxyForwarder, destination_url};
use crate::registry::{ServiceRecord, ServiceStore};
use crate::resolver::resolve;

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ServiceStore>,
    pub forwarder: Arc<ProxyForwarder>,
    /// Name of the header carrying the caller's service identity.
    pub identity_header: HeaderName,
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    let proxy_methods = MethodFilter::GET
        .or(MethodFilter::POST)
        .or(MethodFilter::PUT)
        .or(MethodFilter::DELETE)
        .or(MethodFilter::PATCH);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/register", post(register))
        .route("/unregister/{*id}", delete(unregister))
        .route("/get/{*id}", get(get_service))
        .route("/list", get(list_services))
        .route("/request/{*path}", on(proxy_methods, proxy))
        .fallback(not_found)
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn not_found() -> GatewayError {
    GatewayError::NotFound("no such route".to_string())
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    id: String,
    url: String,
    scopes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    message: String,
    id: String,
    access_url: String,
}

/// Validate a registration payload into a record.
///
/// Ids with empty segments (including leading/trailing slashes) are rejected
/// because they could never match a resolved path; URLs must parse as
/// absolute http/https.
fn validate_registration(payload: RegisterRequest) -> Result<ServiceRecord, GatewayError> {
    if payload.id.is_empty() {
        return Err(GatewayError::Validation(
            "service id must not be empty".to_string(),
        ));
    }
    if payload.id.split('/').any(|segment| segment.is_empty()) {
        return Err(GatewayError::Validation(format!(
            "service id '{}' must not contain empty segments",
            payload.id
        )));
    }

    let parsed = Url::parse(&payload.url)
        .map_err(|err| GatewayError::Validation(format!("invalid service url: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GatewayError::Validation(format!(
            "service url must be absolute http or https, got scheme '{}'",
            parsed.scheme()
        )));
    }

    Ok(ServiceRecord::new(payload.id, payload.url, payload.scopes))
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), GatewayError> {
    let Json(payload) =
        payload.map_err(|rejection| GatewayError::Validation(rejection.body_text()))?;
    let record = validate_registration(payload)?;

    let id = record.id.clone();
    state.store.put(record).await?;
    tracing::info!(id = %id, "service registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "service registered".to_string(),
            access_url: format!("/request/{id}"),
            id,
        }),
    ))
}

#[derive(Debug, Serialize)]
struct UnregisterResponse {
    message: String,
    id: String,
}

async fn unregister(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UnregisterResponse>, GatewayError> {
    if !state.store.delete(&id).await? {
        return Err(GatewayError::NotFound(format!(
            "service '{id}' is not registered"
        )));
    }
    tracing::info!(id = %id, "service unregistered");

    Ok(Json(UnregisterResponse {
        message: "service unregistered".to_string(),
        id,
    }))
}

async fn get_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceRecord>, GatewayError> {
    state
        .store
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| GatewayError::NotFound(format!("service '{id}' is not registered")))
}

#[derive(Debug, Serialize)]
struct ListResponse {
    services: Vec<ServiceRecord>,
}

async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<ListResponse>, GatewayError> {
    let services = state.store.list().await?;
    Ok(Json(ListResponse { services }))
}

/// The proxy endpoint: authorize, resolve, authorize, forward.
async fn proxy(State(state): State<AppState>, request: Request) -> Result<Response, GatewayError> {
    let (parts, body) = request.into_parts();

    let caller_id = parts
        .headers
        .get(&state.identity_header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let caller =
        authorize_caller(state.store.as_ref(), caller_id, state.identity_header.as_str()).await?;

    // Taken from the raw URI rather than the route capture so percent
    // encoding survives to the upstream untouched.
    let path = parts
        .uri
        .path()
        .strip_prefix("/request")
        .unwrap_or("")
        .trim_start_matches('/');

    let target = resolve(state.store.as_ref(), path)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("no service registered for path '{path}'")))?;
    authorize_target(&target.record)?;

    let destination = destination_url(&target.record, &target.subpath);
    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|err| GatewayError::Internal(format!("reading request body: {err}")))?;

    let span = tracing::info_span!(
        "proxy",
        request_id = %Uuid::new_v4(),
        caller = %caller.id,
        service = %target.record.id,
        method = %parts.method,
    );
    state
        .forwarder
        .forward(
            parts.method,
            &destination,
            parts.uri.query(),
            &parts.headers,
            body,
        )
        .instrument(span)
        .await
}
