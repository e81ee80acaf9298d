//! HTTP server.
//!
//! Exposes the [`DocumentService`] as a JSON HTTP API. Every route except
//! `/health` sits behind bearer-token authentication.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`    | `/health` | no | Liveness plus backend readiness |
//! | `POST`   | `/add` | yes | Store `{id?, text}` |
//! | `GET`    | `/get/{id}` | yes | Fetch one document |
//! | `PUT`    | `/update` | yes | Replace the text of `{id, text}` |
//! | `DELETE` | `/delete/{id}` | yes | Remove one document |
//! | `GET`    | `/search?query=&limit=` | yes | Ranked `[{id, text, distance}]` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "Document not found: abc" } }
//! ```
//!
//! Error codes: `bad_request` (400), `invalid_query` (400), `store_failure` (400),
//! `unauthorized` (401), `not_found` (404), `timeout` (408),
//! `misconfigured_server` (500), `service_unavailable` (503).

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, Request, State,
    },
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use docstore_core::auth::AccessController;
use docstore_core::{Document, Error, SearchHit};

use crate::config::Config;
use crate::service::DocumentService;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DocumentService>,
    pub access: Arc<AccessController>,
}

/// Build the router with authentication, tracing, CORS and a whole-request
/// deadline of `request_timeout`.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/add", post(handle_add))
        .route("/get/{id}", get(handle_get))
        .route("/update", put(handle_update))
        .route("/delete/{id}", delete(handle_delete))
        .route("/search", get(handle_search))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(handle_health))
        .merge(protected)
        .layer(middleware::from_fn_with_state(
            request_timeout,
            request_deadline,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on `[server].bind` and run until SIGINT/SIGTERM.
///
/// The backend is initialized once before binding; a backend that fails to
/// initialize leaves the server up with `/health` reporting `ready: false`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let access = AccessController::new(config.auth.api_key());
    if !access.is_configured() {
        tracing::warn!(
            env = %config.auth.api_key_env,
            "no API key configured; protected routes will answer 500"
        );
    }

    let service = Arc::new(DocumentService::from_config(config).await);
    let state = AppState {
        service: service.clone(),
        access: Arc::new(access),
    };
    let app = build_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, backend = %service.backend_name(), "docstore listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    service.shutdown().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

/// Bound the whole request; an overrun answers 408 with the usual error body.
async fn request_deadline(
    State(limit): State<Duration>,
    req: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(limit, next.run(req)).await {
        Ok(response) => response,
        Err(_) => AppError::from(Error::Timeout(format!(
            "Request exceeded {}ms",
            limit.as_millis()
        )))
        .into_response(),
    }
}

async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = state.access.verify_header(header) {
        tracing::warn!(
            method = %req.method(),
            path = %req.uri().path(),
            reason = %e,
            "request rejected"
        );
        return Err(e.into());
    }

    Ok(next.run(req).await)
}

// ============ Error response ============

/// JSON error response body: `{"error": {"code", "message"}}`.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let unauthorized = self.status == StatusCode::UNAUTHORIZED;
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if unauthorized {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        Error::MisconfiguredServer(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidQuery(_) | Error::InvalidDocument(_) | Error::StoreFailure(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError {
            status: status_for(&err),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    backend: String,
    ready: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "docstore",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.service.backend_name(),
        ready: state.service.is_ready(),
    })
}

#[derive(Deserialize)]
struct AddRequest {
    #[serde(default)]
    id: Option<String>,
    text: String,
}

#[derive(Deserialize)]
struct UpdateRequest {
    id: String,
    text: String,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize)]
struct DeleteResponse {
    message: &'static str,
    id: String,
}

async fn handle_add(
    State(state): State<AppState>,
    payload: Result<Json<AddRequest>, JsonRejection>,
) -> Result<Json<Document>, AppError> {
    let Json(req) = payload?;
    let doc = state.service.add(req.id, req.text).await?;
    Ok(Json(doc))
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, AppError> {
    Ok(Json(state.service.get(&id).await?))
}

async fn handle_update(
    State(state): State<AppState>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<Document>, AppError> {
    let Json(req) = payload?;
    Ok(Json(state.service.update(&req.id, req.text).await?))
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id = state.service.delete(&id).await?;
    Ok(Json(DeleteResponse {
        message: "Document deleted successfully",
        id,
    }))
}

async fn handle_search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    let Query(params) = params?;
    Ok(Json(state.service.search(&params.query, params.limit).await?))
}
