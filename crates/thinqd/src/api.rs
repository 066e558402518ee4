use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::put;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::engine::CommandError;
use crate::engine::Engine;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
}

/// Body of PUT /v1/thermostats/:entity_id/target_temperature
#[derive(Debug, Deserialize)]
struct TargetTemperatureRequest {
    celsius: f64,
}

/// Body of PUT /v1/switches/:entity_id
#[derive(Debug, Deserialize)]
struct SwitchRequest {
    on: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

/// A rejected command, rendered as a JSON error.
struct ApiError(CommandError);

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            CommandError::UnknownEntity(_) => (StatusCode::NOT_FOUND, "unknown_entity"),
            CommandError::Unsupported(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unsupported"),
            CommandError::OutOfRange { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "out_of_range"),
            CommandError::InvalidValue(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_value"),
            CommandError::Integration(_) => (StatusCode::BAD_GATEWAY, "integration_failed"),
            CommandError::ChannelClosed => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        };
        tracing::debug!("Command rejected: {}", self.0);

        (
            status,
            Json(ErrorResponse {
                error,
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Shared application state
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
        }),
    )
}

/// Handler for GET /v1/state
#[tracing::instrument(skip(state))]
async fn engine_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.engine.state_snapshot();
    (StatusCode::OK, Json(snapshot.as_ref().clone()))
}

/// Handler for PUT /v1/thermostats/:entity_id/target_temperature
#[tracing::instrument(skip(state))]
async fn set_target_temperature(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Json(body): Json<TargetTemperatureRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .engine
        .set_target_temperature(&entity_id, body.celsius)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for PUT /v1/switches/:entity_id
#[tracing::instrument(skip(state))]
async fn set_switch(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Json(body): Json<SwitchRequest>,
) -> Result<StatusCode, ApiError> {
    state.engine.set_switch(&entity_id, body.on).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/state", get(engine_state))
        .route(
            "/v1/thermostats/:entity_id/target_temperature",
            put(set_target_temperature),
        )
        .route("/v1/switches/:entity_id", put(set_switch))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to the configured address and serves until `shutdown_rx` fires.
pub async fn serve(
    config: &ApiConfig,
    engine: Arc<Engine>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, engine });
    let app = create_router(state);

    let addr = SocketAddr::new(config.listen, config.port);
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}
