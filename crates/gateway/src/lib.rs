//! HTTP API gateway for toolrelay.
//!
//! Exposes the orchestrator over REST: a chat endpoint, the tool and
//! provider catalogs, and a health check.
//!
//! Built on Axum.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::extract::rejection::JsonRejection;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use toolrelay_agent::Orchestrator;
use toolrelay_config::AppConfig;
use toolrelay_core::chat::{ChatRequest, ChatResponse};
use toolrelay_core::error::Error;
use toolrelay_core::tool::ToolDescriptor;
use toolrelay_providers::{BackendRouter, ProviderInfo};

/// Request bodies above this size are rejected.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub orchestrator: Orchestrator,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes and layers.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .route("/api/providers", get(providers_handler))
        .route("/api/tools", get(tools_handler))
        .route("/api/chat", post(chat_handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Assemble the shared state from configuration: backend router, built-in
/// tools and orchestrator.
pub fn state_from_config(config: AppConfig) -> Result<SharedState, Box<dyn std::error::Error>> {
    let router = Arc::new(BackendRouter::build_from_config(&config));
    let registry = Arc::new(toolrelay_tools::default_registry(&config)?);
    let orchestrator = Orchestrator::from_config(&config, router, registry);
    Ok(Arc::new(GatewayState {
        config,
        orchestrator,
    }))
}

/// Start the gateway HTTP server and serve until the process stops.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = state_from_config(config)?;

    let available: Vec<String> = state
        .orchestrator
        .router()
        .providers()
        .into_iter()
        .filter(|p| p.available)
        .map(|p| p.name)
        .collect();
    if !state
        .orchestrator
        .router()
        .is_available(&state.config.default_provider)
    {
        warn!(
            provider = %state.config.default_provider,
            "Default provider is not configured; requests must name another provider"
        );
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, providers = ?available, "Gateway listening");

    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
    status: &'static str,
}

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        name: "toolrelay",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
    })
}

#[derive(Debug, Serialize)]
struct ProviderStatus {
    name: String,
    available: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    default_provider: String,
    default_model: String,
    providers: Vec<ProviderStatus>,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let router = state.orchestrator.router();
    let default_provider = router.default_provider().to_string();
    let default_model = router
        .select(None)
        .map(|selected| selected.default_model)
        .unwrap_or_else(|_| state.config.model_for(&default_provider));
    let providers = router
        .providers()
        .into_iter()
        .map(|p| ProviderStatus {
            name: p.name,
            available: p.available,
        })
        .collect();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        default_provider,
        default_model,
        providers,
    })
}

#[derive(Debug, Serialize)]
struct ProviderListResponse {
    default_provider: String,
    providers: Vec<ProviderInfo>,
}

async fn providers_handler(State(state): State<SharedState>) -> Json<ProviderListResponse> {
    let router = state.orchestrator.router();
    Json(ProviderListResponse {
        default_provider: router.default_provider().to_string(),
        providers: router.providers(),
    })
}

#[derive(Debug, Serialize)]
struct ToolListResponse {
    tools: Vec<ToolDescriptor>,
    count: usize,
}

async fn tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let tools = state.orchestrator.registry().descriptors();
    let count = tools.len();
    Json(ToolListResponse { tools, count })
}

/// Error payload returned by `POST /api/chat`.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            success: false,
            error: message.into(),
            kind: "invalid_request",
            details: None,
        }),
    )
}

fn error_response(err: &Error) -> ApiError {
    let status = match err {
        Error::UnknownProvider { .. }
        | Error::ProviderNotConfigured { .. }
        | Error::UnknownTool(_) => StatusCode::BAD_REQUEST,
        Error::Backend { .. } => StatusCode::BAD_GATEWAY,
    };

    let details = match err {
        Error::UnknownProvider { available, .. } => {
            Some(serde_json::json!({ "available": available }))
        }
        Error::Backend { partial, .. } => serde_json::to_value(partial).ok(),
        _ => None,
    };

    (
        status,
        Json(ErrorResponse {
            success: false,
            error: err.to_string(),
            kind: err.kind(),
            details,
        }),
    )
}

/// `POST /api/chat`: run one orchestration to completion.
async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;

    if request.messages.is_empty() {
        return Err(bad_request("messages must not be empty"));
    }
    if !(0.0..=2.0).contains(&request.temperature) {
        return Err(bad_request("temperature must be between 0 and 2"));
    }

    info!(
        provider = %request
            .provider
            .as_deref()
            .unwrap_or(state.orchestrator.router().default_provider()),
        tools = ?request.tools,
        messages = request.messages.len(),
        "Chat request"
    );

    match state.orchestrator.run(request).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            match &err {
                Error::Backend { .. } => error!(kind = err.kind(), "Chat failed: {err}"),
                _ => warn!(kind = err.kind(), "Chat rejected: {err}"),
            }
            Err(error_response(&err))
        }
    }
}
