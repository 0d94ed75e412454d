use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use sharegate_shared::constants::APP_NAME;
use sharegate_shared::{Address, ChainId};
use sharegate_store::ShareChatBinding;

use crate::admission::AdmissionController;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::registry::BindingRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: BindingRegistry,
    pub admission: AdmissionController,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.cors_permissive {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/bindings/:id", get(get_binding))
        .route("/bindings/:id/verify", post(verify_binding))
        .route("/access-requests", post(request_access))
        .route("/chat-configured/:chain_id/:address", get(chat_configured))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct VerifyBindingRequest {
    signature: String,
    timestamp: u64,
}

#[derive(Serialize)]
struct VerifyBindingResponse {
    success: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessRequestBody {
    dibs_share_address: Address,
    signature: String,
    chain_id: ChainId,
    timestamp: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessRequestResponse {
    invite_link: String,
}

#[derive(Serialize)]
struct ChatConfiguredResponse {
    result: bool,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: APP_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn parse_binding_id(raw: &str) -> Result<Uuid, ServerError> {
    raw.parse()
        .map_err(|_| ServerError::NotFound(format!("binding {raw}")))
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    body.map(|Json(v)| v)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

async fn get_binding(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ShareChatBinding>, ServerError> {
    let binding = state.registry.get(parse_binding_id(&id)?)?;
    Ok(Json(binding))
}

async fn verify_binding(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<VerifyBindingRequest>, JsonRejection>,
) -> Result<Json<VerifyBindingResponse>, ServerError> {
    let id = parse_binding_id(&id)?;
    let req = json_body(body)?;
    state.registry.sign(id, &req.signature, req.timestamp).await?;
    Ok(Json(VerifyBindingResponse { success: true }))
}

async fn request_access(
    State(state): State<AppState>,
    body: Result<Json<AccessRequestBody>, JsonRejection>,
) -> Result<Json<AccessRequestResponse>, ServerError> {
    let req = json_body(body)?;
    let invite = state
        .admission
        .request_access(req.dibs_share_address, req.chain_id, &req.signature, req.timestamp)
        .await?;
    Ok(Json(AccessRequestResponse {
        invite_link: invite.invite_link,
    }))
}

async fn chat_configured(
    State(state): State<AppState>,
    Path((chain_id, address)): Path<(String, String)>,
) -> Result<Json<ChatConfiguredResponse>, ServerError> {
    let chain_id: ChainId = chain_id
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("invalid chain id: {chain_id}")))?;
    let address: Address = address
        .parse()
        .map_err(|e| ServerError::BadRequest(format!("invalid address: {e}")))?;
    let chat = state.registry.resolve_chat(&address, chain_id)?;
    Ok(Json(ChatConfiguredResponse {
        result: chat.is_some(),
    }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
