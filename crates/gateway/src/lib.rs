//! HTTP ingress for Despensa.
//!
//! Exposes the WhatsApp Cloud webhook (subscription handshake and message
//! ingestion) plus a health check. Parsed messages are queued on the
//! WhatsApp channel and processed by a single [`worker::Worker`].
//!
//! Built on Axum.

pub mod session;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use despensa_agent::AgentLoop;
use despensa_channels::{WhatsAppChannel, parse_webhook};
use despensa_config::AppConfig;
use despensa_core::channel::Channel;
use despensa_core::event::EventBus;

pub use session::SessionStore;
pub use worker::{MediaChannel, Worker};

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Shared state for the webhook routes.
pub struct GatewayState {
    pub channel: Arc<WhatsAppChannel>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", get(verify_handler).post(webhook_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway: open the WhatsApp channel, spawn the worker that
/// drives `agent`, and serve HTTP until Ctrl-C. Messages already queued are
/// processed before returning.
pub async fn start(
    config: &AppConfig,
    agent: Arc<AgentLoop>,
    event_bus: Arc<EventBus>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    if !config.whatsapp.is_configured() {
        warn!("WhatsApp access token or phone number id not set; replies and media downloads will fail");
    }
    if config.whatsapp.verify_token.is_none() {
        warn!("WhatsApp verify token not set; webhook subscription will be rejected");
    }

    let channel = Arc::new(WhatsAppChannel::new(config.whatsapp.clone()));
    let rx = channel.start().await?;
    let sessions = Arc::new(SessionStore::new());
    let worker = Worker::new(channel.clone(), agent, sessions, event_bus).spawn(rx);

    let app = build_router(Arc::new(GatewayState {
        channel: channel.clone(),
    }));

    info!(addr = %addr, "Gateway listening; webhook at /webhook");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown requested");
        })
        .await?;

    drain(channel.as_ref(), worker).await;
    Ok(())
}

/// Close the ingress queue and wait for the worker to finish what is left.
pub async fn drain(channel: &dyn Channel, worker: JoinHandle<()>) {
    if let Err(e) = channel.stop().await {
        warn!(channel = channel.name(), error = %e, "Channel stop failed");
    }
    if let Err(e) = worker.await {
        error!(error = %e, "Worker task ended abnormally");
    }
    info!("Gateway stopped");
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

async fn verify_handler(
    State(state): State<SharedState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match state.channel.verify_subscription(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
    ) {
        Some(challenge) => {
            info!("Webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            warn!("Webhook subscription rejected");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}

#[derive(Serialize)]
struct WebhookAck {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl WebhookAck {
    fn ok() -> Json<Self> {
        Json(Self {
            status: "ok",
            message: None,
        })
    }

    fn error(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: "error",
            message: Some(message.into()),
        })
    }
}

async fn webhook_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if !state.channel.validate_signature(&body, signature) {
        warn!("Webhook signature mismatch");
        return (StatusCode::UNAUTHORIZED, WebhookAck::error("Invalid signature"));
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, WebhookAck::error("No data received")),
    };

    let Some(messages) = parse_webhook(&payload) else {
        debug!("Ignoring webhook for another object type");
        return (StatusCode::OK, WebhookAck::ok());
    };

    for msg in messages {
        if let Err(e) = state.channel.inject_message(msg).await {
            error!(error = %e, "Could not queue inbound message");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                WebhookAck::error(e.to_string()),
            );
        }
    }

    (StatusCode::OK, WebhookAck::ok())
}
