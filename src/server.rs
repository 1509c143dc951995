use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, error, info, warn};

use crate::llm::ResponseGenerator;
use crate::platform::whatsapp::{is_status_update, is_valid_whatsapp_message};
use crate::router::{process_whatsapp_message, ProcessError};
use crate::sender::MessageSender;

type HmacSha256 = Hmac<Sha256>;

/// Shared application state
pub struct AppState {
    pub verify_token: String,
    pub app_secret: Option<String>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub sender: Arc<dyn MessageSender>,
}

/// Query parameters Meta sends when subscribing the webhook.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(handle_message))
        .with_state(state)
}

/// Serve the webhook until the process is stopped.
pub async fn run(state: Arc<AppState>, bind_address: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    info!("Listening for WhatsApp webhooks on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .await
        .context("Webhook server failed")?;

    Ok(())
}

fn status_response(status: StatusCode, message: Option<&str>) -> Response {
    let body = match message {
        Some(message) => serde_json::json!({ "status": "error", "message": message }),
        None => serde_json::json!({ "status": "ok" }),
    };
    (status, Json(body)).into_response()
}

/// Check `X-Hub-Signature-256: sha256=<hex>` against the app secret.
pub fn verify_signature(payload: &[u8], signature: &str, app_secret: &str) -> bool {
    let Some(hex_signature) = signature.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    // constant-time
    mac.verify_slice(&expected).is_ok()
}

async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyQuery>,
) -> Response {
    let (Some(mode), Some(token)) = (params.mode.as_deref(), params.verify_token.as_deref())
    else {
        warn!("Webhook verification missing parameters");
        return status_response(StatusCode::BAD_REQUEST, Some("Missing parameters"));
    };

    if mode == "subscribe" && token == state.verify_token {
        info!("Webhook verified");
        (StatusCode::OK, params.challenge.unwrap_or_default()).into_response()
    } else {
        warn!("Webhook verification failed (mode: {})", mode);
        status_response(StatusCode::FORBIDDEN, Some("Verification failed"))
    }
}

async fn handle_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(app_secret) = state.app_secret.as_deref() {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(&body, signature, app_secret) {
            warn!("Signature verification failed");
            return status_response(StatusCode::FORBIDDEN, Some("Invalid signature"));
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("Failed to decode JSON: {}", e);
            return status_response(StatusCode::BAD_REQUEST, Some("Invalid JSON provided"));
        }
    };

    if is_status_update(&payload) {
        info!("Received a WhatsApp status update.");
        return status_response(StatusCode::OK, None);
    }

    if !is_valid_whatsapp_message(&payload) {
        return status_response(StatusCode::NOT_FOUND, Some("Not a WhatsApp API event"));
    }

    // Failures stop here: Meta only needs the acknowledgement.
    match process_whatsapp_message(&payload, state.generator.as_ref(), state.sender.as_ref()).await
    {
        Ok(sent) => debug!(
            "Reply accepted with status {} ({}): {}",
            sent.status,
            sent.content_type.as_deref().unwrap_or("-"),
            sent.body
        ),
        Err(ProcessError::Send(e)) => error!(
            "Error sending WhatsApp reply ({}): {} {}",
            e.status_code(),
            e.to_json(),
            e
        ),
        Err(e) => error!("Error processing WhatsApp message: {}", e),
    }

    status_response(StatusCode::OK, None)
}
