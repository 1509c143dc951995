use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::config::WhatsAppConfig;

/// Text message envelope for the Cloud API `/messages` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub messaging_product: &'static str,
    pub recipient_type: &'static str,
    pub to: String,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub text: OutboundText,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundText {
    pub preview_url: bool,
    pub body: String,
}

impl OutboundMessage {
    pub fn text(recipient: &str, body: &str) -> Self {
        Self {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: recipient.to_string(),
            message_type: "text",
            text: OutboundText {
                preview_url: false,
                body: body.to_string(),
            },
        }
    }
}

/// What the platform answered to a successful send.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("request timed out")]
    Timeout(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl SendError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            error!("Timeout occurred while sending message");
            SendError::Timeout(e)
        } else {
            error!("Request failed due to: {}", e);
            SendError::Request(e)
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SendError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            SendError::Request(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            SendError::Timeout(_) => "Request timed out",
            SendError::Request(_) => "Failed to send message",
        }
    }

    /// `{"status": "error", "message": ...}` body describing the failure.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "status": "error", "message": self.message() })
    }
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<SentMessage, SendError>;
}

/// Sends replies through the WhatsApp Cloud API. One attempt per message.
pub struct WhatsAppClient {
    client: reqwest::Client,
    url: String,
    access_token: String,
    timeout: Duration,
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.messages_url(),
            access_token: config.access_token.clone(),
            timeout: config.send_timeout(),
        }
    }
}

#[async_trait]
impl MessageSender for WhatsAppClient {
    async fn send(&self, message: &OutboundMessage) -> Result<SentMessage, SendError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.access_token)
            .json(message)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(SendError::from_reqwest)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(SendError::from_reqwest)?;

        info!("Status: {}", status);
        info!("Content-type: {}", content_type.as_deref().unwrap_or("<none>"));
        info!("Body: {}", body);

        Ok(SentMessage {
            status,
            content_type,
            body,
        })
    }
}
