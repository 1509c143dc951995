use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::commands;
use crate::format::process_text_for_whatsapp;
use crate::llm::ResponseGenerator;
use crate::platform::whatsapp::{extract_message, ExtractError};
use crate::sender::{MessageSender, OutboundMessage, SendError, SentMessage};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("could not extract message: {0}")]
    Extraction(#[from] ExtractError),
    #[error("response generation failed: {0:#}")]
    Generation(anyhow::Error),
    #[error("could not send reply: {0}")]
    Send(#[from] SendError),
}

/// Answer one inbound message event: extract, pick a reply, format it and
/// send it back to the sender. At most one send per event.
pub async fn process_whatsapp_message(
    body: &Value,
    generator: &dyn ResponseGenerator,
    sender: &dyn MessageSender,
) -> Result<SentMessage, ProcessError> {
    let incoming = extract_message(body)?;

    info!(
        "WhatsApp message from {} ({}): {}",
        incoming.user_name, incoming.user_id, incoming.text
    );

    let response = commands::resolve_reply(&incoming, generator)
        .await
        .map_err(ProcessError::Generation)?;

    let response = process_text_for_whatsapp(&response);
    debug!("Replying to {} with {} chars", incoming.user_id, response.len());

    let message = OutboundMessage::text(&incoming.user_id, &response);
    Ok(sender.send(&message).await?)
}
