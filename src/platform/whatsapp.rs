//! Inbound WhatsApp Cloud API webhook payloads.
//!
//! Meta gives no guarantees about which parts of an event are present, so the
//! helpers walk the JSON one level at a time and only the first message and
//! contact are parsed into the typed records below, every field optional.
//! Siblings after index 0 are never looked at.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::platform::IncomingMessage;

#[derive(Debug, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub text: Option<TextBody>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TextBody {
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("malformed webhook payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Null, false, zero and empty strings/arrays/objects count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn present<'a>(value: Option<&'a Value>) -> Option<&'a Value> {
    value.filter(|v| is_present(v))
}

/// `entry[0].changes[0].value`, if every step along the way is present.
fn first_change_value(body: &Value) -> Option<&Value> {
    present(body.get("entry"))
        .and_then(|entry| entry.get(0))
        .and_then(|entry| present(entry.get("changes")))
        .and_then(|changes| changes.get(0))
        .and_then(|change| present(change.get("value")))
}

/// Best-effort shape check for a message event. Never fails; a malformed or
/// partial payload is simply not a message.
pub fn is_valid_whatsapp_message(body: &Value) -> bool {
    present(body.get("object")).is_some()
        && first_change_value(body)
            .and_then(|value| present(value.get("messages")))
            .and_then(|messages| present(messages.get(0)))
            .is_some()
}

/// Delivery and read receipts arrive on the same webhook but carry no message.
pub fn is_status_update(body: &Value) -> bool {
    first_change_value(body)
        .and_then(|value| present(value.get("statuses")))
        .is_some()
}

/// Pull sender id, sender name and text out of a message event.
///
/// Validation is advisory: a payload that passed [`is_valid_whatsapp_message`]
/// can still lack a field here (non-text messages have no `text.body`).
pub fn extract_message(body: &Value) -> Result<IncomingMessage, ExtractError> {
    let value = first(body.get("entry"))
        .and_then(|entry| first(entry.get("changes")))
        .and_then(|change| change.get("value"))
        .filter(|value| !value.is_null())
        .ok_or(ExtractError::MissingField("entry[0].changes[0].value"))?;

    let message = first(value.get("messages"))
        .map(Message::deserialize)
        .transpose()?
        .ok_or(ExtractError::MissingField("messages[0]"))?;

    let user_id = message
        .from
        .ok_or(ExtractError::MissingField("messages[0].from"))?;

    let user_name = first(value.get("contacts"))
        .map(Contact::deserialize)
        .transpose()?
        .and_then(|contact| contact.profile)
        .and_then(|profile| profile.name)
        .ok_or(ExtractError::MissingField("contacts[0].profile.name"))?;

    let text = message
        .text
        .and_then(|text| text.body)
        .ok_or(ExtractError::MissingField("messages[0].text.body"))?;

    Ok(IncomingMessage {
        user_id,
        user_name,
        text,
    })
}

/// Element 0 of a JSON array; null elements count as absent.
fn first(array: Option<&Value>) -> Option<&Value> {
    array
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .filter(|item| !item.is_null())
}
