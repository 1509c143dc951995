pub mod whatsapp;

/// A text message received from the platform
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    /// Platform-specific user ID as string (the WhatsApp ID doubles as the reply address)
    pub user_id: String,
    /// Display name of the user
    pub user_name: String,
    /// The message text
    pub text: String,
}
