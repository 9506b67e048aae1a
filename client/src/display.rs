//! Text shown to the user for each protocol event

use shared::{ClientId, ServerLine};

pub const DISCONNECTED: &str = "Disconnected from server.";
pub const CONNECT_FAILED: &str =
    "Failed to connect to the server. Please ensure the server is running and try again.";

pub fn welcome(user_id: ClientId) -> String {
    format!("Connected to server. Your user ID is: {}", user_id)
}

/// Echo of a line the user sent, so it stands apart from other clients' lines
pub fn own_message(text: &str) -> String {
    format!("You: {}", text)
}

/// Renders a line received after the handshake
pub fn render(line: &ServerLine) -> String {
    match line {
        ServerLine::Assigned(id) => welcome(*id),
        ServerLine::Chat { sender, text } => shared::chat_line(*sender, text),
        ServerLine::Other(raw) => raw.clone(),
    }
}
