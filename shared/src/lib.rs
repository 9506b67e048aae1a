pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

pub const HANDSHAKE_PREFIX: &str = "Your user ID is: ";
pub const CHAT_PREFIX: &str = "Client ";
pub const CHAT_SEPARATOR: &str = ": ";

pub type ClientId = u64;

/// A line received from the server, as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Identity assignment, always the first line of a connection.
    Assigned(ClientId),
    /// A line another client sent, attributed to its sender.
    Chat { sender: ClientId, text: String },
    /// Anything that matches neither shape.
    Other(String),
}

pub fn default_addr() -> String {
    format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT)
}

pub fn handshake_line(id: ClientId) -> String {
    format!("{}{}", HANDSHAKE_PREFIX, id)
}

pub fn chat_line(sender: ClientId, text: &str) -> String {
    format!("{}{}{}{}", CHAT_PREFIX, sender, CHAT_SEPARATOR, text)
}

pub fn parse_server_line(line: &str) -> ServerLine {
    if let Some(rest) = line.strip_prefix(HANDSHAKE_PREFIX) {
        if let Ok(id) = rest.trim().parse() {
            return ServerLine::Assigned(id);
        }
    }

    if let Some(rest) = line.strip_prefix(CHAT_PREFIX) {
        // The text itself may contain ": ", so split on the first one only
        if let Some((sender, text)) = rest.split_once(CHAT_SEPARATOR) {
            if let Ok(sender) = sender.parse() {
                return ServerLine::Chat {
                    sender,
                    text: text.to_string(),
                };
            }
        }
    }

    ServerLine::Other(line.to_string())
}

/// Normalises user input into a single protocol line.
///
/// Surrounding whitespace is trimmed and empty input yields `None`. Embedded
/// line breaks are replaced by spaces so one submission is always one line.
pub fn outgoing_line(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    Some(
        trimmed
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect(),
    )
}
