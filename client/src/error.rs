use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("unexpected first line from server: {0:?}")]
    Handshake(String),
    #[error("server closed the connection")]
    Disconnected,
    #[error(transparent)]
    Io(#[from] io::Error),
}
