use std::io;
use thiserror::Error;

/// Startup-time failures; everything after bind is contained per session
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("listener error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_message_names_address() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:8080".to_string(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };

        let message = err.to_string();
        assert!(message.contains("127.0.0.1:8080"));
        assert!(message.contains("address in use"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: ServerError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, ServerError::Io(_)));
    }
}
