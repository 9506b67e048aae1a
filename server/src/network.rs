//! Server network layer: listening socket and accept loop

use crate::error::ServerError;
use crate::registry::SessionRegistry;
use crate::session::ClientSession;
use log::{error, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// First pause after a failed accept; doubles with each further failure
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Consecutive listener failures after which the listener counts as unusable
const MAX_ACCEPT_FAILURES: u32 = 10;

#[derive(Debug, PartialEq, Eq)]
enum AcceptAction {
    Retry,
    RetryAfter(Duration),
    Stop,
}

/// Tracks failed accepts and decides whether the loop keeps going
#[derive(Debug, Default)]
struct AcceptErrors {
    consecutive: u32,
}

impl AcceptErrors {
    fn on_error(&mut self, e: &io::Error) -> AcceptAction {
        match e.kind() {
            // Only the connection being accepted is affected
            io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut => AcceptAction::Retry,
            io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported => AcceptAction::Stop,
            // Resource exhaustion and the like: may clear up, but not forever
            _ => {
                self.consecutive += 1;
                if self.consecutive >= MAX_ACCEPT_FAILURES {
                    return AcceptAction::Stop;
                }
                let backoff = ACCEPT_BACKOFF * 2u32.pow(self.consecutive - 1);
                AcceptAction::RetryAfter(backoff.min(MAX_ACCEPT_BACKOFF))
            }
        }
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }
}

/// Owns the listening socket and turns accepted connections into sessions
pub struct Server {
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    max_clients: Option<usize>,
}

impl Server {
    /// Binds the listening endpoint
    ///
    /// Failing to bind is the one fatal error the server has.
    pub async fn bind(addr: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            registry: Arc::new(SessionRegistry::new()),
            max_clients: None,
        })
    }

    /// Caps concurrent sessions; `None` leaves the server unbounded
    pub fn with_max_clients(mut self, max_clients: Option<usize>) -> Self {
        self.max_clients = max_clients;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accepts connections forever
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves
    ///
    /// Each connection is registered here, in accept order, and its read loop
    /// is spawned as a task of its own. The loop also ends if the listener
    /// itself becomes unusable. Either way the listener is then closed and
    /// every remaining session is forced closed.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut accept_errors = AcceptErrors::default();
        info!("Server started successfully");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Server shutting down");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        accept_errors.reset();
                        self.admit(stream, peer).await;
                    }
                    Err(e) => match accept_errors.on_error(&e) {
                        AcceptAction::Retry => warn!("Failed to accept connection: {}", e),
                        AcceptAction::RetryAfter(pause) => {
                            error!("Failed to accept connection: {}, retrying in {:?}", e, pause);
                            tokio::time::sleep(pause).await;
                        }
                        AcceptAction::Stop => {
                            error!("Listener is no longer usable, stopping: {}", e);
                            break;
                        }
                    },
                },
            }
        }

        drop(self.listener);
        self.registry.close_all().await;
    }

    async fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        if let Some(max_clients) = self.max_clients {
            if self.registry.len().await >= max_clients {
                warn!(
                    "Rejecting connection from {}: server full ({} clients)",
                    peer, max_clients
                );
                return;
            }
        }

        info!("New client connected from {}", peer);

        let mut session = ClientSession::from_stream(stream, peer, Arc::clone(&self.registry));
        if session.activate().await.is_some() {
            tokio::spawn(async move {
                session.read_loop().await;
            });
        }
    }
}
