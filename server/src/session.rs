//! Per-connection chat session
//!
//! A session owns one transport split into a buffered line reader and a
//! writer. The writer lives in its own task and is fed through an outbox
//! channel, so other sessions can deliver lines without ever blocking on this
//! session's socket. The read loop runs in the task that owns the session.

use crate::registry::SessionRegistry;
use log::{debug, error, info, warn};
use shared::{chat_line, handshake_line, ClientId};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Sending side of a session's outbound line queue
pub type Outbox = mpsc::Sender<String>;

/// Lines a session may have queued before it counts as too slow to keep
pub const OUTBOX_CAPACITY: usize = 1024;

/// Longest a single line may take to reach the transport
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `close` lets the writer flush before abandoning it
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle of a session; `Closed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
}

/// Outbound-write capability of an active session
///
/// This is what the registry holds and what other sessions deliver through.
/// It never touches the transport directly.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: ClientId,
    outbox: Outbox,
}

impl SessionHandle {
    pub(crate) fn new(id: ClientId, outbox: Outbox) -> Self {
        Self { id, outbox }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Queues one line for the session's writer without waiting on the socket
    ///
    /// Returns false once the writer has stopped, meaning the session is
    /// failed or closed, and also when the outbox is full because the peer is
    /// not reading fast enough.
    pub fn deliver(&self, line: &str) -> bool {
        match self.outbox.try_send(line.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Outbox of client {} is full", self.id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

enum ReadEvent {
    Line(io::Result<Option<String>>),
    WriterStopped,
}

/// Server-side representation of one connected client
pub struct ClientSession<R, W> {
    peer: SocketAddr,
    registry: Arc<SessionRegistry>,
    lines: Lines<BufReader<R>>,
    /// Held until activation hands it to the writer task
    writer: Option<W>,
    writer_task: Option<JoinHandle<()>>,
    id: Option<ClientId>,
    state: SessionState,
}

impl ClientSession<OwnedReadHalf, OwnedWriteHalf> {
    /// Wraps an accepted TCP stream in a new session
    pub fn from_stream(
        stream: TcpStream,
        peer: SocketAddr,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(peer, reader, writer, registry)
    }
}

impl<R, W> ClientSession<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(peer: SocketAddr, reader: R, writer: W, registry: Arc<SessionRegistry>) -> Self {
        Self {
            peer,
            registry,
            lines: BufReader::new(reader).lines(),
            writer: Some(writer),
            writer_task: None,
            id: None,
            state: SessionState::Connecting,
        }
    }

    pub fn id(&self) -> Option<ClientId> {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Registers the session and starts its writer
    ///
    /// The identity line is the first thing the writer sends, ahead of any
    /// broadcast that was queued between registration and the writer's first
    /// poll. Returns the identity while the session is active and `None`
    /// once it has closed.
    pub async fn activate(&mut self) -> Option<ClientId> {
        match self.state {
            SessionState::Active => return self.id,
            SessionState::Closed => return None,
            SessionState::Connecting => {}
        }

        let writer = self.writer.take()?;
        let (outbox, inbox) = mpsc::channel(OUTBOX_CAPACITY);
        let client_id = self.registry.register(outbox).await;

        self.writer_task = Some(tokio::spawn(write_loop(
            client_id,
            writer,
            inbox,
            Arc::clone(&self.registry),
        )));
        self.id = Some(client_id);
        self.state = SessionState::Active;

        info!("Client {} connected from {}", client_id, self.peer);
        Some(client_id)
    }

    /// Rebroadcasts every received line until the connection ends
    ///
    /// Stops on end of stream, on a read error (including a line that is not
    /// valid UTF-8) or when the writer has stopped, then closes the session.
    pub async fn read_loop(&mut self) {
        let Some(client_id) = self.id.filter(|_| self.state == SessionState::Active) else {
            return;
        };

        loop {
            let event = match self.writer_task.as_mut() {
                Some(writer_task) => tokio::select! {
                    line = self.lines.next_line() => ReadEvent::Line(line),
                    _ = writer_task => ReadEvent::WriterStopped,
                },
                None => ReadEvent::Line(self.lines.next_line().await),
            };

            match event {
                ReadEvent::Line(Ok(Some(line))) => {
                    debug!("Received from client {}: {}", client_id, line);
                    self.registry
                        .broadcast(&chat_line(client_id, &line), Some(client_id))
                        .await;
                }
                ReadEvent::Line(Ok(None)) => {
                    debug!("Client {} reached end of stream", client_id);
                    break;
                }
                ReadEvent::Line(Err(e)) => {
                    warn!("Read from client {} failed: {}", client_id, e);
                    break;
                }
                ReadEvent::WriterStopped => {
                    // Already joined by the select
                    self.writer_task = None;
                    debug!("Writer for client {} stopped", client_id);
                    break;
                }
            }
        }

        self.close().await;
    }

    /// Activates the session if needed and serves it until it closes
    pub async fn run(mut self) -> Option<ClientId> {
        let client_id = self.activate().await?;
        self.read_loop().await;
        Some(client_id)
    }

    /// Moves the session to `Closed`, releasing its registry entry and transport
    ///
    /// Gives the writer a short grace period to flush whatever was already
    /// queued. A writer still blocked on the transport after that is aborted,
    /// which drops the transport. Closing twice is a no-op.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;

        if let Some(client_id) = self.id {
            self.registry.unregister(client_id).await;
        }

        // Never activated: the writer was not handed to a task yet
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }

        if let Some(mut writer_task) = self.writer_task.take() {
            match timeout(CLOSE_GRACE, &mut writer_task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Writer task for {} panicked: {}", self.peer, e),
                Err(_) => {
                    warn!("Writer for {} did not finish, aborting it", self.peer);
                    writer_task.abort();
                    // Cancelled join; the transport is dropped by the time it resolves
                    let _ = writer_task.await;
                }
            }
        }

        match self.id {
            Some(client_id) => info!("Client {} disconnected", client_id),
            None => info!("Connection from {} closed before activation", self.peer),
        }
    }
}

/// Writes the identity line, then every queued line, until the outbox closes
///
/// The outbox closes once the registry drops the session's handle. A write
/// failure, including a line that stalls past `WRITE_TIMEOUT`, unregisters
/// the session, which the read loop notices through this task finishing.
async fn write_loop<W>(
    client_id: ClientId,
    mut writer: W,
    mut inbox: mpsc::Receiver<String>,
    registry: Arc<SessionRegistry>,
) where
    W: AsyncWrite + Unpin,
{
    let result = async {
        write_line(&mut writer, &handshake_line(client_id)).await?;
        while let Some(line) = inbox.recv().await {
            write_line(&mut writer, &line).await?;
        }
        Ok::<(), io::Error>(())
    }
    .await;

    match result {
        Ok(()) => {
            if let Err(e) = writer.shutdown().await {
                debug!("Shutdown of client {} transport failed: {}", client_id, e);
            }
        }
        Err(e) => {
            warn!("Write to client {} failed: {}", client_id, e);
            inbox.close();
            registry.unregister(client_id).await;
        }
    }
}

async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut framed = String::with_capacity(line.len() + 1);
    framed.push_str(line);
    framed.push('\n');

    let write = async {
        writer.write_all(framed.as_bytes()).await?;
        writer.flush().await
    };
    timeout(WRITE_TIMEOUT, write)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write stalled"))?
}
