//! Shared set of active chat sessions and the broadcast fan-out
//!
//! The registry is the only place session membership lives. Sessions are
//! added when they become active and removed when they close; every broadcast
//! works from a snapshot of the membership taken under the lock, so the lock
//! is never held while lines are handed to recipients.

use crate::session::{Outbox, SessionHandle};
use log::{debug, info, warn};
use shared::ClientId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Tracks every active session and fans lines out between them
///
/// Identities come from a single counter that only ever moves forward, so an
/// identity is never handed out twice during the server's lifetime, no matter
/// how many sessions register concurrently or how many have left.
pub struct SessionRegistry {
    /// Active sessions indexed by their identity
    sessions: RwLock<HashMap<ClientId, SessionHandle>>,
    /// Next identity to hand out
    next_client_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates an empty registry whose first identity is 0
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_client_id: AtomicU64::new(0),
        }
    }

    /// Admits a session and returns its freshly assigned identity
    ///
    /// The identity is taken and the session inserted under the write lock,
    /// so no broadcast can observe a half-registered session.
    pub async fn register(&self, outbox: Outbox) -> ClientId {
        let mut sessions = self.sessions.write().await;
        let client_id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        sessions.insert(client_id, SessionHandle::new(client_id, outbox));
        info!(
            "Client {} registered ({} active)",
            client_id,
            sessions.len()
        );
        client_id
    }

    /// Removes a session from the active set
    ///
    /// Returns true if the session was present. Removing a session that is
    /// already gone is a no-op, so racing teardown paths are harmless.
    pub async fn unregister(&self, client_id: ClientId) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(&client_id).is_some() {
            info!(
                "Client {} unregistered ({} active)",
                client_id,
                sessions.len()
            );
            true
        } else {
            false
        }
    }

    /// Delivers `line` to every active session except `exclude`
    ///
    /// Each recipient is independent: a recipient that can no longer accept
    /// lines, either because it has stopped or because its outbox is full, is
    /// unregistered once the fan-out is done and the remaining recipients are
    /// unaffected. Returns how many sessions the line was
    /// handed to.
    pub async fn broadcast(&self, line: &str, exclude: Option<ClientId>) -> usize {
        let recipients: Vec<SessionHandle> = {
            let sessions = self.sessions.read().await;
            sessions
                .values()
                .filter(|handle| Some(handle.id()) != exclude)
                .cloned()
                .collect()
        };

        let mut delivered = 0;
        let mut failed = Vec::new();

        for handle in &recipients {
            if handle.deliver(line) {
                delivered += 1;
            } else {
                failed.push(handle.id());
            }
        }

        for client_id in failed {
            warn!(
                "Client {} is unreachable or too slow, removing from registry",
                client_id
            );
            self.unregister(client_id).await;
        }

        debug!(
            "Broadcast from {:?} reached {}/{} sessions",
            exclude,
            delivered,
            recipients.len()
        );

        delivered
    }

    /// Unregisters every session and returns how many there were
    ///
    /// Dropping the handles closes each session's outbox, which in turn ends
    /// its writer and read loop.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<ClientId> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(id, _)| id).collect()
        };

        if !drained.is_empty() {
            info!("Closed {} active sessions", drained.len());
        }

        drained.len()
    }

    /// Returns true if the identity belongs to an active session
    pub async fn contains(&self, client_id: ClientId) -> bool {
        self.sessions.read().await.contains_key(&client_id)
    }

    /// Returns the number of active sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true if no session is active
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
