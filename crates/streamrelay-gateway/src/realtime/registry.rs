use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// One connection's outbound queue sender.
#[derive(Clone)]
pub struct Connection {
    pub tx: mpsc::Sender<Message>,
}

#[derive(Clone)]
struct ClientEntry {
    conn: Connection,
    generation: u64,
}

/// Outcome of registering a connection.
pub struct Registration {
    /// Generation assigned to the new connection.
    pub generation: u64,
    /// Connection that previously held this client id, if any.
    pub superseded: Option<Connection>,
}

/// Client registry: `client_id -> (generation, Connection)`.
pub struct ClientRegistry {
    clients: DashMap<String, ClientEntry>,
    seq: AtomicU64,
    draining: AtomicBool,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            seq: AtomicU64::new(1),
            draining: AtomicBool::new(false),
        }
    }

    /// Register `conn` as the live connection for `client_id`.
    pub fn register(&self, client_id: &str, conn: Connection) -> Registration {
        let generation = self.seq.fetch_add(1, Ordering::Relaxed);
        let superseded = self
            .clients
            .insert(client_id.to_string(), ClientEntry { conn, generation })
            .map(|old| old.conn);
        Registration {
            generation,
            superseded,
        }
    }

    /// Remove the entry only if it still belongs to `generation`.
    pub fn unregister(&self, client_id: &str, generation: u64) -> bool {
        self.clients
            .remove_if(client_id, |_, e| e.generation == generation)
            .is_some()
    }

    pub fn is_current(&self, client_id: &str, generation: u64) -> bool {
        self.clients
            .get(client_id)
            .map(|e| e.generation == generation)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    /// Ask every live connection to close.
    pub fn close_all(&self) {
        for e in self.clients.iter() {
            let _ = e.value().conn.tx.try_send(Message::Close(None));
        }
    }
}
