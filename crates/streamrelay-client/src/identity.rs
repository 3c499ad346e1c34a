//! Stable per-client identifier.

use std::sync::{Arc, OnceLock};

use uuid::Uuid;

use crate::storage::KeyValueStore;

/// Storage key holding the client id.
pub const CLIENT_ID_KEY: &str = "ws_client_id";

/// Resolves the id used to address this client's logical connection.
///
/// The first call reads the stored id or generates and stores a new one; the result is cached
/// for the lifetime of this value. Storage failures never surface: the id then lives only as
/// long as the process.
pub struct ClientIdentity {
    store: Arc<dyn KeyValueStore>,
    cached: OnceLock<String>,
}

impl ClientIdentity {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            cached: OnceLock::new(),
        }
    }

    pub fn get_or_create_id(&self) -> String {
        self.cached.get_or_init(|| self.load_or_generate()).clone()
    }

    fn load_or_generate(&self) -> String {
        match self.store.get(CLIENT_ID_KEY) {
            Ok(Some(id)) if !id.trim().is_empty() => return id,
            Ok(_) => {}
            Err(e) => {
                let id = generate();
                tracing::warn!(error = %e, client_id = %id, "storage unavailable; using ephemeral client id");
                return id;
            }
        }

        let id = generate();
        if let Err(e) = self.store.set(CLIENT_ID_KEY, &id) {
            tracing::warn!(error = %e, client_id = %id, "could not persist client id");
        } else {
            tracing::debug!(client_id = %id, "generated client id");
        }
        id
    }
}

fn generate() -> String {
    Uuid::new_v4().to_string()
}
