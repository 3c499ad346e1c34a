//! streamrelay client runtime.
//!
//! - `identity`: stable client id, persisted in a [`KeyValueStore`]
//! - `connection`: one logical connection per client with backoff and subscriber fan-out
//! - `assembler`: paced reassembly of streamed replies
//! - `chat`: request building and the send path
//! - `activity` / `session`: activity resolution, validity check, and session records

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod activity;
pub mod assembler;
pub mod backoff;
pub mod chat;
pub mod config;
pub mod connection;
pub mod events;
pub mod identity;
pub mod session;
pub mod storage;
pub mod timer;
pub mod transport;

pub use activity::{resolve_activity_id, ActivityChecker};
pub use assembler::{ChatMessage, ClientReplyAssembler, Role};
pub use backoff::{Backoff, RetryPolicy};
pub use chat::{Attachment, ChatSession};
pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState, SendStatus};
pub use events::{CloseInfo, Subscriber, Subscription};
pub use identity::ClientIdentity;
pub use session::{SessionStore, UserSession};
pub use storage::{FileStore, KeyValueStore, MemoryStore, UnavailableStore};
pub use streamrelay_core::activity::ActivityStatus;
pub use transport::{Connector, Transport, WsConnector};

use std::sync::Arc;

/// Wire a chat view: identity from `store`, a WebSocket connection to the configured host,
/// and an assembler subscribed to it.
///
/// The returned [`Subscription`] keeps the assembler registered; drop it on teardown.
pub fn connect_chat(
    cfg: &ClientConfig,
    store: Arc<dyn KeyValueStore>,
    activity_query: Option<&str>,
) -> (ChatSession, Subscription) {
    let client_id = ClientIdentity::new(Arc::clone(&store)).get_or_create_id();
    let activity_id = resolve_activity_id(store.as_ref(), activity_query);
    let connection = ConnectionManager::new(WsConnector, cfg.ws_url(&client_id), cfg.retry.policy());
    let assembler = Arc::new(ClientReplyAssembler::new(cfg.render));
    let subscription = connection.subscribe(assembler.clone());
    connection.ensure_connection();

    tracing::info!(%client_id, %activity_id, url = connection.url(), "chat session ready");
    let chat = ChatSession::new(
        connection,
        assembler,
        SessionStore::new(store),
        activity_id,
        cfg.max_upload_bytes,
    );
    (chat, subscription)
}
