//! WebSocket handler.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS at `{route_prefix}/:client_id`
//! - Register the connection under its client id (a reconnect supersedes the old one)
//! - Lifecycle: ping + idle timeout
//! - Decode-once, then hand requests to the reply pipeline with at most one reply streaming
//!   per connection; later requests queue up to `reply.max_queued_requests`, then get BUSY

use std::collections::VecDeque;

use axum::{
    extract::{ws::Message, ws::WebSocket, ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::Instrument;

use streamrelay_core::error::{ClientCode, RelayError, Result};
use streamrelay_core::protocol::{encode_text, ErrorNotice, RelayRequest};

use crate::app_state::AppState;
use crate::realtime::Connection;
use crate::transport::codec::{decode, Inbound};

const OUTBOUND_QUEUE: usize = 1024;
const IDLE_CHECK_EVERY: Duration = Duration::from_millis(250);
const MAX_CLIENT_ID_LEN: usize = 128;

/// Client ids are the last path segment: 1..=128 chars of `[A-Za-z0-9._-]`.
pub fn validate_client_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_CLIENT_ID_LEN {
        return Err(RelayError::BadRequest(format!(
            "client id must be 1..={MAX_CLIENT_ID_LEN} characters"
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(RelayError::BadRequest(
            "client id may only contain [A-Za-z0-9._-]".into(),
        ));
    }
    Ok(())
}

fn notice_json(code: &str, msg: &str) -> String {
    encode_text(&ErrorNotice::new(code, msg)).unwrap_or_else(|_| {
        r#"{"type":"error","code":"INTERNAL","message":"notice encode failed"}"#.to_string()
    })
}

// --------------------
// Entry
// --------------------
pub async fn ws_upgrade(
    State(app): State<AppState>,
    Path(client_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let metrics = app.metrics();

    if let Err(e) = validate_client_id(&client_id) {
        metrics.handshake_rejections.inc(&[("reason", "bad_client_id")]);
        return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
    }
    if app.is_draining() {
        metrics.handshake_rejections.inc(&[("reason", "draining")]);
        return (StatusCode::SERVICE_UNAVAILABLE, "draining").into_response();
    }

    metrics.ws_upgrades.inc(&[]);

    // Oversize frames up to twice the policy limit still arrive so they can be refused with a
    // notice; beyond that the transport itself closes the connection.
    let hard_limit = app.cfg().gateway.max_frame_bytes.saturating_mul(2);
    ws.max_message_size(hard_limit)
        .max_frame_size(hard_limit)
        .on_upgrade(move |socket| async move {
            if let Err(e) = run_session(app, client_id, socket).await {
                tracing::warn!(error = %e, "session ended with error");
            }
        })
}

// --------------------
// Session local state
// --------------------
struct SessionState {
    last_activity: Instant,
    streaming: Option<JoinHandle<()>>,
    queued: VecDeque<RelayRequest>,
    max_queued: usize,
}

impl SessionState {
    fn new(max_queued: usize) -> Self {
        Self {
            last_activity: Instant::now(),
            streaming: None,
            queued: VecDeque::new(),
            max_queued,
        }
    }
}

/// Per-connection context needed to start replies.
struct ReplyCtx {
    app: AppState,
    client_id: String,
    out_tx: mpsc::Sender<Message>,
    done_tx: mpsc::UnboundedSender<()>,
}

impl ReplyCtx {
    fn start(&self, req: RelayRequest) -> JoinHandle<()> {
        self.app.streamer().start_reply(
            self.client_id.clone(),
            req,
            self.out_tx.clone(),
            self.done_tx.clone(),
        )
    }

    /// Start immediately when idle, otherwise queue or refuse.
    async fn admit(&self, sess: &mut SessionState, req: RelayRequest) {
        if sess.streaming.is_none() {
            sess.streaming = Some(self.start(req));
            return;
        }
        if sess.queued.len() < sess.max_queued {
            sess.queued.push_back(req);
            tracing::debug!(queued = sess.queued.len(), "reply in flight; request queued");
            return;
        }
        self.app.metrics().busy_rejections.inc(&[]);
        tracing::debug!("reply in flight and queue full; request refused");
        let _ = self
            .out_tx
            .send(Message::Text(notice_json(
                ClientCode::Busy.as_str(),
                "a reply is already streaming on this connection",
            )))
            .await;
    }

    /// Previous reply finished: start the next queued request, if any.
    fn advance(&self, sess: &mut SessionState) {
        self.app.metrics().replies_finished.inc(&[]);
        sess.streaming = sess.queued.pop_front().map(|req| self.start(req));
    }
}

// --------------------
// Core session loop
// --------------------
async fn run_session(app: AppState, client_id: String, socket: WebSocket) -> Result<()> {
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);

    let registry = app.registry();
    let reg = registry.register(&client_id, Connection { tx: out_tx.clone() });
    let generation = reg.generation;
    if let Some(old) = reg.superseded {
        app.metrics().superseded_connections.inc(&[]);
        let _ = old.tx.try_send(Message::Close(None));
    }

    let span = tracing::info_span!("session", client_id = %client_id, generation);
    let metrics = app.metrics();
    metrics.ws_active_sessions.inc(&[]);

    let result = session_loop(app.clone(), client_id.clone(), generation, socket, out_tx, &mut out_rx)
        .instrument(span)
        .await;

    metrics.ws_active_sessions.dec(&[]);
    registry.unregister(&client_id, generation);
    result
}

async fn session_loop(
    app: AppState,
    client_id: String,
    generation: u64,
    socket: WebSocket,
    out_tx: mpsc::Sender<Message>,
    out_rx: &mut mpsc::Receiver<Message>,
) -> Result<()> {
    tracing::info!("client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();

    let gw = &app.cfg().gateway;
    let max_frame_bytes = gw.max_frame_bytes;
    let ping_every = Duration::from_millis(gw.ping_interval_ms);
    let idle_timeout = Duration::from_millis(gw.idle_timeout_ms);

    let mut ping_tick = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let registry = app.registry();
    let metrics = app.metrics();
    let mut sess = SessionState::new(app.cfg().reply.max_queued_requests);
    let ctx = ReplyCtx {
        app: app.clone(),
        client_id: client_id.clone(),
        out_tx: out_tx.clone(),
        done_tx,
    };

    loop {
        tokio::select! {
            // outbound writer
            maybe_out = out_rx.recv() => {
                match maybe_out {
                    Some(Message::Close(frame)) => {
                        let _ = ws_tx.send(Message::Close(frame)).await;
                        tracing::info!("connection closed by relay");
                        break;
                    }
                    Some(m) => {
                        if ws_tx.send(m).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(incoming) = incoming else { break; };
                let Ok(msg) = incoming else { break; };

                sess.last_activity = Instant::now();

                // frames from a superseded connection are discarded
                if !registry.is_current(&client_id, generation) {
                    tracing::debug!("connection superseded; dropping frame");
                    break;
                }

                match decode(msg, max_frame_bytes) {
                    Ok(Inbound::Request { req, kind, bytes_len }) => {
                        metrics.requests.inc(&[("frame", kind.as_str())]);
                        tracing::debug!(
                            frame = kind.as_str(),
                            bytes_len,
                            activity_id = %req.request.activity_id,
                            "request received"
                        );
                        ctx.admit(&mut sess, req).await;
                    }
                    Ok(Inbound::Ping(payload)) => {
                        let _ = out_tx.send(Message::Pong(payload)).await;
                    }
                    Ok(Inbound::Pong) => {}
                    Ok(Inbound::Close) => break,
                    Err(e) => {
                        let code = e.client_code().as_str();
                        metrics.decode_errors.inc(&[("code", code)]);
                        tracing::debug!(error = %e, "frame refused");
                        let _ = out_tx.send(Message::Text(notice_json(code, &e.to_string()))).await;
                    }
                }
            }

            // reply finished
            Some(()) = done_rx.recv() => {
                ctx.advance(&mut sess);
            }

            // ping
            _ = ping_tick.tick() => {
                let _ = out_tx.send(Message::Ping(Vec::new())).await;
            }

            // idle timeout
            _ = tokio::time::sleep(IDLE_CHECK_EVERY) => {
                if sess.last_activity.elapsed() >= idle_timeout {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    tracing::info!("idle timeout");
                    break;
                }
            }
        }
    }

    if let Some(h) = sess.streaming.take() {
        h.abort();
    }
    tracing::info!(dropped_requests = sess.queued.len(), "client disconnected");
    Ok(())
}
