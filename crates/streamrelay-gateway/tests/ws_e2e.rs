#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use streamrelay_core::protocol::encode_composite;
use streamrelay_gateway::{config, AppState};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Server {
    addr: SocketAddr,
    _stop: oneshot::Sender<()>,
}

async fn spawn_gateway(yaml: &str) -> Server {
    let cfg = config::load_from_str(yaml).unwrap();
    let state = AppState::new(cfg).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(streamrelay_gateway::serve(listener, state, async move {
        let _ = stopped.await;
    }));
    Server { addr, _stop: stop }
}

const FAST: &str = "version: 1\nreply:\n  token_interval_ms: 5\n";

async fn connect(addr: SocketAddr, client_id: &str) -> Ws {
    let url = format!("ws://{addr}/ws/ondemand/{client_id}");
    let (ws, _) = connect_async(url.as_str()).await.unwrap();
    ws
}

/// Next JSON text frame, skipping control frames.
async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            Message::Text(t) => return serde_json::from_str(&t).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Collect one reply: concatenated content up to the completion marker, plus any notices seen.
async fn read_reply(ws: &mut Ws) -> (String, Vec<Value>) {
    let mut text = String::new();
    let mut notices = Vec::new();
    loop {
        let v = next_json(ws).await;
        match v["type"].as_str() {
            Some("message") if v["isComplete"] == json!(true) => {
                assert!(v.get("content").is_none());
                return (text, notices);
            }
            Some("message") => text.push_str(v["content"].as_str().unwrap()),
            Some("error") => notices.push(v),
            other => panic!("unexpected type: {other:?}"),
        }
    }
}

#[tokio::test]
async fn json_request_streams_echo_reply() {
    let srv = spawn_gateway(FAST).await;
    let mut ws = connect(srv.addr, "client123").await;

    let req = json!({"message": "hi", "activity_id": "evt1", "session_id": null});
    ws.send(Message::Text(req.to_string())).await.unwrap();

    let (text, notices) = read_reply(&mut ws).await;
    assert_eq!(text, "Echo (client123): hi");
    assert!(notices.is_empty());
}

#[tokio::test]
async fn blank_and_plain_text_requests() {
    let srv = spawn_gateway(FAST).await;
    let mut ws = connect(srv.addr, "client-9").await;

    ws.send(Message::Text(json!({"message": "   "}).to_string()))
        .await
        .unwrap();
    let (text, _) = read_reply(&mut ws).await;
    assert_eq!(text, "Hello from server (client-9)");

    ws.send(Message::Text("just words".into())).await.unwrap();
    let (text, _) = read_reply(&mut ws).await;
    assert_eq!(text, "Echo (client-9): just words");
}

#[tokio::test]
async fn composite_video_frame_gets_reply() {
    let srv = spawn_gateway(FAST).await;
    let mut ws = connect(srv.addr, "client123").await;

    let meta = json!({
        "message": "watch this",
        "activity_id": "evt1",
        "media": {"type": "video"}
    });
    let frame = encode_composite(&meta, b"\x00\x00\x00\x18ftypmp42").unwrap();
    ws.send(Message::Binary(frame.to_vec())).await.unwrap();

    let (text, _) = read_reply(&mut ws).await;
    assert_eq!(text, "Echo (client123): watch this");
}

#[tokio::test]
async fn malformed_binary_frame_gets_notice_and_connection_survives() {
    let srv = spawn_gateway(FAST).await;
    let mut ws = connect(srv.addr, "client123").await;

    ws.send(Message::Binary(vec![0, 0])).await.unwrap();
    let v = next_json(&mut ws).await;
    assert_eq!(v["type"], "error");
    assert_eq!(v["code"], "MALFORMED_FRAME");

    ws.send(Message::Text(json!({"message": "still here"}).to_string()))
        .await
        .unwrap();
    let (text, _) = read_reply(&mut ws).await;
    assert_eq!(text, "Echo (client123): still here");
}

#[tokio::test]
async fn oversize_frame_is_refused() {
    let srv = spawn_gateway(
        "version: 1\ngateway:\n  max_frame_bytes: 1024\nreply:\n  token_interval_ms: 5\n",
    )
    .await;
    let mut ws = connect(srv.addr, "client123").await;

    ws.send(Message::Text("x".repeat(1500))).await.unwrap();
    let v = next_json(&mut ws).await;
    assert_eq!(v["code"], "PAYLOAD_TOO_LARGE");

    ws.send(Message::Text("ok".into())).await.unwrap();
    let (text, _) = read_reply(&mut ws).await;
    assert_eq!(text, "Echo (client123): ok");
}

#[tokio::test]
async fn full_queue_answers_busy() {
    let srv = spawn_gateway(
        "version: 1\nreply:\n  token_interval_ms: 50\n  max_queued_requests: 0\n",
    )
    .await;
    let mut ws = connect(srv.addr, "client123").await;

    ws.send(Message::Text("a b c d".into())).await.unwrap();
    ws.send(Message::Text("second".into())).await.unwrap();

    let (text, notices) = read_reply(&mut ws).await;
    assert_eq!(text, "Echo (client123): a b c d");
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0]["code"], "BUSY");
}

#[tokio::test]
async fn queued_requests_run_in_order() {
    let srv = spawn_gateway(FAST).await;
    let mut ws = connect(srv.addr, "client123").await;

    ws.send(Message::Text("one".into())).await.unwrap();
    ws.send(Message::Text("two".into())).await.unwrap();

    let (first, _) = read_reply(&mut ws).await;
    let (second, _) = read_reply(&mut ws).await;
    assert_eq!(first, "Echo (client123): one");
    assert_eq!(second, "Echo (client123): two");
}

#[tokio::test]
async fn reconnect_supersedes_previous_connection() {
    let srv = spawn_gateway(FAST).await;
    let mut old = connect(srv.addr, "client123").await;
    let mut new = connect(srv.addr, "client123").await;

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match old.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "superseded connection must be closed");

    new.send(Message::Text("hi".into())).await.unwrap();
    let (text, _) = read_reply(&mut new).await;
    assert_eq!(text, "Echo (client123): hi");
}

#[tokio::test]
async fn invalid_paths_are_rejected() {
    let srv = spawn_gateway(FAST).await;

    let url = format!("ws://{}/ws/other/client123", srv.addr);
    assert!(connect_async(url.as_str()).await.is_err());

    let url = format!("ws://{}/ws/ondemand/bad%20id", srv.addr);
    assert!(connect_async(url.as_str()).await.is_err());
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    let mut s = TcpStream::connect(addr).await.unwrap();
    s.write_all(format!("GET {path} HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n").as_bytes())
        .await
        .unwrap();
    let mut out = String::new();
    s.read_to_string(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn ops_endpoints_report_sessions() {
    let srv = spawn_gateway(FAST).await;
    assert!(http_get(srv.addr, "/healthz").await.starts_with("HTTP/1.1 200"));
    assert!(http_get(srv.addr, "/readyz").await.starts_with("HTTP/1.1 200"));

    let mut ws = connect(srv.addr, "client123").await;
    ws.send(Message::Text("hi".into())).await.unwrap();
    let _ = read_reply(&mut ws).await;

    let body = http_get(srv.addr, "/metrics").await;
    assert!(body.contains("streamrelay_clients_connected 1"));
    assert!(body.contains("streamrelay_requests_total{frame=\"plain\"} 1"));
}
