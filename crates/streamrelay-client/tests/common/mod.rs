#![allow(dead_code)]

//! In-memory connectors and a recording subscriber shared by the client tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{sink, stream};
use tokio::sync::mpsc;
use tokio::time::Instant;

use streamrelay_client::events::{CloseInfo, Subscriber};
use streamrelay_client::transport::{Connector, Incoming, Transport};
use streamrelay_core::error::{RelayError, Result};
use streamrelay_core::protocol::RawFrame;

/// Server side of one in-memory connection.
pub struct Peer {
    pub to_client: mpsc::UnboundedSender<Result<Incoming>>,
    pub from_client: mpsc::UnboundedReceiver<RawFrame>,
}

impl Peer {
    pub fn send_text(&self, s: &str) {
        self.to_client
            .send(Ok(Incoming::Frame(RawFrame::Text(s.to_string()))))
            .unwrap();
    }

    pub fn close(&self) {
        self.to_client
            .send(Ok(Incoming::Close(CloseInfo::new(Some(1001), "going away"))))
            .unwrap();
    }

    pub async fn recv_text(&mut self) -> String {
        match self.from_client.recv().await {
            Some(RawFrame::Text(t)) => t,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

/// Every connect succeeds; the test receives the peer end.
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<Peer>,
    pub calls: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Peer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                peers: tx,
                calls: Arc::new(AtomicUsize::new(0)),
            },
            rx,
        )
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _url: &str) -> Result<Transport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (up_tx, up_rx) = mpsc::unbounded_channel::<RawFrame>();
        let (down_tx, down_rx) = mpsc::unbounded_channel::<Result<Incoming>>();

        let sink = sink::unfold(up_tx, |tx: mpsc::UnboundedSender<RawFrame>, frame: RawFrame| async move {
            tx.send(frame)
                .map_err(|_| RelayError::Transport("peer gone".into()))?;
            Ok::<_, RelayError>(tx)
        });
        let stream = stream::unfold(down_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        self.peers
            .send(Peer {
                to_client: down_tx,
                from_client: up_rx,
            })
            .map_err(|_| RelayError::Transport("test dropped peer receiver".into()))?;
        Ok(Transport {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// Every connect fails; attempt times are recorded.
#[derive(Default)]
pub struct FailingConnector {
    pub attempts: Arc<Mutex<Vec<Instant>>>,
}

#[async_trait]
impl Connector for FailingConnector {
    async fn connect(&self, url: &str) -> Result<Transport> {
        self.attempts.lock().unwrap().push(Instant::now());
        Err(RelayError::Transport(format!("connection refused: {url}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open,
    Close,
    Error,
    Message(String),
}

#[derive(Default)]
pub struct Recorder {
    pub events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, e: &Event) -> usize {
        self.events().iter().filter(|x| *x == e).count()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Message(m) => Some(m),
                _ => None,
            })
            .collect()
    }
}

impl Subscriber for Recorder {
    fn on_open(&self) {
        self.events.lock().unwrap().push(Event::Open);
    }
    fn on_close(&self, _info: &CloseInfo) {
        self.events.lock().unwrap().push(Event::Close);
    }
    fn on_error(&self, _err: &RelayError) {
        self.events.lock().unwrap().push(Event::Error);
    }
    fn on_message(&self, frame: &RawFrame) {
        if let RawFrame::Text(t) = frame {
            self.events.lock().unwrap().push(Event::Message(t.clone()));
        }
    }
}

/// Let spawned tasks run (time is paused in these tests).
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
}
