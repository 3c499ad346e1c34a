//! Transport seam for the connection manager.
//!
//! A [`Connector`] turns a URL into a boxed sink/stream pair of [`RawFrame`]s. Production code
//! uses [`WsConnector`]; tests plug in connectors that fail or run over in-memory channels.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use streamrelay_core::error::{RelayError, Result};
use streamrelay_core::protocol::RawFrame;

use crate::events::CloseInfo;

/// What the read half yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Frame(RawFrame),
    Close(CloseInfo),
}

pub type FrameSink = Pin<Box<dyn Sink<RawFrame, Error = RelayError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Incoming>> + Send>>;

/// One established connection.
pub struct Transport {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Transport>;
}

/// WebSocket connector (`ws://` and `wss://`).
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

fn to_message(frame: RawFrame) -> Message {
    match frame {
        RawFrame::Text(s) => Message::Text(s),
        RawFrame::Binary(b) => Message::Binary(b.to_vec()),
    }
}

fn from_message(msg: std::result::Result<Message, tokio_tungstenite::tungstenite::Error>) -> Option<Result<Incoming>> {
    match msg {
        Ok(Message::Text(s)) => Some(Ok(Incoming::Frame(RawFrame::Text(s)))),
        Ok(Message::Binary(b)) => Some(Ok(Incoming::Frame(RawFrame::Binary(Bytes::from(b))))),
        Ok(Message::Close(frame)) => Some(Ok(Incoming::Close(match frame {
            Some(f) => CloseInfo::new(Some(u16::from(f.code)), f.reason.into_owned()),
            None => CloseInfo::default(),
        }))),
        // pongs to server pings are queued by tungstenite itself
        Ok(_) => None,
        Err(e) => Some(Err(RelayError::Transport(e.to_string()))),
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Transport> {
        let (ws, _resp) = connect_async(url)
            .await
            .map_err(|e| RelayError::Transport(format!("connect {url} failed: {e}")))?;
        let (write, read) = ws.split();

        let sink = write
            .sink_map_err(|e| RelayError::Transport(e.to_string()))
            .with(|frame: RawFrame| future::ready(Ok::<_, RelayError>(to_message(frame))));
        let stream = read.filter_map(|m| future::ready(from_message(m)));

        Ok(Transport {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}
