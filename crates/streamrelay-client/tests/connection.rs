#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{settle, Event, FailingConnector, MemoryConnector, Recorder};
use streamrelay_client::{ConnectionManager, ConnectionState, RetryPolicy, SendStatus};
use streamrelay_core::protocol::RawFrame;

const URL: &str = "ws://relay.test/ws/ondemand/client123";

#[tokio::test(start_paused = true)]
async fn failing_connects_back_off_then_stop() {
    let connector = FailingConnector::default();
    let attempts = connector.attempts.clone();
    let manager = ConnectionManager::new(connector, URL, RetryPolicy::default());
    let rec = Arc::new(Recorder::default());
    let _sub = manager.subscribe(rec.clone());

    manager.ensure_connection();
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if manager.state() == ConnectionState::Closed {
            break;
        }
    }
    assert_eq!(manager.state(), ConnectionState::Closed);

    let times = attempts.lock().unwrap().clone();
    assert_eq!(times.len(), 8, "initial attempt plus seven retries");
    let gaps: Vec<u64> = times
        .windows(2)
        .map(|w| (w[1] - w[0]).as_millis() as u64)
        .collect();
    assert_eq!(gaps, vec![1000, 2000, 4000, 8000, 8000, 8000, 8000]);
    assert!(gaps.windows(2).all(|w| w[0] <= w[1]));

    // every failure is reported before the retry is scheduled
    assert_eq!(rec.count(&Event::Error), 8);
    assert_eq!(rec.count(&Event::Close), 8);

    // nothing further happens on its own
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(attempts.lock().unwrap().len(), 8);

    // an explicit send starts a fresh cycle
    assert_eq!(manager.send(RawFrame::Text("hi".into())), SendStatus::Deferred);
    assert_eq!(manager.attempts(), 0);
    settle().await;
    assert_eq!(attempts.lock().unwrap().len(), 9);
    assert_eq!(manager.state(), ConnectionState::Retrying);
}

#[tokio::test(start_paused = true)]
async fn deferred_send_goes_out_after_open() {
    let (connector, mut peers) = MemoryConnector::new();
    let manager = ConnectionManager::new(connector, URL, RetryPolicy::default());
    let rec = Arc::new(Recorder::default());
    let _sub = manager.subscribe(rec.clone());

    assert_eq!(
        manager.send(RawFrame::Text("first".into())),
        SendStatus::Deferred
    );
    // last one wins while not open
    assert_eq!(
        manager.send(RawFrame::Text("second".into())),
        SendStatus::Deferred
    );

    let mut peer = peers.recv().await.unwrap();
    assert_eq!(peer.recv_text().await, "second");
    settle().await;
    assert!(manager.is_open());
    assert_eq!(rec.events(), vec![Event::Open]);

    assert_eq!(manager.send(RawFrame::Text("third".into())), SendStatus::Sent);
    assert_eq!(peer.recv_text().await, "third");
}

#[tokio::test(start_paused = true)]
async fn ensure_connection_is_single_flight() {
    let (connector, mut peers) = MemoryConnector::new();
    let calls = connector.calls.clone();
    let manager = ConnectionManager::new(connector, URL, RetryPolicy::default());

    manager.ensure_connection();
    manager.ensure_connection();
    let other = manager.clone();
    other.ensure_connection();

    let _peer = peers.recv().await.unwrap();
    settle().await;
    manager.ensure_connection();
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(peers.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn late_subscriber_gets_synthetic_open() {
    let (connector, mut peers) = MemoryConnector::new();
    let manager = ConnectionManager::new(connector, URL, RetryPolicy::default());
    manager.ensure_connection();
    let _peer = peers.recv().await.unwrap();
    settle().await;

    let late = Arc::new(Recorder::default());
    let _sub = manager.subscribe(late.clone());
    assert_eq!(late.events(), vec![Event::Open]);
}

#[tokio::test(start_paused = true)]
async fn frames_fan_out_and_close_reconnects() {
    let (connector, mut peers) = MemoryConnector::new();
    let manager = ConnectionManager::new(connector, URL, RetryPolicy::default());
    let a = Arc::new(Recorder::default());
    let b = Arc::new(Recorder::default());
    let sub_a = manager.subscribe(a.clone());
    let _sub_b = manager.subscribe(b.clone());

    manager.ensure_connection();
    let peer = peers.recv().await.unwrap();
    peer.send_text("one");
    settle().await;
    sub_a.unsubscribe();
    peer.send_text("two");
    peer.send_text("three");
    peer.close();
    settle().await;

    assert_eq!(a.messages(), vec!["one"]);
    assert_eq!(b.messages(), vec!["one", "two", "three"]);
    assert_eq!(b.count(&Event::Close), 1);
    assert_eq!(manager.state(), ConnectionState::Retrying);
    assert_eq!(manager.attempts(), 1);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    let _peer2 = peers.recv().await.unwrap();
    settle().await;
    assert!(manager.is_open());
    assert_eq!(manager.attempts(), 0);
    assert_eq!(b.count(&Event::Open), 2);
}

#[tokio::test(start_paused = true)]
async fn close_stops_retries_and_dispose_drops_subscribers() {
    let (connector, mut peers) = MemoryConnector::new();
    let manager = ConnectionManager::new(connector, URL, RetryPolicy::default());
    let rec = Arc::new(Recorder::default());
    let sub = manager.subscribe(rec.clone());

    manager.ensure_connection();
    let mut peer = peers.recv().await.unwrap();
    settle().await;

    manager.close();
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert!(peer.from_client.recv().await.is_none(), "transport released");

    // frames from the closed connection are never delivered
    let _ = peer.to_client.send(Ok(streamrelay_client::transport::Incoming::Frame(
        RawFrame::Text("late".into()),
    )));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(peers.try_recv().is_err(), "no reconnect after close");
    assert!(rec.messages().is_empty());
    assert_eq!(rec.count(&Event::Close), 1);

    manager.dispose();
    assert_eq!(manager.subscriber_count(), 0);
    drop(sub);
}
