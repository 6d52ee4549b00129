//! Reconnect loop and dispatch tests over the in-process transport.
//!
//! All tests run on a paused clock, so backoff sleeps complete instantly while
//! elapsed virtual time stays observable.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use examdash_channel::{BroadcastTransport, ChannelHandle, ConnectionState, ReconnectPolicy};
use examdash_core::{ActivityAction, ActivityLogEntry, Notification, PushEvent};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

const WAIT: Duration = Duration::from_secs(120);

fn policy() -> ReconnectPolicy {
    ReconnectPolicy::default()
        .with_initial_delay(500)
        .with_max_delay(4_000)
        .with_max_attempts(10)
        .with_jitter(0.0)
}

async fn wait_for_state(handle: &ChannelHandle, state: ConnectionState) {
    let mut rx = handle.watch_state();
    timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("state never became {state}"))
        .unwrap();
}

async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

fn notification(id: i64) -> PushEvent {
    PushEvent::NotificationCreated(Notification::new(id, "Grades posted", Utc::now()))
}

#[tokio::test(start_paused = true)]
async fn test_connect_and_dispatch_in_receipt_order() {
    let handle = Arc::new(ChannelHandle::new(policy()));
    let transport = Arc::new(BroadcastTransport::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.on("notification.created", move |event| {
        let _ = tx.send(event.entry_id());
    });

    let task = handle.start(transport.clone());
    wait_for_state(&handle, ConnectionState::Connected).await;

    for id in [3, 1, 2] {
        transport.send_event(&notification(id)).unwrap();
    }
    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(timeout(WAIT, rx.recv()).await.unwrap().unwrap());
    }
    assert_eq!(seen, vec![3, 1, 2]);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_bad_frames_do_not_disturb_connection() {
    let handle = Arc::new(ChannelHandle::new(policy()));
    let transport = Arc::new(BroadcastTransport::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    handle.on("notification.created", move |event| {
        let _ = tx.send(event.entry_id());
    });

    let task = handle.start(transport.clone());
    wait_for_state(&handle, ConnectionState::Connected).await;

    transport.send_text("definitely not json");
    transport.send_text(r#"{"event":"exam.started","payload":{"id":1}}"#);
    transport
        .send_event(&PushEvent::ActivityLogCreated(ActivityLogEntry::new(
            4,
            "admin",
            ActivityAction::Create,
            Utc::now(),
        )))
        .unwrap();
    transport.send_event(&notification(8)).unwrap();

    assert_eq!(timeout(WAIT, rx.recv()).await.unwrap(), Some(8));
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(handle.state(), ConnectionState::Connected);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_after_drop() {
    let handle = Arc::new(ChannelHandle::new(policy()));
    let transport = Arc::new(BroadcastTransport::default());

    let task = handle.start(transport.clone());
    wait_for_state(&handle, ConnectionState::Connected).await;

    transport.drop_connections();
    wait_for_state(&handle, ConnectionState::Connecting).await;
    wait_for_state(&handle, ConnectionState::Connected).await;
    assert_eq!(transport.connect_count(), 2);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_between_refused_connects() {
    let handle = Arc::new(ChannelHandle::new(policy()));
    let transport = Arc::new(BroadcastTransport::default());
    transport.refuse_next(3);

    let started = Instant::now();
    let task = handle.start(transport.clone());
    wait_for_state(&handle, ConnectionState::Connected).await;

    // 500 + 1000 + 2000 ms of backoff before the fourth attempt
    assert!(started.elapsed() >= Duration::from_millis(3_500));
    assert_eq!(transport.connect_count(), 1);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_state_stays_connecting_during_backoff() {
    let handle = Arc::new(ChannelHandle::new(policy()));
    let transport = Arc::new(BroadcastTransport::default());
    transport.refuse_next(5);

    let task = handle.start(transport.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.state(), ConnectionState::Connecting);
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(handle.state(), ConnectionState::Connecting);

    handle.shutdown();
    task.await.unwrap();
    assert_eq!(handle.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_when_policy_exhausted() {
    let handle = Arc::new(ChannelHandle::new(policy().with_max_attempts(3)));
    let transport = Arc::new(BroadcastTransport::default());
    transport.refuse_next(u32::MAX);

    let task = handle.start(transport.clone());
    timeout(WAIT, task).await.unwrap().unwrap();

    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert_eq!(transport.connect_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_successful_connect_resets_attempts() {
    let handle = Arc::new(ChannelHandle::new(policy().with_max_attempts(3)));
    let transport = Arc::new(BroadcastTransport::default());

    // Two failures, connect, drop, two more failures: never three in a row.
    transport.refuse_next(2);
    let task = handle.start(transport.clone());
    wait_for_state(&handle, ConnectionState::Connected).await;

    transport.refuse_next(2);
    transport.drop_connections();
    eventually(|| transport.connect_count() == 2).await;
    assert_eq!(handle.state(), ConnectionState::Connected);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_connection() {
    let handle = Arc::new(ChannelHandle::new(policy()));
    let transport = Arc::new(BroadcastTransport::default());

    let task = handle.start(transport.clone());
    wait_for_state(&handle, ConnectionState::Connected).await;
    assert_eq!(transport.open_connections(), 1);

    handle.shutdown();
    timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(handle.state(), ConnectionState::Disconnected);
    assert_eq!(transport.open_connections(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_backoff() {
    let handle = Arc::new(ChannelHandle::new(policy().with_max_attempts(0)));
    let transport = Arc::new(BroadcastTransport::default());
    transport.refuse_next(u32::MAX);

    let task = handle.start(transport.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;
    let before = Instant::now();
    handle.shutdown();
    timeout(WAIT, task).await.unwrap().unwrap();

    assert!(before.elapsed() < Duration::from_millis(500));
    assert_eq!(handle.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_ignored() {
    let handle = Arc::new(ChannelHandle::new(policy()));
    let transport = Arc::new(BroadcastTransport::default());

    let first = handle.start(transport.clone());
    wait_for_state(&handle, ConnectionState::Connected).await;
    let second = handle.start(transport.clone());
    timeout(WAIT, second).await.unwrap().unwrap();

    assert_eq!(transport.connect_count(), 1);
    assert_eq!(handle.state(), ConnectionState::Connected);

    handle.shutdown();
    first.await.unwrap();
}
