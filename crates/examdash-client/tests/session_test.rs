//! Session tests: role gate, role change, resync on reconnect, shutdown.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use examdash_channel::{BroadcastTransport, ChannelHandle, ConnectionState, ReconnectPolicy};
use examdash_client::{Session, SessionOptions};
use examdash_core::{
    ActivityLogEntry, FeedKey, FeedStatus, Notification, PushEvent, Role, RoleGate,
    ACTIVITY_LOG_CREATED, NOTIFICATION_CREATED,
};
use helpers::{activity, eventually, ids, notification, FakeSource};

/// Let spawned tasks (channel loop, resync watcher) catch up.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

struct Fixture {
    session: Arc<Session>,
    notifications: Arc<FakeSource<Notification>>,
    activity_logs: Arc<FakeSource<ActivityLogEntry>>,
}

fn fixture(options: SessionOptions) -> Fixture {
    fixture_with_backoff(options, 10)
}

fn fixture_with_backoff(options: SessionOptions, initial_delay_ms: u64) -> Fixture {
    let channel = Arc::new(ChannelHandle::new(
        ReconnectPolicy::default()
            .with_initial_delay(initial_delay_ms)
            .with_jitter(0.0),
    ));
    let notifications = Arc::new(FakeSource::new(vec![notification(2), notification(1)]));
    let activity_logs = Arc::new(FakeSource::new(vec![activity(7)]));
    let session = Arc::new(Session::new(
        options,
        channel,
        notifications.clone(),
        activity_logs.clone(),
    ));
    Fixture {
        session,
        notifications,
        activity_logs,
    }
}

#[tokio::test]
async fn test_student_never_mounts_activity_logs() {
    let f = fixture(SessionOptions::default().with_role(Role::Student));

    assert_eq!(f.session.mount_allowed().await, vec![FeedKey::Notifications]);
    assert!(!f.session.mount_activity_logs().await);
    assert_eq!(f.session.channel().listener_count(ACTIVITY_LOG_CREATED), 0);
    assert_eq!(f.activity_logs.list_calls(), 0);

    // Activity pushes go nowhere.
    f.session
        .channel()
        .dispatch_event(&PushEvent::ActivityLogCreated(activity(8)));
    assert!(f.session.activity_logs().store().is_empty());
}

#[tokio::test]
async fn test_admin_mounts_both_feeds() {
    let f = fixture(SessionOptions::default().with_role(Role::Admin));

    assert_eq!(f.session.mount_allowed().await, FeedKey::ALL.to_vec());
    assert_eq!(f.session.mounted_feeds(), FeedKey::ALL.to_vec());
    assert_eq!(ids(&f.session.activity_logs().snapshot().entries), vec![7]);
    assert_eq!(ids(&f.session.notifications().snapshot().entries), vec![2, 1]);

    // Feeds never see each other's events.
    f.session
        .channel()
        .dispatch_event(&PushEvent::ActivityLogCreated(activity(8)));
    assert_eq!(ids(&f.session.activity_logs().snapshot().entries), vec![8, 7]);
    assert_eq!(f.session.notifications().snapshot().unread_count, 2);
}

#[tokio::test]
async fn test_custom_gate() {
    let gate = RoleGate::default().restrict(FeedKey::Notifications, [Role::Teacher]);
    let f = fixture(
        SessionOptions::default()
            .with_role(Role::Student)
            .with_gate(gate),
    );

    assert!(f.session.mount_allowed().await.is_empty());
    assert_eq!(f.notifications.list_calls(), 0);
}

#[tokio::test]
async fn test_role_change_deactivates_and_resets() {
    let f = fixture(SessionOptions::default().with_role(Role::Admin));
    f.session.mount_allowed().await;

    let previous = f.session.change_role(Role::Student);
    assert_eq!(previous, Role::Admin);
    assert_eq!(f.session.role(), Role::Student);
    assert!(f.session.mounted_feeds().is_empty());
    assert_eq!(f.session.channel().listener_count(NOTIFICATION_CREATED), 0);
    assert_eq!(f.session.channel().listener_count(ACTIVITY_LOG_CREATED), 0);
    assert!(f.session.notifications().store().is_empty());
    assert!(f.session.activity_logs().store().is_empty());

    assert_eq!(f.session.mount_allowed().await, vec![FeedKey::Notifications]);
    assert_eq!(f.session.notifications().snapshot().unread_count, 2);
    assert!(f.session.activity_logs().store().is_empty());
}

#[tokio::test]
async fn test_role_change_during_fetch_discards_it() {
    let f = fixture(SessionOptions::default().with_role(Role::Admin));
    f.activity_logs.hold_lists();

    let session = Arc::clone(&f.session);
    let mount = tokio::spawn(async move { session.mount_activity_logs().await });
    let store = Arc::clone(f.session.activity_logs().store());
    eventually(|| store.status() == FeedStatus::Loading).await;

    f.session.change_role(Role::Teacher);
    f.activity_logs.release();
    mount.await.unwrap();

    assert!(store.is_empty());
    assert!(!store.is_active());
}

#[tokio::test]
async fn test_pushes_flow_over_transport() {
    let f = fixture(SessionOptions::default());
    let transport = Arc::new(BroadcastTransport::default());
    f.session.start(transport.clone());
    let mut state = f.session.channel().watch_state();
    state
        .wait_for(|s| *s == ConnectionState::Connected)
        .await
        .unwrap();
    settle().await;

    f.session.mount_notifications().await;
    transport
        .send_event(&PushEvent::NotificationCreated(notification(3)))
        .unwrap();

    let store = Arc::clone(f.session.notifications().store());
    eventually(|| store.len() == 3).await;
    assert_eq!(ids(&store.snapshot().entries), vec![3, 2, 1]);

    f.session.end().await;
    assert_eq!(f.session.channel().state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_reconnect_triggers_resync() {
    let f = fixture(SessionOptions::default());
    let transport = Arc::new(BroadcastTransport::default());
    f.session.start(transport.clone());
    let mut state = f.session.channel().watch_state();
    state
        .wait_for(|s| *s == ConnectionState::Connected)
        .await
        .unwrap();
    settle().await;

    f.session.mount_notifications().await;
    assert_eq!(f.notifications.list_calls(), 1);

    // A notification created while the channel was down.
    f.notifications
        .set_entries(vec![notification(4), notification(2), notification(1)]);
    transport.drop_connections();

    eventually(|| transport.connect_count() == 2).await;
    let store = Arc::clone(f.session.notifications().store());
    eventually(|| store.len() == 3).await;
    assert_eq!(f.notifications.list_calls(), 2);
    assert_eq!(ids(&store.snapshot().entries), vec![4, 2, 1]);

    f.session.end().await;
}

#[tokio::test]
async fn test_outage_leaves_feed_status_alone_and_loses_pushes() {
    let f = fixture_with_backoff(SessionOptions::default(), 300);
    let transport = Arc::new(BroadcastTransport::default());
    f.session.start(transport.clone());
    let mut state = f.session.channel().watch_state();
    state
        .wait_for(|s| *s == ConnectionState::Connected)
        .await
        .unwrap();
    settle().await;

    f.session.mount_notifications().await;
    let store = Arc::clone(f.session.notifications().store());
    let before = store.snapshot();
    assert_eq!(before.status, FeedStatus::Idle);

    transport.drop_connections();
    state
        .wait_for(|s| *s == ConnectionState::Connecting)
        .await
        .unwrap();
    eventually(|| transport.open_connections() == 0).await;

    // Nobody is connected, so this push is gone for good.
    let delivered = transport
        .send_event(&PushEvent::NotificationCreated(notification(3)))
        .unwrap();
    assert_eq!(delivered, 0);
    assert_eq!(f.session.channel().state(), ConnectionState::Connecting);
    assert_eq!(store.status(), FeedStatus::Idle);
    assert_eq!(store.snapshot().entries, before.entries);
    assert_eq!(store.unread_count(), 2);

    // The server never listed it either; the resync after reconnecting
    // leaves the feed as it was.
    eventually(|| transport.connect_count() == 2).await;
    eventually(|| f.notifications.list_calls() == 2).await;
    eventually(|| store.status() == FeedStatus::Idle).await;
    assert_eq!(ids(&store.snapshot().entries), vec![2, 1]);
    assert!(store.get(3).is_none());

    f.session.end().await;
}

#[tokio::test]
async fn test_end_unmounts_and_stops_channel() {
    let f = fixture(SessionOptions::default().with_role(Role::Admin));
    let transport = Arc::new(BroadcastTransport::default());
    f.session.start(transport.clone());
    f.session.mount_allowed().await;

    f.session.end().await;
    assert!(f.session.mounted_feeds().is_empty());
    assert!(f.session.channel().is_shut_down());
    assert_eq!(f.session.channel().state(), ConnectionState::Disconnected);
    assert_eq!(transport.open_connections(), 0);

    // Entries stay readable after the session ends.
    assert_eq!(f.session.notifications().snapshot().entries.len(), 2);
}
