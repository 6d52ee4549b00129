//! Session: the owner of the push channel and both feed controllers.
//!
//! One session per signed-in account. It holds the only [`ChannelHandle`],
//! the [`SubscriptionGuard`] shared by its feeds, and the [`RoleGate`] that
//! decides which feeds may mount. There is no global channel; everything that
//! needs push events goes through a session.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use examdash_channel::{ChannelHandle, ConnectionState, Transport, WebSocketTransport};
use examdash_core::{
    ActivityLogEntry, FeedKey, FeedSource, FeedStore, Notification, Result, Role, RoleGate,
    SubscriptionGuard,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::controller::FeedController;
use crate::source::HttpFeedSource;

/// Tunables of a session that are not collaborators.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub role: Role,
    pub gate: RoleGate,
    /// Cap of the notification feed. Activity logs are never capped.
    pub recent_limit: Option<usize>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            role: Role::Student,
            gate: RoleGate::default(),
            recent_limit: Some(examdash_core::defaults::RECENT_NOTIFICATIONS_LIMIT),
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            role: config.role,
            recent_limit: config.recent_limit,
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_gate(mut self, gate: RoleGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_recent_limit(mut self, limit: Option<usize>) -> Self {
        self.recent_limit = limit;
        self
    }
}

pub struct Session {
    id: Uuid,
    channel: Arc<ChannelHandle>,
    guard: Arc<SubscriptionGuard>,
    gate: RoleGate,
    role: RwLock<Role>,
    notifications: FeedController<Notification>,
    activity_logs: FeedController<ActivityLogEntry>,
    channel_task: Mutex<Option<JoinHandle<()>>>,
    resync_task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(
        options: SessionOptions,
        channel: Arc<ChannelHandle>,
        notifications: Arc<dyn FeedSource<Notification>>,
        activity_logs: Arc<dyn FeedSource<ActivityLogEntry>>,
    ) -> Self {
        let guard = Arc::new(SubscriptionGuard::new());
        let id = Uuid::now_v7();
        info!(session_id = %id, role = %options.role, "Session created");
        Self {
            id,
            notifications: FeedController::new(
                Arc::new(FeedStore::new(options.recent_limit)),
                notifications,
                Arc::clone(&channel),
                Arc::clone(&guard),
            ),
            activity_logs: FeedController::new(
                Arc::new(FeedStore::new(None)),
                activity_logs,
                Arc::clone(&channel),
                Arc::clone(&guard),
            ),
            channel,
            guard,
            gate: options.gate,
            role: RwLock::new(options.role),
            channel_task: Mutex::new(None),
            resync_task: Mutex::new(None),
        }
    }

    /// Build a session against the dashboard server and start its channel.
    pub fn open(config: &ClientConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let channel = Arc::new(ChannelHandle::new(config.reconnect.clone()));
        let session = Arc::new(Self::new(
            SessionOptions::from_config(config),
            channel,
            Arc::new(HttpFeedSource::<Notification>::from_config(config)?),
            Arc::new(HttpFeedSource::<ActivityLogEntry>::from_config(config)?),
        ));

        let mut transport = WebSocketTransport::new(&config.channel_url);
        if let Some(token) = &config.token {
            transport = transport.with_token(token.clone());
        }
        session.start(Arc::new(transport));
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        *self.role.read().unwrap_or_else(|p| p.into_inner())
    }

    pub fn gate(&self) -> &RoleGate {
        &self.gate
    }

    pub fn channel(&self) -> &Arc<ChannelHandle> {
        &self.channel
    }

    pub fn guard(&self) -> &SubscriptionGuard {
        &self.guard
    }

    pub fn notifications(&self) -> &FeedController<Notification> {
        &self.notifications
    }

    pub fn activity_logs(&self) -> &FeedController<ActivityLogEntry> {
        &self.activity_logs
    }

    /// Start the channel loop on `transport` and the resync watcher.
    /// Calling it again while running is a no-op.
    pub fn start(self: &Arc<Self>, transport: Arc<dyn Transport>) {
        let mut channel_task = lock(&self.channel_task);
        if channel_task.is_some() {
            debug!(session_id = %self.id, "Session already started");
            return;
        }
        *lock(&self.resync_task) = Some(self.spawn_resync());
        *channel_task = Some(self.channel.start(transport));
        info!(session_id = %self.id, "Session started");
    }

    /// Refresh every mounted feed each time the channel (re)connects, since
    /// pushes sent while disconnected are not replayed.
    fn spawn_resync(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::downgrade(self);
        let mut state = self.channel.watch_state();
        tokio::spawn(async move {
            while state.changed().await.is_ok() {
                let current = *state.borrow_and_update();
                if current != ConnectionState::Connected {
                    continue;
                }
                let Some(session) = session.upgrade() else {
                    break;
                };
                let mounted = session.mounted_feeds();
                if mounted.is_empty() {
                    continue;
                }
                info!(
                    session_id = %session.id,
                    subsystem = "client",
                    component = "resync",
                    feeds = ?mounted,
                    "Push channel connected, resyncing mounted feeds"
                );
                session.refresh_mounted().await;
            }
        })
    }

    // -- Mounting -------------------------------------------------------------

    /// Mount the notification feed if the role gate allows it.
    pub async fn mount_notifications(&self) -> bool {
        if !self.allows(FeedKey::Notifications) {
            return false;
        }
        self.notifications.mount().await
    }

    /// Mount the activity-log feed if the role gate allows it.
    pub async fn mount_activity_logs(&self) -> bool {
        if !self.allows(FeedKey::ActivityLogs) {
            return false;
        }
        self.activity_logs.mount().await
    }

    /// Mount every feed the current role may see. Returns the newly mounted ones.
    pub async fn mount_allowed(&self) -> Vec<FeedKey> {
        let mut mounted = Vec::new();
        if self.mount_notifications().await {
            mounted.push(FeedKey::Notifications);
        }
        if self.mount_activity_logs().await {
            mounted.push(FeedKey::ActivityLogs);
        }
        mounted
    }

    pub fn unmount_all(&self) {
        self.notifications.unmount();
        self.activity_logs.unmount();
    }

    pub fn mounted_feeds(&self) -> Vec<FeedKey> {
        self.guard.active_feeds()
    }

    pub async fn refresh_mounted(&self) {
        if self.notifications.is_mounted() {
            self.notifications.refresh().await;
        }
        if self.activity_logs.is_mounted() {
            self.activity_logs.refresh().await;
        }
    }

    fn allows(&self, feed: FeedKey) -> bool {
        let role = self.role();
        let allowed = self.gate.allows(feed, role);
        if !allowed {
            debug!(session_id = %self.id, feed = %feed, role = %role, "Feed not mounted, role gate denies");
        }
        allowed
    }

    // -- Role and lifetime ----------------------------------------------------

    /// Switch the session to `role`. Every mounted feed is unmounted and its
    /// entries dropped; the caller mounts again under the new role. Returns
    /// the previous role.
    pub fn change_role(&self, role: Role) -> Role {
        self.unmount_all();
        self.notifications.store().reset();
        self.activity_logs.store().reset();
        let previous = std::mem::replace(
            &mut *self.role.write().unwrap_or_else(|p| p.into_inner()),
            role,
        );
        info!(session_id = %self.id, previous = %previous, role = %role, "Session role changed");
        previous
    }

    /// Unmount everything and stop the channel. Entries stay readable.
    pub async fn end(&self) {
        self.unmount_all();
        if let Some(task) = lock(&self.resync_task).take() {
            task.abort();
        }
        self.channel.shutdown();
        let channel_task = lock(&self.channel_task).take();
        if let Some(task) = channel_task {
            if let Err(e) = task.await {
                warn!(session_id = %self.id, error = %e, "Channel task ended abnormally");
            }
        }
        info!(session_id = %self.id, "Session ended");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.resync_task).take() {
            task.abort();
        }
        self.channel.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}
