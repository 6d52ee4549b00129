//! Channel handle: the one shared push connection of a session.
//!
//! Listeners register per event type with [`ChannelHandle::on`] and are called
//! synchronously, in registration order, for every decoded frame of that type.
//! The reconnect loop ([`ChannelHandle::run`]) owns the transport; everything
//! else talks to the handle.
//!
//! ## Connection states
//!
//! ```text
//! disconnected ──start──▶ connecting ──connect ok──▶ connected
//!                           ▲    │                       │
//!                           │    └─connect failed──┐     │ dropped
//!                           └──────backoff─────────┘◀────┘
//! ```
//!
//! The state stays `connecting` through backoff sleeps. It returns to
//! `disconnected` only on shutdown or when the reconnect policy is exhausted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use examdash_core::{logging, Error, PushEvent, PushFrame};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, field, info, instrument, trace, warn, Span};

use crate::reconnect::ReconnectPolicy;
use crate::transport::Transport;

/// Connection state of the push channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Handle returned by [`ChannelHandle::on`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Handler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Listener registry plus connection state of one push channel.
pub struct ChannelHandle {
    listeners: Mutex<HashMap<String, Vec<(ListenerId, Handler)>>>,
    next_listener: AtomicU64,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Sender<bool>,
    running: AtomicBool,
    policy: ReconnectPolicy,
}

impl Default for ChannelHandle {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

impl ChannelHandle {
    pub fn new(policy: ReconnectPolicy) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown, _) = watch::channel(false);
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            state,
            shutdown,
            running: AtomicBool::new(false),
            policy,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    // -- Listeners ------------------------------------------------------------

    /// Register `handler` for frames of `event_type`.
    pub fn on<F>(&self, event_type: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&PushEvent) + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.lock();
        let slot = listeners.entry(event_type.clone()).or_default();
        slot.push((id, Arc::new(handler)));
        debug!(
            event_type = %event_type,
            listener_id = %id,
            listeners = slot.len(),
            "Listener registered"
        );
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off(&self, event_type: &str, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(slot) = listeners.get_mut(event_type) else {
            return false;
        };
        let before = slot.len();
        slot.retain(|(listener, _)| *listener != id);
        let removed = slot.len() != before;
        if slot.is_empty() {
            listeners.remove(event_type);
        }
        debug!(event_type, listener_id = %id, removed, "Listener removed");
        removed
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.lock().get(event_type).map_or(0, Vec::len)
    }

    // -- Dispatch -------------------------------------------------------------

    /// Decode one text frame and hand it to the listeners of its event type.
    ///
    /// Returns how many listeners were called. Frames nobody listens for are
    /// dropped before the payload is decoded.
    pub fn dispatch_frame(&self, text: &str) -> usize {
        let frame = match PushFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping malformed push frame");
                return 0;
            }
        };
        trace!(event_type = %frame.event, event_id = ?frame.event_id, "Push frame received");

        let handlers = self.handlers_for(&frame.event);
        if handlers.is_empty() {
            debug!(event_type = %frame.event, "No listener for push event");
            return 0;
        }

        let event_type = frame.event.clone();
        match PushEvent::try_from(frame) {
            Ok(event) => Self::call(&handlers, &event),
            Err(Error::UnknownEvent(_)) => {
                debug!(event_type = %event_type, "Dropping push event of unknown type");
                0
            }
            Err(e) => {
                warn!(event_type = %event_type, error = %e, "Dropping undecodable push event");
                0
            }
        }
    }

    /// Hand an already decoded event to its listeners.
    pub fn dispatch_event(&self, event: &PushEvent) -> usize {
        let handlers = self.handlers_for(event.event_type());
        Self::call(&handlers, event)
    }

    fn handlers_for(&self, event_type: &str) -> Vec<Handler> {
        // Cloned out so a handler may call on/off without deadlocking.
        self.lock()
            .get(event_type)
            .map(|slot| slot.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    fn call(handlers: &[Handler], event: &PushEvent) -> usize {
        for handler in handlers {
            handler(event);
        }
        handlers.len()
    }

    // -- Connection state -----------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            debug!(connection_state = %next, "Connection state changed");
        }
    }

    // -- Reconnect loop -------------------------------------------------------

    /// Spawn [`ChannelHandle::run`] on the current runtime.
    pub fn start(self: &Arc<Self>, transport: Arc<dyn Transport>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(transport))
    }

    /// Stop the reconnect loop. The state moves to `disconnected` once the
    /// loop notices. Listeners stay registered.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        if !self.running.load(Ordering::SeqCst) {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Connect, read frames, reconnect with backoff. Returns on shutdown or
    /// when the policy gives up. Only one loop may run per handle.
    ///
    /// The loop span carries the current `connection_state` and failed
    /// `attempt` count, so every event logged inside it has both.
    #[instrument(skip_all, fields(
        subsystem = "channel",
        component = "reconnect",
        connection_state = field::Empty,
        attempt = field::Empty,
    ))]
    pub async fn run(self: Arc<Self>, transport: Arc<dyn Transport>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Push channel loop already running, ignoring second start");
            return;
        }
        let mut shutdown = self.shutdown.subscribe();
        let mut failures: u32 = 0;
        info!(max_attempts = self.policy.max_attempts, "Push channel starting");

        loop {
            if *shutdown.borrow() {
                break;
            }
            self.enter_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                result = transport.connect() => result,
            };

            let delay = match connected {
                Ok(mut conn) => {
                    failures = 0;
                    Span::current().record(logging::ATTEMPT, failures);
                    self.enter_state(ConnectionState::Connected);
                    info!("Push channel connected");

                    let reason = loop {
                        tokio::select! {
                            biased;
                            _ = stopped(&mut shutdown) => break None,
                            frame = conn.next_frame() => match frame {
                                Some(Ok(text)) => {
                                    self.dispatch_frame(&text);
                                }
                                Some(Err(e)) => break Some(e.to_string()),
                                None => break Some("closed by peer".to_string()),
                            },
                        }
                    };
                    let Some(reason) = reason else {
                        break;
                    };
                    self.enter_state(ConnectionState::Connecting);
                    let delay = self.policy.delay(0);
                    warn!(
                        error = %reason,
                        delay_ms = delay.as_millis() as u64,
                        "Push channel dropped, reconnecting"
                    );
                    delay
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    Span::current().record(logging::ATTEMPT, failures);
                    if self.policy.is_exhausted(failures) {
                        error!(
                            error = %e,
                            "Push channel giving up after repeated connect failures"
                        );
                        break;
                    }
                    let delay = self.policy.delay(failures - 1);
                    warn!(
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Push channel connect failed, retrying"
                    );
                    delay
                }
            };

            if !sleep_unless_stopped(delay, &mut shutdown).await {
                break;
            }
        }

        self.enter_state(ConnectionState::Disconnected);
        self.running.store(false, Ordering::SeqCst);
        info!("Push channel stopped");
    }

    /// `set_state` plus recording the state on the loop span.
    fn enter_state(&self, next: ConnectionState) {
        self.set_state(next);
        Span::current().record(logging::CONNECTION_STATE, field::display(next));
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<(ListenerId, Handler)>>> {
        self.listeners.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Resolves once shutdown has been requested.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    // Err means the handle is gone, which is a shutdown as well.
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Sleep for `delay`; returns `false` if shutdown was requested meanwhile.
async fn sleep_unless_stopped(delay: Duration, rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = stopped(rx) => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
