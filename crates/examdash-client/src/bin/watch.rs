//! examdash-watch: tail the notification and activity-log feeds into the log.
//!
//! Mounts every feed the configured role may see, then logs each change until
//! interrupted.

use std::sync::Arc;

use examdash_client::{ClientConfig, Session};
use examdash_core::{
    new_entry_window, BadgeCounter, ChangeKind, FeedChange, FeedEntry, FeedStore, ToastPresenter,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn watch_feed<E: FeedEntry>(store: &FeedStore<E>) -> (Arc<BadgeCounter>, Arc<ToastPresenter>) {
    let badge = Arc::new(BadgeCounter::new());
    let toasts = Arc::new(ToastPresenter::default());
    store.subscribe(badge.clone());
    store.subscribe(toasts.clone());

    let feed = store.feed();
    let log_badge = Arc::clone(&badge);
    let log_toasts = Arc::clone(&toasts);
    store.subscribe(Arc::new(move |change: &FeedChange<E>| {
        match &change.kind {
            ChangeKind::Merged(_) => {
                for toast in log_toasts.drain() {
                    info!(
                        feed = %feed,
                        entry_id = toast.entry_id,
                        badge = %log_badge.label(),
                        "{}: {}",
                        toast.title,
                        toast.body
                    );
                }
            }
            ChangeKind::Replaced => {
                let now = chrono::Utc::now();
                let window = new_entry_window();
                info!(
                    feed = %feed,
                    entry_count = change.snapshot.entries.len(),
                    unread_count = change.snapshot.unread_count,
                    new_count = change.snapshot.entries.iter().filter(|e| e.is_new(now, window)).count(),
                    "Feed loaded"
                );
            }
            ChangeKind::StatusChanged(status) => info!(feed = %feed, status = %status, "Feed status"),
            _ => {}
        }
    }));
    (badge, toasts)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: debug for every examdash crate)
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "examdash_core=debug,examdash_channel=debug,examdash_client=debug,examdash_watch=debug"
            .into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("examdash-watch.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ClientConfig::from_env()?;
    info!(
        api_url = %config.api_url,
        channel_url = %config.channel_url,
        role = %config.role,
        authenticated = config.token.is_some(),
        "Configuration loaded"
    );

    let session = Session::open(&config)?;
    let _notifications = watch_feed(session.notifications().store());
    let _activity_logs = watch_feed(session.activity_logs().store());

    let mounted = session.mount_allowed().await;
    info!(session_id = %session.id(), feeds = ?mounted, "Watching feeds");

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");
    session.end().await;
    Ok(())
}
