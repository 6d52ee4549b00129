//! Client configuration loaded from the environment.

use std::time::Duration;

use examdash_channel::ReconnectPolicy;
use examdash_core::{defaults, Error, Result, Role};

/// Everything a session needs to reach the dashboard server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL, without trailing slash.
    pub api_url: String,
    /// Push channel URL.
    pub channel_url: String,
    /// Bearer token for REST and the push channel.
    pub token: Option<String>,
    /// Role of the signed-in account.
    pub role: Role,
    /// Cap of the notification feed. `None` keeps everything.
    pub recent_limit: Option<usize>,
    pub http_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::API_URL.to_string(),
            channel_url: defaults::CHANNEL_URL.to_string(),
            token: None,
            role: Role::Student,
            recent_limit: Some(defaults::RECENT_NOTIFICATIONS_LIMIT),
            http_timeout: Duration::from_secs(defaults::HTTP_TIMEOUT_SECS),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `EXAMDASH_API_URL` | `http://127.0.0.1:8080/api` | REST base URL |
    /// | `EXAMDASH_CHANNEL_URL` | `ws://127.0.0.1:8080/ws` | Push channel URL |
    /// | `EXAMDASH_TOKEN` | unset | Bearer token |
    /// | `EXAMDASH_ROLE` | `student` | Session role |
    /// | `EXAMDASH_RECENT_LIMIT` | `50` | Notification cap (0 = uncapped) |
    /// | `EXAMDASH_HTTP_TIMEOUT_SECS` | `15` | REST timeout |
    ///
    /// Reconnect settings come from [`ReconnectPolicy::from_env`].
    ///
    /// An unknown role is an error rather than a silent downgrade.
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_vars(|key| std::env::var(key).ok())?
            .with_reconnect(ReconnectPolicy::from_env()))
    }

    /// Build config from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base = Self::default();

        let api_url = lookup("EXAMDASH_API_URL")
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(base.api_url);

        let channel_url = lookup("EXAMDASH_CHANNEL_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(base.channel_url);

        let token = lookup("EXAMDASH_TOKEN").filter(|v| !v.is_empty());

        let role = match lookup("EXAMDASH_ROLE") {
            Some(v) if !v.trim().is_empty() => v.parse::<Role>()?,
            _ => base.role,
        };

        let recent_limit = match lookup("EXAMDASH_RECENT_LIMIT").and_then(|v| v.parse::<usize>().ok()) {
            Some(0) => None,
            Some(n) => Some(n),
            None => base.recent_limit,
        };

        let http_timeout = lookup("EXAMDASH_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(base.http_timeout);

        let config = Self {
            api_url,
            channel_url,
            token,
            role,
            recent_limit,
            http_timeout,
            reconnect: base.reconnect,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that both URLs use a scheme their client can speak.
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(Error::InvalidInput(format!(
                "API URL must be http or https: {}",
                self.api_url
            )));
        }
        if !(self.channel_url.starts_with("ws://") || self.channel_url.starts_with("wss://")) {
            return Err(Error::InvalidInput(format!(
                "Channel URL must be ws or wss: {}",
                self.channel_url
            )));
        }
        Ok(())
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_channel_url(mut self, url: impl Into<String>) -> Self {
        self.channel_url = url.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_recent_limit(mut self, limit: Option<usize>) -> Self {
        self.recent_limit = limit;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}
