//! Runtime configuration for the synchronization layer.

use std::time::Duration;

use crate::models::DEFAULT_CONVERSATION_TITLE;

/// Default conversation store base URL.
pub const DEFAULT_STORE_URL: &str = "http://localhost:8000";

/// Default page size when fetching a conversation's messages.
pub const DEFAULT_MESSAGE_PAGE_LIMIT: u32 = 100;

/// Default wait after selecting a freshly created conversation.
pub const DEFAULT_REMOUNT_DELAY: Duration = Duration::from_millis(300);

/// Default transport timeout applied to the HTTP client.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the session layer.
///
/// Use the builder pattern to customize behavior.
///
/// # Example
///
/// ```ignore
/// use convsync::config::SyncConfig;
///
/// let config = SyncConfig::default()
///     .with_store_url("http://store.internal:8000")
///     .with_remount_delay(std::time::Duration::ZERO);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Conversation store base URL (default: http://localhost:8000)
    pub store_url: String,
    /// Title for conversations created without one
    pub default_title: String,
    /// Messages fetched per conversation on select/refresh
    pub message_page_limit: u32,
    /// Wait after selecting a new conversation so the widget can remount
    pub remount_delay: Duration,
    /// List soft-deleted conversations too
    pub include_inactive: bool,
    /// Delete conversations by marking them inactive
    pub soft_delete: bool,
    /// Transport timeout for store requests
    pub request_timeout: Duration,
    /// Whether the persistence bridge writes stream messages
    pub persistence_enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store_url: DEFAULT_STORE_URL.to_string(),
            default_title: DEFAULT_CONVERSATION_TITLE.to_string(),
            message_page_limit: DEFAULT_MESSAGE_PAGE_LIMIT,
            remount_delay: DEFAULT_REMOUNT_DELAY,
            include_inactive: false,
            soft_delete: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            persistence_enabled: true,
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store base URL. A trailing slash is dropped.
    pub fn with_store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    pub fn with_message_page_limit(mut self, limit: u32) -> Self {
        self.message_page_limit = limit;
        self
    }

    pub fn with_remount_delay(mut self, delay: Duration) -> Self {
        self.remount_delay = delay;
        self
    }

    pub fn with_include_inactive(mut self, include: bool) -> Self {
        self.include_inactive = include;
        self
    }

    pub fn with_soft_delete(mut self, soft: bool) -> Self {
        self.soft_delete = soft;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_persistence_enabled(mut self, enabled: bool) -> Self {
        self.persistence_enabled = enabled;
        self
    }

    /// Create config from `CONVSYNC_*` environment variables.
    ///
    /// Unset variables keep their defaults. Numeric values that fail to
    /// parse are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("CONVSYNC_STORE_URL") {
            if !url.trim().is_empty() {
                config = config.with_store_url(url.trim());
            }
        }
        if let Ok(title) = std::env::var("CONVSYNC_DEFAULT_TITLE") {
            if !title.trim().is_empty() {
                config.default_title = title;
            }
        }
        if let Some(limit) = parse_env::<u32>("CONVSYNC_MESSAGE_LIMIT") {
            config.message_page_limit = limit;
        }
        if let Some(ms) = parse_env::<u64>("CONVSYNC_REMOUNT_DELAY_MS") {
            config.remount_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_env::<u64>("CONVSYNC_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(value) = std::env::var("CONVSYNC_PERSIST") {
            config.persistence_enabled = value.trim() != "0";
        }

        config
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", name, raw);
            None
        }
    }
}
