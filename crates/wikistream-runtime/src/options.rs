//! Session options.

use std::sync::Arc;

use wikistream_core::{
    DEFAULT_BASE_URL, DEFAULT_USER_AGENT, ReconnectConfig, Since, StreamResult, TransportError,
};

use crate::config::WikiStreamConfig;

/// Hook run each time the connection opens.
pub type OpenHook = Arc<dyn Fn() + Send + Sync>;

/// Hook run for each transport error.
pub type ErrorHook = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Options for [`EventStream`](crate::EventStream).
///
/// ```rust,ignore
/// let options = StreamOptions::new()
///     .with_user_agent("my-tool/1.0 (ops@example.org)")
///     .with_since_str("2024-05-01T00:00:00Z")?
///     .on_error(|e| eprintln!("stream trouble: {e}"));
/// ```
#[derive(Clone)]
pub struct StreamOptions {
    /// Replay events from this point in time.
    pub since: Option<Since>,
    /// Identifying `User-Agent` header.
    pub user_agent: String,
    /// Base URL of the stream service.
    pub base_url: String,
    /// Reconnection policy handed to the transport.
    pub reconnect: ReconnectConfig,
    pub(crate) on_open: Option<OpenHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            since: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            reconnect: ReconnectConfig::default(),
            on_open: None,
            on_error: None,
        }
    }
}

impl StreamOptions {
    /// Creates options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes connection and reconnection settings from a loaded configuration.
    pub fn from_config(config: &WikiStreamConfig) -> Self {
        Self {
            user_agent: config.client.user_agent.clone(),
            base_url: config.client.base_url.clone(),
            reconnect: config.reconnect_config(),
            ..Self::default()
        }
    }

    /// Sets the replay point.
    ///
    /// Build one from a date-time with `Since::try_from`, or relative to now
    /// with [`Since::ago`].
    pub fn with_since(mut self, since: Since) -> Self {
        self.since = Some(since);
        self
    }

    /// Sets the replay point from a string such as `20240501000000` or
    /// `2024-05-01T00:00:00Z`.
    pub fn with_since_str(mut self, since: &str) -> StreamResult<Self> {
        self.since = Some(since.parse()?);
        Ok(self)
    }

    /// Sets the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the base URL of the stream service.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the reconnection policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Replaces the default open hook, which logs at info level.
    pub fn on_open<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_open = Some(Arc::new(hook));
        self
    }

    /// Replaces the default error hook, which logs at warn level.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TransportError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("since", &self.since)
            .field("user_agent", &self.user_agent)
            .field("base_url", &self.base_url)
            .field("reconnect", &self.reconnect)
            .field("on_open", &self.on_open.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use wikistream_core::StreamError;

    #[test]
    fn test_defaults() {
        let options = StreamOptions::default();
        assert_eq!(options.base_url, DEFAULT_BASE_URL);
        assert_eq!(options.user_agent, DEFAULT_USER_AGENT);
        assert!(options.since.is_none());
        assert!(options.on_open.is_none() && options.on_error.is_none());
    }

    #[test]
    fn test_since_str() {
        let options = StreamOptions::new()
            .with_since_str("2024-05-01T12:30:00+02:00")
            .unwrap();
        assert_eq!(options.since.unwrap().format(), "20240501103000");

        let err = StreamOptions::new().with_since_str("yesterday").unwrap_err();
        assert!(matches!(err, StreamError::InvalidSince { .. }));
    }

    #[test]
    fn test_since_relative_to_now() {
        let since = Since::ago(Duration::from_secs(600)).unwrap();
        let options = StreamOptions::new().with_since(since);
        assert_eq!(options.since, Some(since));
    }

    #[test]
    fn test_from_config() {
        let mut config = WikiStreamConfig::default();
        config.client.user_agent = "cfg-bot/1.0".into();
        config.client.base_url = "http://localhost:8092/v2/stream".into();
        config.reconnect.initial_delay_ms = 200;

        let options = StreamOptions::from_config(&config);
        assert_eq!(options.user_agent, "cfg-bot/1.0");
        assert_eq!(options.base_url, "http://localhost:8092/v2/stream");
        assert_eq!(options.reconnect.initial_delay, Duration::from_millis(200));
    }
}
