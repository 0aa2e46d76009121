use std::time::Duration;

use reqwest::Url;

use crate::errors::ClientError;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Configuration for a `KeabotClient`.
///
/// There is no global client: every client is built from one of these, and
/// every stream it opens gets its own decoder.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the agent backend, without the `/api` prefix.
    pub base_url: String,
    /// Timeout for establishing a TCP/TLS connection.
    pub connect_timeout: Duration,
    /// Whole-request timeout for short REST calls.
    ///
    /// Not applied to the event stream: a stream may stay silent for as long
    /// as a tool takes to run.
    pub request_timeout: Duration,
    /// Bounded buffer between the read loop and the consumer.
    pub stream_buffer_capacity: usize,
    /// Provider sent as `llm_provider` when a request does not name one.
    pub default_provider: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            stream_buffer_capacity: 64,
            default_provider: None,
        }
    }
}

impl ClientConfig {
    /// Creates a config pointing at `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Builds a config from the environment.
    ///
    /// - `KEABOT_API_URL`: backend base URL (default `http://localhost:8000`).
    /// - `KEABOT_LLM_PROVIDER`: default provider (`gemini`, `openai`).
    /// - `KEABOT_REQUEST_TIMEOUT_SECS`: timeout for short REST calls.
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("KEABOT_API_URL")
            && !url.trim().is_empty()
        {
            config.base_url = url.trim().to_string();
        }
        if let Ok(provider) = std::env::var("KEABOT_LLM_PROVIDER")
            && !provider.trim().is_empty()
        {
            config.default_provider = Some(provider.trim().to_string());
        }
        if let Ok(raw) = std::env::var("KEABOT_REQUEST_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                ClientError::Config(format!("invalid KEABOT_REQUEST_TIMEOUT_SECS: {raw:?}"))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the backend base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the timeout used by short REST calls.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the bounded stream buffer size.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.stream_buffer_capacity = capacity;
        self
    }

    /// Sets the provider used when a request does not name one.
    pub fn default_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = Some(provider.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.stream_buffer_capacity == 0 {
            return Err(ClientError::Config(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        self.endpoint(&[]).map(|_| ())
    }

    /// Resolves `segments` below `<base_url>/api`, percent-encoding each one.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = Url::parse(self.base_url.trim())
            .map_err(|e| ClientError::Config(format!("invalid base URL {:?}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Config(format!("base URL {:?} cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }
}
