use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{ChatRequest, ChatResponse, HealthStatus, ServerSettings, SessionDetail, SessionSummary};
use crate::approval::ApprovalGateway;
use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::source::{ByteSource, HttpByteSource};
use crate::stream::{ChatStream, StreamSummary};

/// Entry point for talking to the agent backend.
///
/// Cheap to clone; clones share the HTTP connection pool.
#[derive(Clone)]
pub struct KeabotClient {
    http: reqwest::Client,
    config: ClientConfig,
    source: Arc<dyn ByteSource>,
}

impl KeabotClient {
    /// Creates a client streaming over HTTP.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        let source = Arc::new(HttpByteSource::new(http.clone(), config.clone()));
        Ok(Self {
            http,
            config,
            source,
        })
    }

    /// Creates a client from `ClientConfig::from_env()`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Replaces the byte source used for streams (REST calls still use HTTP).
    pub fn with_byte_source(mut self, source: Arc<dyn ByteSource>) -> Self {
        self.source = source;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Starts one streaming turn.
    ///
    /// Transport failures show up as a `StreamError` event on the returned
    /// stream, not as an `Err` here.
    pub async fn stream_chat(&self, request: ChatRequest) -> Result<ChatStream, ClientError> {
        let request = self.prepare(request, true)?;
        let stream = ChatStream::start(
            self.source.clone(),
            request,
            self.config.stream_buffer_capacity,
        );
        debug!(stream_id = %stream.stream_id(), "started agent stream");
        Ok(stream)
    }

    /// Runs one non-streaming turn (`POST /api/chat`).
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ClientError> {
        let request = self.prepare(request, false)?;
        let url = self.config.endpoint(&["chat"])?;
        let response = self
            .http
            .post(url)
            .timeout(self.config.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(ClientError::transport)?;
        read_json(response).await
    }

    /// Returns the approval side channel.
    pub fn approvals(&self) -> ApprovalGateway {
        ApprovalGateway::new(self.http.clone(), self.config.clone())
    }

    /// `GET /api/sessions?limit=N`
    pub async fn sessions(&self, limit: u32) -> Result<Vec<SessionSummary>, ClientError> {
        let mut url = self.config.endpoint(&["sessions"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        self.get_json(url).await
    }

    /// `GET /api/sessions/{id}`
    pub async fn session(&self, session_id: &str) -> Result<SessionDetail, ClientError> {
        if session_id.trim().is_empty() {
            return Err(ClientError::Validation("session id must not be empty".into()));
        }
        let url = self.config.endpoint(&["sessions", session_id])?;
        self.get_json(url).await
    }

    /// `GET /api/settings`
    pub async fn settings(&self) -> Result<ServerSettings, ClientError> {
        let url = self.config.endpoint(&["settings"])?;
        self.get_json(url).await
    }

    /// `GET /api/health`
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let url = self.config.endpoint(&["health"])?;
        self.get_json(url).await
    }

    fn prepare(&self, request: ChatRequest, stream: bool) -> Result<ChatRequest, ClientError> {
        request.validate()?;
        let mut request = request.streaming(stream);
        if request.provider.is_none() {
            request.provider = self.config.default_provider.clone();
        }
        Ok(request)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: reqwest::Url) -> Result<T, ClientError> {
        let response = self
            .http
            .get(url)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(ClientError::transport)?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::status(status));
    }
    let body = response.bytes().await.map_err(ClientError::transport)?;
    serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Carries the session id from one turn to the next.
pub struct Conversation {
    client: KeabotClient,
    session_id: Option<String>,
    provider: Option<String>,
}

impl Conversation {
    pub fn new(client: KeabotClient) -> Self {
        Self {
            client,
            session_id: None,
            provider: None,
        }
    }

    /// Continues a conversation started elsewhere.
    pub fn resume(client: KeabotClient, session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::new(client)
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn client(&self) -> &KeabotClient {
        &self.client
    }

    /// Starts a streaming turn carrying the current session id.
    pub async fn start_turn(
        &self,
        message: impl Into<String>,
    ) -> Result<ChatStream, ClientError> {
        self.client.stream_chat(self.request(message)).await
    }

    /// Finishes a turn started with `start_turn` and adopts its session id.
    pub async fn complete_turn(&mut self, stream: ChatStream) -> Result<StreamSummary, ClientError> {
        let summary = stream.finish().await?;
        self.adopt(&summary);
        Ok(summary)
    }

    /// Records the session reported by a finished stream.
    pub fn adopt(&mut self, summary: &StreamSummary) {
        if let Some(id) = summary.session_id() {
            self.session_id = Some(id.to_string());
        }
    }

    /// Runs a non-streaming turn and adopts the returned session id.
    pub async fn send(&mut self, message: impl Into<String>) -> Result<ChatResponse, ClientError> {
        let response = self.client.chat(self.request(message)).await?;
        self.session_id = Some(response.session_id.clone());
        Ok(response)
    }

    fn request(&self, message: impl Into<String>) -> ChatRequest {
        ChatRequest {
            message: message.into(),
            session_id: self.session_id.clone(),
            provider: self.provider.clone(),
            stream: true,
        }
    }
}
