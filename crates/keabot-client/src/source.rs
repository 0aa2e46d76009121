use std::pin::Pin;

use futures::StreamExt as _;
use tracing::debug;

use crate::api::ChatRequest;
use crate::config::ClientConfig;
use crate::errors::ClientError;

/// Ordered byte chunks of one response body.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, ClientError>> + Send + 'static>>;

/// Opens the byte stream for one conversational turn.
#[async_trait::async_trait]
pub trait ByteSource: Send + Sync {
    /// Sends the request. A non-success status must be reported as
    /// `ClientError::Status` without reading the body.
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ClientError>;
}

/// `POST /api/chat/stream` over reqwest.
#[derive(Clone)]
pub struct HttpByteSource {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpByteSource {
    pub fn new(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait::async_trait]
impl ByteSource for HttpByteSource {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ClientError> {
        let url = self.config.endpoint(&["chat", "stream"])?;
        debug!(%url, session_id = ?request.session_id, "opening agent event stream");

        // No whole-request timeout: the body stays open while tools run.
        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(ClientError::transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::status(status));
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(ClientError::transport)),
        ))
    }
}
