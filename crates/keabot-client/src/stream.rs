use std::sync::Arc;

use futures::StreamExt as _;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::api::ChatRequest;
use crate::decoder::StreamDecoder;
use crate::errors::ClientError;
use crate::event::{AgentEvent, EventHandler};
use crate::session::{Session, SessionTracker};
use crate::source::ByteSource;

/// Handle used to cancel a running stream.
#[derive(Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Once this returns, the owning `ChatStream` delivers no further events
    /// and `finish()` reports `ClientError::Cancelled`.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// `done` frame contents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub visited_files: Vec<String>,
    pub activated_skills: Vec<String>,
    pub tool_call_count: u64,
}

/// What a stream left behind once its connection closed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub stream_id: uuid::Uuid,
    /// First session assigned on the stream.
    pub session: Option<Session>,
    /// Last `done` frame, if any. A stream that closes without one is still a
    /// clean end.
    pub completion: Option<Completion>,
    /// Message of the last `StreamError`, from the backend or the transport.
    pub error: Option<String>,
    pub events_dispatched: u64,
    pub frames_decoded: u64,
}

impl StreamSummary {
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }
}

/// Streaming handle for one conversational turn.
///
/// Events are decoded on a background task and handed over through a
/// bounded channel, so a slow consumer slows down reading from the socket.
pub struct ChatStream {
    stream_id: uuid::Uuid,
    rx: mpsc::Receiver<AgentEvent>,
    final_rx: oneshot::Receiver<Result<StreamSummary, ClientError>>,
    abort_handle: AbortHandle,
}

impl ChatStream {
    /// Spawns the read loop for `request` on the current tokio runtime.
    pub(crate) fn start(
        source: Arc<dyn ByteSource>,
        request: ChatRequest,
        buffer_capacity: usize,
    ) -> Self {
        let stream_id = uuid::Uuid::new_v4();
        let (tx, rx) = mpsc::channel(buffer_capacity.max(1));
        let (final_tx, final_rx) = oneshot::channel();
        let (abort_tx, abort_rx) = watch::channel(false);

        tokio::spawn(read_task(stream_id, source, request, tx, final_tx, abort_rx));

        Self {
            stream_id,
            rx,
            final_rx,
            abort_handle: AbortHandle {
                tx: Arc::new(abort_tx),
            },
        }
    }

    pub fn stream_id(&self) -> uuid::Uuid {
        self.stream_id
    }

    /// Returns a handle that can cancel the stream from another task.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the connection has closed and every event was
    /// delivered, or as soon as the stream is aborted.
    pub async fn next_event(&mut self) -> Option<AgentEvent> {
        if self.abort_handle.is_aborted() {
            return None;
        }
        let event = self.rx.recv().await;
        if self.abort_handle.is_aborted() {
            return None;
        }
        event
    }

    /// Delivers every remaining event to `handler`, then finishes.
    pub async fn drive<H: EventHandler + ?Sized>(
        mut self,
        handler: &mut H,
    ) -> Result<StreamSummary, ClientError> {
        while let Some(event) = self.next_event().await {
            event.dispatch(handler);
        }
        self.finish().await
    }

    /// Drains undelivered events and returns the stream summary.
    pub async fn finish(mut self) -> Result<StreamSummary, ClientError> {
        while self.next_event().await.is_some() {}
        if self.abort_handle.is_aborted() {
            return Err(ClientError::Cancelled);
        }
        match self.final_rx.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Protocol(format!(
                "read task for stream {} ended without a result",
                self.stream_id
            ))),
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

struct ReadState {
    stream_id: uuid::Uuid,
    tx: mpsc::Sender<AgentEvent>,
    abort_rx: watch::Receiver<bool>,
    tracker: SessionTracker,
    summary: StreamSummary,
}

impl ReadState {
    async fn deliver(&mut self, frame: u64, event: AgentEvent) -> Flow {
        if *self.abort_rx.borrow() {
            return Flow::Stop;
        }
        self.tracker.observe(frame, &event);
        match &event {
            AgentEvent::StreamCompleted {
                visited_files,
                activated_skills,
                tool_call_count,
            } => {
                self.summary.completion = Some(Completion {
                    visited_files: visited_files.clone(),
                    activated_skills: activated_skills.clone(),
                    tool_call_count: *tool_call_count,
                });
            }
            AgentEvent::StreamError { message } => self.summary.error = Some(message.clone()),
            _ => {}
        }
        let sent = tokio::select! {
            biased;
            _ = cancelled(&mut self.abort_rx) => return Flow::Stop,
            sent = self.tx.send(event) => sent,
        };
        if sent.is_err() {
            debug!(stream_id = %self.stream_id, "consumer dropped, stopping read loop");
            return Flow::Stop;
        }
        self.summary.events_dispatched += 1;
        Flow::Continue
    }

    async fn fail(&mut self, frame: u64, err: &ClientError) {
        warn!(stream_id = %self.stream_id, error = %err, "agent stream failed");
        let message = err.stream_message();
        let _ = self.deliver(frame, AgentEvent::StreamError { message }).await;
    }

    fn into_summary(mut self, decoder: &StreamDecoder) -> StreamSummary {
        self.summary.session = self.tracker.into_session();
        self.summary.frames_decoded = decoder.frames_decoded();
        self.summary
    }
}

async fn read_task(
    stream_id: uuid::Uuid,
    source: Arc<dyn ByteSource>,
    request: ChatRequest,
    tx: mpsc::Sender<AgentEvent>,
    final_tx: oneshot::Sender<Result<StreamSummary, ClientError>>,
    mut abort_rx: watch::Receiver<bool>,
) {
    let mut state = ReadState {
        stream_id,
        tx,
        abort_rx: abort_rx.clone(),
        tracker: SessionTracker::new(),
        summary: StreamSummary {
            stream_id,
            ..StreamSummary::default()
        },
    };
    let mut decoder = StreamDecoder::new();
    let consumer = state.tx.clone();

    let opened = tokio::select! {
        biased;
        _ = cancelled(&mut abort_rx) => {
            let _ = final_tx.send(Err(ClientError::Cancelled));
            return;
        }
        _ = consumer.closed() => {
            debug!(stream_id = %stream_id, "consumer dropped before the stream opened");
            return;
        }
        opened = source.open(&request) => opened,
    };
    let mut bytes = match opened {
        Ok(bytes) => bytes,
        Err(err) => {
            state.fail(0, &err).await;
            let _ = final_tx.send(Ok(state.into_summary(&decoder)));
            return;
        }
    };

    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut abort_rx) => {
                debug!(stream_id = %stream_id, "agent stream cancelled");
                let _ = final_tx.send(Err(ClientError::Cancelled));
                return;
            }
            _ = consumer.closed() => {
                debug!(stream_id = %stream_id, "consumer dropped, releasing connection");
                return;
            }
            next = bytes.next() => match next {
                Some(Ok(chunk)) => {
                    for decoded in decoder.push_chunk(&chunk) {
                        if let Flow::Stop = state.deliver(decoded.frame, decoded.event).await {
                            let result = if *abort_rx.borrow() {
                                Err(ClientError::Cancelled)
                            } else {
                                Ok(state.into_summary(&decoder))
                            };
                            let _ = final_tx.send(result);
                            return;
                        }
                    }
                }
                Some(Err(err)) => {
                    let frame = decoder.frames_decoded();
                    state.fail(frame, &err).await;
                    break;
                }
                None => {
                    debug!(stream_id = %stream_id, frames = decoder.frames_decoded(), "agent stream closed");
                    break;
                }
            }
        }
    }

    decoder.finish();
    let _ = final_tx.send(Ok(state.into_summary(&decoder)));
}

/// Resolves once the stream is aborted. Pends forever if every handle is gone;
/// a dropped `ChatStream` is noticed through the closed event channel instead.
async fn cancelled(abort_rx: &mut watch::Receiver<bool>) {
    if abort_rx.wait_for(|aborted| *aborted).await.is_err() {
        std::future::pending::<()>().await;
    }
}
