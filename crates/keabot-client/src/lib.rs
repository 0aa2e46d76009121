//! Client for the KeaBot agent backend.
//!
//! The core is an incremental decoder for the agent event stream: one
//! long-lived HTTP response carrying content tokens, tool and skill activity,
//! approval requests and completion/error signals as `event:`/`data:` records.
//! Chunks are reassembled into text (`utf8`), split into frames (`frame`),
//! typed (`event`) and delivered in order, either pulled with
//! `ChatStream::next_event` or pushed into an `EventHandler`.
//!
//! ```no_run
//! use keabot_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = KeabotClient::new(ClientConfig::new("http://localhost:8000"))?;
//! let mut stream = client.stream_chat(ChatRequest::new("List the files here")).await?;
//!
//! while let Some(event) = stream.next_event().await {
//!     if let AgentEvent::ContentDelta { text } = &event {
//!         print!("{text}");
//!     }
//! }
//!
//! let summary = stream.finish().await?;
//! println!("\nsession: {:?}", summary.session_id());
//! # Ok(())
//! # }
//! ```

/// Request and response bodies of the REST surface.
pub mod api;
/// Approve/reject side channel.
pub mod approval;
/// Client entry point and multi-turn conversation helper.
pub mod client;
/// Client configuration.
pub mod config;
/// Bytes-to-events pipeline for one stream.
pub mod decoder;
/// Public error type.
pub mod errors;
/// Typed agent events and consumer callbacks.
pub mod event;
/// Line-oriented frame decoder.
pub mod frame;
/// Common imports for typical usage.
pub mod prelude;
/// Session tracking across a stream.
pub mod session;
/// Byte sources feeding the decoder.
pub mod source;
/// Stream handle, read loop and cancellation.
pub mod stream;
/// Incremental UTF-8 decoding.
pub mod utf8;

pub use api::{
    ChatRequest, ChatResponse, HealthStatus, MAX_MESSAGE_CHARS, ServerSettings, SessionDetail,
    SessionSummary,
};
pub use approval::{ApprovalDecision, ApprovalGateway};
pub use client::{Conversation, KeabotClient};
pub use config::ClientConfig;
pub use decoder::{DecodedEvent, StreamDecoder};
pub use errors::ClientError;
pub use event::{AgentEvent, EventHandler};
pub use frame::{Frame, FrameDecoder, FrameState};
pub use session::{Session, SessionTracker};
pub use source::{ByteSource, ByteStream, HttpByteSource};
pub use stream::{AbortHandle, ChatStream, Completion, StreamSummary};
pub use utf8::Utf8Reassembler;
