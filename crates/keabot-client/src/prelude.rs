pub use crate::api::ChatRequest;
pub use crate::client::{Conversation, KeabotClient};
pub use crate::config::ClientConfig;
pub use crate::errors::ClientError;
pub use crate::event::{AgentEvent, EventHandler};
pub use crate::stream::{AbortHandle, ChatStream, StreamSummary};
