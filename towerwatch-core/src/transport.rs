//! The messaging transport seam.
//!
//! Everything the core needs from the chat platform fits in four calls:
//! send, edit, fetch, and history. The `discord` crate provides the real
//! implementation; `testing::MockTransport` provides the scripted one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Opaque channel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(pub u64);

/// Opaque message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageRef(pub u64);

/// A message as seen through the transport.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: MessageRef,
    /// True when this process's own identity authored the message.
    pub author_is_self: bool,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Transport failures, split so the scheduler can react per class:
/// `NotFound` triggers recovery, everything else is retried next tick.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("message not found")]
    NotFound,

    #[error("network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse transport payload: {0}")]
    Parse(String),
}

impl TransportError {
    /// True when the target of an edit/fetch is confirmed gone, as
    /// opposed to a transient failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::NotFound)
    }
}

impl From<discord::Error> for TransportError {
    fn from(err: discord::Error) -> Self {
        match err {
            discord::Error::NotFound => TransportError::NotFound,
            discord::Error::Network(msg) => TransportError::Network(msg),
            discord::Error::Api { status, message } => TransportError::Api { status, message },
            discord::Error::Parse(msg) => TransportError::Parse(msg),
            discord::Error::NoToken | discord::Error::Config(_) => TransportError::Api {
                status: 0,
                message: err.to_string(),
            },
        }
    }
}

/// The messaging transport the core runs against.
///
/// Transport calls are the only suspending operations in the system; all
/// extraction, consensus, and render logic stays synchronous.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post new content, returning a handle for later edits.
    async fn send(&self, channel: ChannelId, content: &str) -> Result<MessageRef, TransportError>;

    /// Replace the content of an existing message.
    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageRef,
        content: &str,
    ) -> Result<(), TransportError>;

    /// Fetch a single message.
    async fn fetch(
        &self,
        channel: ChannelId,
        message: MessageRef,
    ) -> Result<ChatMessage, TransportError>;

    /// Most recent messages in a channel, newest first.
    async fn history(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, TransportError>;
}

/// `ChatTransport` over the Discord REST API.
pub struct DiscordTransport {
    client: discord::Discord,
    self_id: String,
}

impl DiscordTransport {
    /// Wrap a Discord client, resolving the bot's own user id so
    /// self-authored messages can be recognized in history.
    pub async fn connect(client: discord::Discord) -> Result<Self, TransportError> {
        let user = client.current_user().await?;
        Ok(Self {
            client,
            self_id: user.id,
        })
    }

    fn convert(&self, message: discord::Message) -> Result<ChatMessage, TransportError> {
        let id = message
            .id_u64()
            .ok_or_else(|| TransportError::Parse(format!("bad message id: {}", message.id)))?;
        let timestamp = DateTime::parse_from_rfc3339(&message.timestamp)
            .map_err(|e| TransportError::Parse(format!("bad timestamp: {e}")))?
            .with_timezone(&Utc);
        Ok(ChatMessage {
            id: MessageRef(id),
            author_is_self: message.author.id == self.self_id,
            content: message.content,
            timestamp,
        })
    }
}

#[async_trait]
impl ChatTransport for DiscordTransport {
    async fn send(&self, channel: ChannelId, content: &str) -> Result<MessageRef, TransportError> {
        let message = self.client.create_message(channel.0, content).await?;
        let id = message
            .id_u64()
            .ok_or_else(|| TransportError::Parse(format!("bad message id: {}", message.id)))?;
        Ok(MessageRef(id))
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageRef,
        content: &str,
    ) -> Result<(), TransportError> {
        self.client.edit_message(channel.0, message.0, content).await?;
        Ok(())
    }

    async fn fetch(
        &self,
        channel: ChannelId,
        message: MessageRef,
    ) -> Result<ChatMessage, TransportError> {
        let message = self.client.get_message(channel.0, message.0).await?;
        self.convert(message)
    }

    async fn history(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, TransportError> {
        let messages = self.client.get_channel_messages(channel.0, limit).await?;
        messages.into_iter().map(|m| self.convert(m)).collect()
    }
}
