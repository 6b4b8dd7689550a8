//! Channel abstraction for message I/O.
//!
//! A channel produces a lazy, effectively-infinite stream of inbound
//! messages and accepts outbound replies. The dispatch pipeline depends
//! only on the [`Channel`] trait; adapters carry no dispatch logic.

pub mod telegram;

pub use telegram::TelegramChannel;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

/// An inbound chat message. Produced by a channel adapter; read-only to
/// the pipeline and never persisted.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Message body text.
    pub text: String,
    /// Conversation the message belongs to.
    pub conversation_id: String,
    /// Who sent it.
    pub sender_id: String,
    /// The message's own id, referenced by the reply.
    pub source_message_id: String,
    /// Set when the message is itself a reply to an earlier message.
    pub replied_to: Option<RepliedTo>,
}

/// The message an inbound message replied to.
#[derive(Debug, Clone)]
pub struct RepliedTo {
    pub id: String,
    pub text: String,
}

impl InboundMessage {
    pub fn new(
        text: impl Into<String>,
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        source_message_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            source_message_id: source_message_id.into(),
            replied_to: None,
        }
    }

    pub fn with_replied_to(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.replied_to = Some(RepliedTo {
            id: id.into(),
            text: text.into(),
        });
        self
    }
}

/// An outbound reply, built once per dispatched message and handed to the
/// channel for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    /// Conversation to deliver into.
    pub conversation_id: String,
    /// Reply text. Never empty — empty bodies are suppressed upstream.
    pub body: String,
    /// Source message this reply references, if any.
    pub reply_to_message_id: Option<String>,
    /// Instruct the transport to clear any prior inline keyboard.
    pub suppress_prior_keyboard: bool,
}

/// Stream of inbound messages, infinite until shutdown.
pub type MessageStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// A chat transport binding.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name for logging.
    fn name(&self) -> &str;

    /// Start receiving and return the inbound message stream.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Deliver one reply. Failures are non-fatal to the pipeline; the
    /// reply is dropped and the error logged.
    async fn send(&self, reply: OutboundReply) -> Result<(), ChannelError>;

    /// Verify the transport is reachable and authenticated.
    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
