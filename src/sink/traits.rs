// Message sink trait: where rendered posts are delivered.
//
// Each chat platform integration implements MessageSink. The dispatcher
// resolves a subscription's destination to a sink through the registry and
// sends one message per post.

use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::Destination;

/// Why a single send failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("no sink registered for platform {platform:?} (bot {bot_id:?})")]
    NoSink { platform: String, bot_id: String },
    #[error("destination rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("send failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one rendered message to a destination channel.
    async fn send(&self, destination: &Destination, message: &str) -> Result<(), SendError>;
}
