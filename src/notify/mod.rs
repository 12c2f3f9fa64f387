// src/notify/mod.rs
pub mod format;
pub mod telegram;

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use telegram::TelegramClient;

/// A chat that receives notifications (Telegram chat id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Destination(pub i64);

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbound side of the chat transport.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Deliver one formatted message. Single attempt; the caller decides what a failure means.
    async fn deliver(&self, dest: Destination, text: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Writes messages to the log instead of a chat. Used by the preview binary.
pub struct LogTransport;

#[async_trait::async_trait]
impl ChatTransport for LogTransport {
    async fn deliver(&self, dest: Destination, text: &str) -> Result<()> {
        tracing::info!(dest = %dest, "\n{text}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
