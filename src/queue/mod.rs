//! Queue port: at-least-once delivery with visibility-timeout semantics.
//!
//! The pipeline synchronizes its stages exclusively through queue messages.
//! A received message stays hidden from other consumers for the visibility
//! timeout; deleting it acknowledges completion, letting the timeout lapse
//! causes redelivery.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod memory;

pub use memory::MemoryQueue;

/// A message handed out by `receive`, identified by its receipt handle.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub body: String,
    pub receipt_handle: String,
}

#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Long-poll `queue` for up to `max` messages, waiting at most `wait`.
    async fn receive(&self, queue: &str, max: usize, wait: Duration) -> Result<Vec<ReceivedMessage>>;

    /// Acknowledge a message; it will not be redelivered.
    async fn delete(&self, queue: &str, receipt_handle: &str) -> Result<()>;

    /// Append a message to the queue.
    async fn send(&self, queue: &str, body: &str) -> Result<()>;
}
