//! In-memory queue with real visibility-timeout semantics.
//!
//! Reference implementation of the queue port, used by the single-process
//! deployment and the test suite. Messages received but not deleted become
//! visible again once their visibility timeout lapses.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};

use super::{QueueClient, ReceivedMessage};

const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct QueuedMessage {
    id: u64,
    body: String,
    /// Hidden until this instant; `None` means visible now.
    invisible_until: Option<Instant>,
    /// Bumped on every receive so stale receipt handles stop matching.
    receive_count: u32,
}

#[derive(Default)]
struct QueueState {
    messages: Vec<QueuedMessage>,
    next_id: u64,
}

/// A set of named in-memory queues sharing one visibility timeout.
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl MemoryQueue {
    pub fn new() -> Arc<Self> {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            queues: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            visibility_timeout,
        })
    }

    /// Number of messages currently in `queue`, visible or not.
    pub async fn len(&self, queue: &str) -> usize {
        let queues = self.queues.lock().await;
        queues.get(queue).map(|q| q.messages.len()).unwrap_or(0)
    }

    async fn try_receive(&self, queue: &str, max: usize) -> Vec<ReceivedMessage> {
        let now = Instant::now();
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();

        let mut received = Vec::new();
        for msg in state.messages.iter_mut() {
            if received.len() >= max {
                break;
            }
            let visible = msg.invisible_until.map(|t| t <= now).unwrap_or(true);
            if visible {
                msg.invisible_until = Some(now + self.visibility_timeout);
                msg.receive_count += 1;
                received.push(ReceivedMessage {
                    body: msg.body.clone(),
                    receipt_handle: format!("{}:{}", msg.id, msg.receive_count),
                });
            }
        }
        received
    }
}

#[async_trait]
impl QueueClient for MemoryQueue {
    async fn receive(&self, queue: &str, max: usize, wait: Duration) -> Result<Vec<ReceivedMessage>> {
        let deadline = Instant::now() + wait;
        loop {
            let received = self.try_receive(queue, max).await;
            if !received.is_empty() {
                return Ok(received);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            // Wake on new sends, or re-check periodically so messages whose
            // visibility timeout lapsed inside the wait window are seen.
            let _ = tokio::time::timeout(
                (deadline - now).min(Duration::from_millis(100)),
                self.notify.notified(),
            )
            .await;
        }
    }

    async fn delete(&self, queue: &str, receipt_handle: &str) -> Result<()> {
        let Some((id, count)) = receipt_handle.split_once(':') else {
            bail!("malformed receipt handle: {receipt_handle}");
        };
        let id: u64 = id.parse()?;
        let count: u32 = count.parse()?;

        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();
        let before = state.messages.len();
        state
            .messages
            .retain(|m| !(m.id == id && m.receive_count == count));
        if state.messages.len() == before {
            bail!("receipt handle expired or unknown: {receipt_handle}");
        }
        Ok(())
    }

    async fn send(&self, queue: &str, body: &str) -> Result<()> {
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue.to_string()).or_default();
        let id = state.next_id;
        state.next_id += 1;
        state.messages.push(QueuedMessage {
            id,
            body: body.to_string(),
            invisible_until: None,
            receive_count: 0,
        });
        drop(queues);
        self.notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_receive_delete() {
        let queue = MemoryQueue::new();
        queue.send("q", "hello").await.unwrap();

        let msgs = queue.receive("q", 1, Duration::from_millis(10)).await.unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].body, "hello");

        queue.delete("q", &msgs[0].receipt_handle).await.unwrap();
        assert_eq!(queue.len("q").await, 0);
    }

    #[tokio::test]
    async fn test_received_message_is_hidden() {
        let queue = MemoryQueue::new();
        queue.send("q", "one").await.unwrap();

        let first = queue.receive("q", 1, Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.len(), 1);

        // Still in flight: not visible to a second consumer.
        let second = queue.receive("q", 1, Duration::from_millis(10)).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_visibility_timeout_redelivers() {
        let queue = MemoryQueue::with_visibility_timeout(Duration::from_millis(20));
        queue.send("q", "retry-me").await.unwrap();

        let first = queue.receive("q", 1, Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.len(), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;

        let second = queue.receive("q", 1, Duration::from_millis(200)).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].body, "retry-me");
        // Redelivery invalidates the old receipt handle.
        assert!(queue.delete("q", &first[0].receipt_handle).await.is_err());
        queue.delete("q", &second[0].receipt_handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_waits_for_send() {
        let queue = MemoryQueue::new();
        let q2 = queue.clone();
        let sender = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            q2.send("q", "late").await.unwrap();
        });

        let msgs = queue.receive("q", 1, Duration::from_secs(2)).await.unwrap();
        assert_eq!(msgs.len(), 1);
        sender.await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_receive_times_out() {
        let queue = MemoryQueue::new();
        let msgs = queue.receive("q", 1, Duration::from_millis(30)).await.unwrap();
        assert!(msgs.is_empty());
    }

    #[tokio::test]
    async fn test_queues_are_independent() {
        let queue = MemoryQueue::new();
        queue.send("a", "for-a").await.unwrap();
        let msgs = queue.receive("b", 1, Duration::from_millis(10)).await.unwrap();
        assert!(msgs.is_empty());
        assert_eq!(queue.len("a").await, 1);
    }
}
