//! Stage controller: the long-lived polling loop shared by all workers.
//!
//! Each worker long-polls its queue, processes messages one at a time inside
//! a bounded isolation scope, deletes on success or skip, and leaves failed
//! messages for visibility-timeout redelivery. An error in one message never
//! aborts the batch or the loop.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::queue::QueueClient;
use crate::record::{MeetingStage, MeetingStatus, RecordKey};
use crate::store::{RecordPatch, RecordStore};

pub mod export;
pub mod report;
pub mod retry;
pub mod transcription;

pub use export::ExportStage;
pub use report::ReportStage;
pub use retry::{RetryError, RetryService};
pub use transcription::TranscriptionStage;

const RECEIVE_MAX: usize = 1;
const RECEIVE_WAIT: Duration = Duration::from_secs(20);
const IDLE_SLEEP: Duration = Duration::from_secs(5);

/// How a stage disposed of one message.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// The stage ran to completion; delete the message.
    Completed,
    /// Nothing to do (validation skip, duplicate); delete the message.
    Skipped(String),
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Queue this stage consumes.
    fn queue(&self) -> &str;

    async fn process(&self, body: &str) -> Result<StageOutcome>;

    /// Best-effort failure bookkeeping after `process` errored. Must never
    /// propagate its own failure.
    async fn record_failure(&self, body: &str, error: &anyhow::Error);
}

/// Receive and process one batch. Returns the number of messages received.
/// Failed messages are intentionally not deleted.
pub async fn poll_once(queue: &Arc<dyn QueueClient>, stage: &Arc<dyn Stage>) -> Result<usize> {
    let messages = queue.receive(stage.queue(), RECEIVE_MAX, RECEIVE_WAIT).await?;
    let count = messages.len();
    process_batch(queue, stage, messages).await;
    Ok(count)
}

async fn process_batch(
    queue: &Arc<dyn QueueClient>,
    stage: &Arc<dyn Stage>,
    messages: Vec<crate::queue::ReceivedMessage>,
) {
    for message in messages {
        match stage.process(&message.body).await {
            Ok(StageOutcome::Completed) => {
                if let Err(e) = queue.delete(stage.queue(), &message.receipt_handle).await {
                    warn!("[{}] failed to delete completed message: {e:#}", stage.name());
                }
            }
            Ok(StageOutcome::Skipped(reason)) => {
                info!("[{}] skipping message: {reason}", stage.name());
                if let Err(e) = queue.delete(stage.queue(), &message.receipt_handle).await {
                    warn!("[{}] failed to delete skipped message: {e:#}", stage.name());
                }
            }
            Err(e) => {
                error!("[{}] message processing failed: {e:#}", stage.name());
                stage.record_failure(&message.body, &e).await;
                // Not deleted: the visibility timeout redelivers it.
            }
        }
    }
}

/// Run a stage worker until the shutdown token fires. The current message is
/// always finished before exiting.
pub async fn run_stage(
    queue: Arc<dyn QueueClient>,
    stage: Arc<dyn Stage>,
    shutdown: CancellationToken,
) {
    info!("[{}] worker started on queue '{}'", stage.name(), stage.queue());

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        // Shutdown only interrupts the receive, never a message in flight.
        let received = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = queue.receive(stage.queue(), RECEIVE_MAX, RECEIVE_WAIT) => result,
        };

        match received {
            Ok(messages) if messages.is_empty() => {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(IDLE_SLEEP) => {}
                }
            }
            Ok(messages) => {
                process_batch(&queue, &stage, messages).await;
            }
            Err(e) => {
                error!("[{}] queue receive failed: {e:#}", stage.name());
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sleep(IDLE_SLEEP) => {}
                }
            }
        }
    }

    info!("[{}] worker stopped", stage.name());
}

/// Best-effort `failed` write used by the stages' failure handlers.
/// A secondary failure here is logged and swallowed; the worker loop
/// continues unconditionally.
pub(crate) async fn mark_failed(
    store: &Arc<dyn RecordStore>,
    key: &RecordKey,
    error: &anyhow::Error,
) {
    let patch = RecordPatch {
        status: Some(MeetingStatus::Failed),
        stage: Some(MeetingStage::Failed),
        error_message: Some(format!("{error:#}")),
        ..Default::default()
    };
    if let Err(e) = store.update(key, patch).await {
        warn!(
            "Failed to mark {}/{} as failed: {e:#}",
            key.meeting_id, key.created_at
        );
    }
}
