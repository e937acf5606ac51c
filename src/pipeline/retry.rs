//! Retry contract: the entry point exposed to the HTTP collaborator.
//!
//! Flips a failed record back to `processing/transcribing` under a
//! conditional update (losing a concurrent race is a conflict), then
//! re-enqueues the job on the transcription queue. An enqueue failure
//! best-effort reverts the record.

use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::messages::NewJob;
use crate::queue::QueueClient;
use crate::record::{MeetingStage, MeetingStatus};
use crate::store::{RecordPatch, RecordStore};

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("meeting not found: {0}")]
    NotFound(String),
    #[error("meeting {0} is not in a failed state")]
    NotFailed(String),
    #[error("meeting {0} is already being retried")]
    Conflict(String),
    #[error("failed to re-enqueue meeting {0}")]
    Enqueue(String, #[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct RetryService {
    store: Arc<dyn RecordStore>,
    queue: Arc<dyn QueueClient>,
    transcription_queue: String,
}

impl RetryService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        queue: Arc<dyn QueueClient>,
        transcription_queue: impl Into<String>,
    ) -> Self {
        Self {
            store,
            queue,
            transcription_queue: transcription_queue.into(),
        }
    }

    pub async fn retry(&self, meeting_id: &str) -> Result<(), RetryError> {
        let record = self
            .store
            .find_latest(meeting_id)
            .await?
            .ok_or_else(|| RetryError::NotFound(meeting_id.to_string()))?;

        if record.status != MeetingStatus::Failed {
            return Err(RetryError::NotFailed(meeting_id.to_string()));
        }

        let reset = RecordPatch {
            status: Some(MeetingStatus::Processing),
            stage: Some(MeetingStage::Transcribing),
            clear_error: true,
            ..Default::default()
        };
        let applied = self
            .store
            .update_if_status(&record.key(), MeetingStatus::Failed, reset)
            .await?;
        if !applied {
            return Err(RetryError::Conflict(meeting_id.to_string()));
        }

        let job = NewJob {
            meeting_id: record.meeting_id.clone(),
            s3_key: record.s3_key.clone(),
            filename: record.filename.clone(),
            meeting_type: record.meeting_type,
            created_at: Some(record.created_at.clone()),
        };
        let body = serde_json::to_string(&job).map_err(anyhow::Error::from)?;

        if let Err(e) = self.queue.send(&self.transcription_queue, &body).await {
            error!("Re-enqueue failed for meeting {meeting_id}: {e:#}");
            let revert = RecordPatch {
                status: Some(MeetingStatus::Failed),
                stage: Some(MeetingStage::Failed),
                error_message: Some(format!("SQS 入队失败: {e:#}")),
                ..Default::default()
            };
            if let Err(revert_err) = self.store.update(&record.key(), revert).await {
                error!("Failed to revert record after enqueue failure: {revert_err:#}");
            }
            return Err(RetryError::Enqueue(meeting_id.to_string(), e));
        }

        info!("Meeting {meeting_id} re-enqueued for transcription");
        Ok(())
    }
}
