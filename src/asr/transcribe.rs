//! Managed batch-transcription track.
//!
//! Submits a job to the managed service and polls for completion every ten
//! seconds, bounded at 30 minutes of wall clock. The service writes its own
//! output object; the poll result carries the output key.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::{AsrTrack, TrackKind};

const POLL_INTERVAL: Duration = Duration::from_secs(10);
const MAX_POLL_ATTEMPTS: u32 = 180;

/// State of a managed transcription job.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscribeJobState {
    InProgress,
    Completed { output_key: String },
    Failed { reason: String },
}

/// Contract of the managed batch-ASR service. The concrete cloud wrapper is
/// an external collaborator; the pipeline only needs start-and-poll.
#[async_trait]
pub trait TranscribeJobClient: Send + Sync {
    async fn start(
        &self,
        job_name: &str,
        media_uri: &str,
        language_code: &str,
        vocabulary_name: Option<&str>,
    ) -> Result<()>;

    async fn get(&self, job_name: &str) -> Result<TranscribeJobState>;
}

pub struct TranscribeTrack {
    client: Arc<dyn TranscribeJobClient>,
    bucket: String,
    language_code: String,
    vocabulary_name: Option<String>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl TranscribeTrack {
    pub fn new(client: Arc<dyn TranscribeJobClient>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            language_code: "zh-CN".to_string(),
            vocabulary_name: None,
            poll_interval: POLL_INTERVAL,
            max_attempts: MAX_POLL_ATTEMPTS,
        }
    }

    pub fn with_vocabulary(mut self, vocabulary_name: Option<String>) -> Self {
        self.vocabulary_name = vocabulary_name;
        self
    }

    #[cfg(test)]
    pub fn with_poll(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_attempts = max_attempts;
        self
    }
}

#[async_trait]
impl AsrTrack for TranscribeTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Transcribe
    }

    async fn run(&self, meeting_id: &str, s3_key: &str) -> Result<Option<String>> {
        let job_name = format!("{meeting_id}-transcribe");
        let media_uri = format!("s3://{}/{}", self.bucket, s3_key);

        info!("Starting transcribe job {job_name} for {media_uri}");
        self.client
            .start(
                &job_name,
                &media_uri,
                &self.language_code,
                self.vocabulary_name.as_deref(),
            )
            .await?;

        for attempt in 1..=self.max_attempts {
            match self.client.get(&job_name).await? {
                TranscribeJobState::Completed { output_key } => {
                    info!("Transcribe job {job_name} completed: {output_key}");
                    return Ok(Some(output_key));
                }
                TranscribeJobState::Failed { reason } => {
                    bail!("transcribe job {job_name} failed: {reason}");
                }
                TranscribeJobState::InProgress => {
                    if attempt % 30 == 0 {
                        warn!(
                            "Transcribe job {job_name} still running after {}s",
                            attempt as u64 * self.poll_interval.as_secs()
                        );
                    }
                    sleep(self.poll_interval).await;
                }
            }
        }

        bail!(
            "transcribe job {job_name} timed out after {} attempts",
            self.max_attempts
        );
    }
}
