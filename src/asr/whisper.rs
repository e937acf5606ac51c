//! Whisper ASR track over HTTP.
//!
//! Health-probes the server before submitting; an unreachable server skips
//! the track rather than failing the job. The transcription POST is bounded
//! at 30 minutes and aborted when the bound is hit.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::blob::{keys, BlobStore};

use super::{AsrTrack, TrackKind};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const ASR_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub struct WhisperTrack {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    blobs: Arc<dyn BlobStore>,
}

impl WhisperTrack {
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            blobs,
        }
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Whisper health probe failed: {e}");
                false
            }
        }
    }
}

#[async_trait]
impl AsrTrack for WhisperTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Whisper
    }

    async fn run(&self, meeting_id: &str, s3_key: &str) -> Result<Option<String>> {
        if !self.is_healthy().await {
            warn!("Whisper server down, skipping track for {meeting_id}");
            return Ok(None);
        }

        let url = format!("{}/asr", self.base_url);
        info!("Submitting {s3_key} to Whisper at {url}");

        // The per-request timeout aborts the in-flight request at the bound.
        let response = self
            .client
            .post(&url)
            .timeout(ASR_TIMEOUT)
            .form(&[("s3_key", s3_key), ("s3_bucket", self.bucket.as_str())])
            .send()
            .await
            .context("Whisper request failed")?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .context("Failed to read Whisper response body")?;

        if !status.is_success() {
            anyhow::bail!(
                "Whisper returned status {}: {}",
                status,
                String::from_utf8_lossy(&body)
            );
        }

        let key = keys::whisper_transcript(meeting_id);
        self.blobs
            .put(&key, &body, "application/json")
            .await
            .context("Failed to store Whisper transcript")?;

        info!("Whisper transcript stored at {key} ({} bytes)", body.len());
        Ok(Some(key))
    }
}
