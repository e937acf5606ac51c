//! FunASR track over HTTP.
//!
//! Same shape as the Whisper track, with a language hint in the request.
//! When enabled this is the sole source of speaker-labelled segments.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::blob::{keys, BlobStore};

use super::{AsrTrack, TrackKind};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const ASR_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub struct FunAsrTrack {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    language: String,
    blobs: Arc<dyn BlobStore>,
}

impl FunAsrTrack {
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            language: "auto".to_string(),
            blobs,
        }
    }

    async fn is_healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("FunASR health probe failed: {e}");
                false
            }
        }
    }
}

#[async_trait]
impl AsrTrack for FunAsrTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::FunAsr
    }

    async fn run(&self, meeting_id: &str, s3_key: &str) -> Result<Option<String>> {
        if !self.is_healthy().await {
            warn!("FunASR server down, skipping track for {meeting_id}");
            return Ok(None);
        }

        let url = format!("{}/asr", self.base_url);
        info!("Submitting {s3_key} to FunASR at {url}");

        let response = self
            .client
            .post(&url)
            .timeout(ASR_TIMEOUT)
            .form(&[
                ("s3_key", s3_key),
                ("s3_bucket", self.bucket.as_str()),
                ("language", self.language.as_str()),
            ])
            .send()
            .await
            .context("FunASR request failed")?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .context("Failed to read FunASR response body")?;

        if !status.is_success() {
            anyhow::bail!(
                "FunASR returned status {}: {}",
                status,
                String::from_utf8_lossy(&body)
            );
        }

        let key = keys::funasr_transcript(meeting_id);
        self.blobs
            .put(&key, &body, "application/json")
            .await
            .context("Failed to store FunASR transcript")?;

        info!("FunASR transcript stored at {key} ({} bytes)", body.len());
        Ok(Some(key))
    }
}
