//! Transcription stage: NewJob in, TranscribeDone out.
//!
//! Deduplicates external notifications by blob key, fans out to the enabled
//! ASR tracks in parallel with per-track error capture, persists per-track
//! transcript keys and hands the job to the report stage.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::asr::{AsrTrack, TrackKind};
use crate::messages::{parse_new_job, NewJob, ParsedNewJob, TranscribeDone};
use crate::queue::QueueClient;
use crate::record::{
    now_iso_millis, MeetingRecord, MeetingStage, MeetingStatus, MeetingType, RecordKey,
};
use crate::store::{RecordPatch, RecordStore};

use super::{mark_failed, Stage, StageOutcome};

/// Statuses consulted for dedup. A blob key already owned by a live or
/// finished job means the notification is a redelivery.
const DEDUP_STATUSES: [MeetingStatus; 4] = [
    MeetingStatus::Pending,
    MeetingStatus::Processing,
    MeetingStatus::Reported,
    MeetingStatus::Completed,
];

pub struct TranscriptionStage {
    store: Arc<dyn RecordStore>,
    queue: Arc<dyn QueueClient>,
    tracks: Vec<Arc<dyn AsrTrack>>,
    queue_name: String,
    report_queue: String,
}

impl TranscriptionStage {
    pub fn new(
        store: Arc<dyn RecordStore>,
        queue: Arc<dyn QueueClient>,
        tracks: Vec<Arc<dyn AsrTrack>>,
        queue_name: impl Into<String>,
        report_queue: impl Into<String>,
    ) -> Self {
        Self {
            store,
            queue,
            tracks,
            queue_name: queue_name.into(),
            report_queue: report_queue.into(),
        }
    }

    /// True when another record already owns this blob key.
    async fn is_duplicate(&self, s3_key: &str) -> Result<bool> {
        for status in DEDUP_STATUSES {
            let hits = self.store.find_by_status(status, Some(s3_key), 1).await?;
            if !hits.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Resolve the job's `createdAt` once; every subsequent write and the
    /// outbound message reuse this value.
    async fn resolve_created_at(&self, job: &NewJob) -> Result<String> {
        if let Some(created_at) = &job.created_at {
            return Ok(created_at.clone());
        }
        if let Some(record) = self.store.find_latest(&job.meeting_id).await? {
            return Ok(record.created_at);
        }
        Ok(now_iso_millis())
    }

    /// Meeting type precedence: a specific message value wins, then the
    /// record, then general.
    async fn resolve_meeting_type(&self, job: &NewJob, key: &RecordKey) -> MeetingType {
        if job.meeting_type != MeetingType::General {
            return job.meeting_type;
        }
        match self.store.get(key).await {
            Ok(Some(record)) => record.meeting_type,
            _ => MeetingType::General,
        }
    }

    async fn run_tracks(&self, meeting_id: &str, s3_key: &str) -> Vec<(TrackKind, Option<String>)> {
        let runs = self.tracks.iter().map(|track| {
            let track = track.clone();
            let meeting_id = meeting_id.to_string();
            let s3_key = s3_key.to_string();
            async move {
                let kind = track.kind();
                let result = track.run(&meeting_id, &s3_key).await;
                (kind, result)
            }
        });

        let mut keys = Vec::new();
        for (kind, result) in futures::future::join_all(runs).await {
            match result {
                Ok(Some(key)) => {
                    info!("Track {} produced transcript {key}", kind.as_str());
                    keys.push((kind, Some(key)));
                }
                Ok(None) => {
                    info!("Track {} skipped (backend unavailable)", kind.as_str());
                    keys.push((kind, None));
                }
                Err(e) => {
                    warn!("Track {} failed: {e:#}", kind.as_str());
                    keys.push((kind, None));
                }
            }
        }
        keys
    }
}

#[async_trait]
impl Stage for TranscriptionStage {
    fn name(&self) -> &'static str {
        "transcription"
    }

    fn queue(&self) -> &str {
        &self.queue_name
    }

    async fn process(&self, body: &str) -> Result<StageOutcome> {
        let (job, external) = match parse_new_job(body)? {
            ParsedNewJob::Skip(reason) => return Ok(StageOutcome::Skipped(reason.to_string())),
            ParsedNewJob::Internal(job) => (job, false),
            ParsedNewJob::External(job) => (job, true),
        };

        if external && self.is_duplicate(&job.s3_key).await? {
            return Ok(StageOutcome::Skipped(format!(
                "blob {} already owned by another record",
                job.s3_key
            )));
        }

        let created_at = self.resolve_created_at(&job).await?;
        let key = RecordKey::new(job.meeting_id.clone(), created_at.clone());

        if external {
            let record = MeetingRecord::new_pending(
                job.meeting_id.as_str(),
                created_at.as_str(),
                "",
                job.filename.as_str(),
                job.meeting_type,
                job.s3_key.as_str(),
            );
            self.store
                .put(&record)
                .await
                .context("Failed to create record for external notification")?;
        }

        self.store
            .update(
                &key,
                RecordPatch {
                    status: Some(MeetingStatus::Processing),
                    stage: Some(MeetingStage::Transcribing),
                    ..Default::default()
                },
            )
            .await
            .context("Failed to mark record as processing")?;

        info!(
            "Transcribing meeting {} ({} track(s))",
            job.meeting_id,
            self.tracks.len()
        );

        let results = self.run_tracks(&job.meeting_id, &job.s3_key).await;

        let mut transcribe_key: Option<String> = None;
        let mut whisper_key: Option<String> = None;
        let mut funasr_key: Option<String> = None;
        for (kind, track_key) in results {
            match kind {
                TrackKind::Transcribe => transcribe_key = track_key,
                TrackKind::Whisper => whisper_key = track_key,
                TrackKind::FunAsr => funasr_key = track_key,
            }
        }

        if transcribe_key.is_none() && whisper_key.is_none() && funasr_key.is_none() {
            bail!("all enabled ASR tracks failed for meeting {}", job.meeting_id);
        }

        // Record first, message second: a redelivered message must observe
        // the advanced record.
        self.store
            .update(
                &key,
                RecordPatch {
                    status: Some(MeetingStatus::Transcribed),
                    stage: Some(MeetingStage::Reporting),
                    transcribe_key: Some(transcribe_key.clone().unwrap_or_default()),
                    whisper_key: Some(whisper_key.clone().unwrap_or_default()),
                    funasr_key: Some(funasr_key.clone().unwrap_or_default()),
                    ..Default::default()
                },
            )
            .await
            .context("Failed to persist transcript keys")?;

        let meeting_type = self.resolve_meeting_type(&job, &key).await;

        let done = TranscribeDone {
            meeting_id: job.meeting_id.clone(),
            created_at,
            transcribe_key,
            whisper_key,
            funasr_key,
            meeting_type,
        };
        self.queue
            .send(&self.report_queue, &serde_json::to_string(&done)?)
            .await
            .context("Failed to enqueue report message")?;

        Ok(StageOutcome::Completed)
    }

    async fn record_failure(&self, body: &str, error: &anyhow::Error) {
        // Internal messages carry enough identity to address the record
        // directly; external ones are located through the blob key.
        let Ok(parsed) = parse_new_job(body) else {
            return;
        };
        match parsed {
            ParsedNewJob::Internal(job) => {
                let created_at = match &job.created_at {
                    Some(created_at) => created_at.clone(),
                    None => match self.store.find_latest(&job.meeting_id).await {
                        Ok(Some(record)) => record.created_at,
                        _ => return,
                    },
                };
                let key = RecordKey::new(job.meeting_id, created_at);
                mark_failed(&self.store, &key, error).await;
            }
            ParsedNewJob::External(job) => {
                for status in [MeetingStatus::Pending, MeetingStatus::Processing] {
                    if let Ok(hits) = self.store.find_by_status(status, Some(&job.s3_key), 1).await
                    {
                        if let Some(record) = hits.into_iter().next() {
                            mark_failed(&self.store, &record.key(), error).await;
                            return;
                        }
                    }
                }
            }
            ParsedNewJob::Skip(_) => {}
        }
    }
}
