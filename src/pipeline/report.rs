//! Report stage: TranscribeDone in, ReportDone out.
//!
//! Fetches the per-track transcripts with partial-success semantics, fuses
//! them into the ensemble transcript, prompts the model with the glossary
//! lexicon injected, validates the returned JSON and persists the report.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::blob::{keys, BlobStore};
use crate::glossary::GlossaryCache;
use crate::llm::{prompts::build_report_prompt, LlmClient};
use crate::messages::{ReportDone, TranscribeDone};
use crate::queue::QueueClient;
use crate::record::{MeetingStage, MeetingStatus, MeetingType, RecordKey};
use crate::report::{assemble, plain_text, render_funasr, schema::normalize_report, truncate_for_prompt};
use crate::store::{RecordPatch, RecordStore};

use super::{mark_failed, Stage, StageOutcome};

const REPORT_MAX_TOKENS: u32 = 16_000;

pub struct ReportStage {
    store: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn QueueClient>,
    llm: Arc<dyn LlmClient>,
    glossary: Arc<GlossaryCache>,
    queue_name: String,
    export_queue: String,
}

impl ReportStage {
    pub fn new(
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        queue: Arc<dyn QueueClient>,
        llm: Arc<dyn LlmClient>,
        glossary: Arc<GlossaryCache>,
        queue_name: impl Into<String>,
        export_queue: impl Into<String>,
    ) -> Self {
        Self {
            store,
            blobs,
            queue,
            llm,
            glossary,
            queue_name: queue_name.into(),
            export_queue: export_queue.into(),
        }
    }

    /// Fetch a plain-text transcript; a fetch failure degrades to `None` so
    /// the surviving source still produces a report. Each fetch starts
    /// inside its own branch, so a failing branch cannot poison its sibling.
    async fn fetch_text(&self, key: Option<&String>, label: &str) -> Option<String> {
        let key = key.filter(|k| !k.is_empty())?;
        match self.blobs.get(key).await {
            Ok(raw) => Some(plain_text(&raw)),
            Err(e) => {
                warn!("Failed to fetch {label} transcript {key}: {e:#}");
                None
            }
        }
    }

    async fn fetch_funasr(&self, key: Option<&String>) -> Option<String> {
        let key = key.filter(|k| !k.is_empty())?;
        match self.blobs.get(key).await {
            Ok(raw) => match render_funasr(&raw) {
                Ok(block) => Some(block),
                Err(e) => {
                    warn!("Failed to render FunASR transcript {key}: {e:#}");
                    None
                }
            },
            Err(e) => {
                warn!("Failed to fetch FunASR transcript {key}: {e:#}");
                None
            }
        }
    }
}

#[async_trait]
impl Stage for ReportStage {
    fn name(&self) -> &'static str {
        "report"
    }

    fn queue(&self) -> &str {
        &self.queue_name
    }

    async fn process(&self, body: &str) -> Result<StageOutcome> {
        let msg: TranscribeDone =
            serde_json::from_str(body).context("malformed TranscribeDone message")?;
        let key = RecordKey::new(msg.meeting_id.clone(), msg.created_at.clone());

        self.store
            .update(
                &key,
                RecordPatch {
                    stage: Some(MeetingStage::Generating),
                    ..Default::default()
                },
            )
            .await
            .context("Failed to mark record as generating")?;

        let record = self
            .store
            .get(&key)
            .await?
            .with_context(|| format!("record not found: {}", msg.meeting_id))?;

        let meeting_type = if msg.meeting_type != MeetingType::General {
            msg.meeting_type
        } else {
            record.meeting_type
        };

        let (transcribe_text, whisper_text, funasr_block) = tokio::join!(
            self.fetch_text(msg.transcribe_key.as_ref(), "transcribe"),
            self.fetch_text(msg.whisper_key.as_ref(), "whisper"),
            self.fetch_funasr(msg.funasr_key.as_ref()),
        );

        let Some(transcript) = assemble(transcribe_text, whisper_text, funasr_block) else {
            bail!("no transcript source available for meeting {}", msg.meeting_id);
        };
        let transcript = truncate_for_prompt(&transcript);

        let terms = self.glossary.terms().await.unwrap_or_else(|e| {
            warn!("Glossary unavailable, prompting without lexicon: {e:#}");
            Vec::new()
        });

        let prompt = build_report_prompt(meeting_type, &transcript, &terms);
        info!(
            "Generating {} report for meeting {} (prompt {} chars, {} glossary terms)",
            meeting_type.as_str(),
            msg.meeting_id,
            prompt.chars().count(),
            terms.len()
        );

        let response = self
            .llm
            .invoke(&prompt, REPORT_MAX_TOKENS)
            .await
            .context("LLM invocation failed")?;

        let report = crate::report::extract_json_object(&response)?;
        let report = normalize_report(meeting_type, report)?;

        let report_key = keys::report(&msg.meeting_id);
        self.blobs
            .put(
                &report_key,
                serde_json::to_vec_pretty(&report)?.as_slice(),
                "application/json",
            )
            .await
            .context("Failed to store report")?;

        self.store
            .update(
                &key,
                RecordPatch {
                    status: Some(MeetingStatus::Reported),
                    stage: Some(MeetingStage::Exporting),
                    report_key: Some(report_key.clone()),
                    ..Default::default()
                },
            )
            .await
            .context("Failed to persist report key")?;

        let meeting_name = if !record.title.is_empty() {
            record.title.clone()
        } else if !record.filename.is_empty() {
            record.filename.clone()
        } else {
            msg.meeting_id.clone()
        };

        let done = ReportDone {
            meeting_id: msg.meeting_id,
            created_at: msg.created_at,
            report_key,
            meeting_name: Some(meeting_name),
        };
        self.queue
            .send(&self.export_queue, &serde_json::to_string(&done)?)
            .await
            .context("Failed to enqueue export message")?;

        Ok(StageOutcome::Completed)
    }

    async fn record_failure(&self, body: &str, error: &anyhow::Error) {
        if let Ok(msg) = serde_json::from_str::<TranscribeDone>(body) {
            let key = RecordKey::new(msg.meeting_id, msg.created_at);
            mark_failed(&self.store, &key, error).await;
        }
    }
}
