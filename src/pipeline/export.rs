//! Export stage: ReportDone in, one delivery email out.
//!
//! Renders the report as a branded HTML body, resolves recipients from the
//! record (custom list with the default in BCC, or the default alone) and
//! marks the job terminal. A job with no resolvable recipient still
//! completes; delivery is the last, optional step.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::blob::BlobStore;
use crate::email::{html::render_report, is_valid_email, EmailMessage, EmailSender};
use crate::messages::ReportDone;
use crate::record::{now_iso_millis, MeetingStage, MeetingStatus, RecordKey};
use crate::store::{RecordPatch, RecordStore};

use super::{mark_failed, Stage, StageOutcome};

pub struct ExportStage {
    store: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    mailer: Arc<dyn EmailSender>,
    queue_name: String,
    from: String,
    default_recipient: String,
}

/// How an email should be addressed, if at all.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Addressing {
    Send { to: Vec<String>, bcc: Vec<String> },
    Nobody,
}

/// Custom recipients win and put the default in BCC; otherwise the default
/// alone; otherwise nobody.
pub(crate) fn resolve_recipients(custom: &[String], default_recipient: &str) -> Addressing {
    let valid: Vec<String> = custom
        .iter()
        .filter(|address| is_valid_email(address))
        .cloned()
        .collect();

    if !valid.is_empty() {
        let bcc = if default_recipient.is_empty() {
            Vec::new()
        } else {
            vec![default_recipient.to_string()]
        };
        return Addressing::Send { to: valid, bcc };
    }

    if !default_recipient.is_empty() {
        return Addressing::Send {
            to: vec![default_recipient.to_string()],
            bcc: Vec::new(),
        };
    }

    Addressing::Nobody
}

impl ExportStage {
    pub fn new(
        store: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
        mailer: Arc<dyn EmailSender>,
        queue_name: impl Into<String>,
        from: impl Into<String>,
        default_recipient: impl Into<String>,
    ) -> Self {
        Self {
            store,
            blobs,
            mailer,
            queue_name: queue_name.into(),
            from: from.into(),
            default_recipient: default_recipient.into(),
        }
    }
}

#[async_trait]
impl Stage for ExportStage {
    fn name(&self) -> &'static str {
        "export"
    }

    fn queue(&self) -> &str {
        &self.queue_name
    }

    async fn process(&self, body: &str) -> Result<StageOutcome> {
        let msg: ReportDone = serde_json::from_str(body).context("malformed ReportDone message")?;
        let key = RecordKey::new(msg.meeting_id.clone(), msg.created_at.clone());

        self.store
            .update(
                &key,
                RecordPatch {
                    stage: Some(MeetingStage::Sending),
                    ..Default::default()
                },
            )
            .await
            .context("Failed to mark record as sending")?;

        let record = self
            .store
            .get(&key)
            .await?
            .with_context(|| format!("record not found: {}", msg.meeting_id))?;

        let raw = self
            .blobs
            .get(&msg.report_key)
            .await
            .with_context(|| format!("Failed to fetch report {}", msg.report_key))?;
        let report: serde_json::Value =
            serde_json::from_slice(&raw).context("stored report is not valid JSON")?;

        let meeting_name = msg
            .meeting_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| {
                if !record.title.is_empty() {
                    record.title.clone()
                } else {
                    record.filename.clone()
                }
            });

        match resolve_recipients(&record.recipient_emails, &self.default_recipient) {
            Addressing::Send { to, bcc } => {
                let email = EmailMessage {
                    from: self.from.clone(),
                    to,
                    bcc,
                    subject: format!("会议纪要 - {meeting_name}"),
                    html_body: render_report(&meeting_name, &report),
                };
                self.mailer
                    .send_html(&email)
                    .await
                    .context("Failed to send report email")?;
                info!("Report email sent for meeting {}", msg.meeting_id);
            }
            Addressing::Nobody => {
                warn!(
                    "No recipients resolvable for meeting {}, skipping delivery",
                    msg.meeting_id
                );
            }
        }

        self.store
            .update(
                &key,
                RecordPatch {
                    status: Some(MeetingStatus::Completed),
                    stage: Some(MeetingStage::Done),
                    exported_at: Some(now_iso_millis()),
                    ..Default::default()
                },
            )
            .await
            .context("Failed to mark record as completed")?;

        Ok(StageOutcome::Completed)
    }

    async fn record_failure(&self, body: &str, error: &anyhow::Error) {
        if let Ok(msg) = serde_json::from_str::<ReportDone>(body) {
            let key = RecordKey::new(msg.meeting_id, msg.created_at);
            mark_failed(&self.store, &key, error).await;
        }
    }
}
