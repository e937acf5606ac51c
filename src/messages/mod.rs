//! Queue message shapes, one per stage boundary.
//!
//! Three JSON shapes travel between the workers: `NewJob` on the
//! transcription queue, `TranscribeDone` on the report queue and `ReportDone`
//! on the export queue. `NewJob` additionally accepts the bucket-notification
//! envelope produced when media lands in the inbox without going through the
//! upload endpoint.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::record::{synthesize_meeting_id, MeetingType};

/// Message consumed by the transcription stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub meeting_id: String,
    pub s3_key: String,
    pub filename: String,
    pub meeting_type: MeetingType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Message consumed by the report stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeDone {
    pub meeting_id: String,
    pub created_at: String,
    #[serde(default)]
    pub transcribe_key: Option<String>,
    #[serde(default)]
    pub whisper_key: Option<String>,
    #[serde(default)]
    pub funasr_key: Option<String>,
    pub meeting_type: MeetingType,
}

/// Message consumed by the export stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDone {
    pub meeting_id: String,
    pub created_at: String,
    pub report_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_name: Option<String>,
}

/// Outcome of parsing a transcription-queue message body.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedNewJob {
    /// An internal message from the upload collaborator or the retry path.
    Internal(NewJob),
    /// A bucket notification; the record does not exist yet and the job
    /// identity was synthesized from the object key.
    External(NewJob),
    /// Nothing to do for this message (placeholder object, missing key).
    /// The message should be deleted without further work.
    Skip(&'static str),
}

#[derive(Debug, Deserialize)]
struct BucketNotification {
    #[serde(rename = "Records")]
    records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    s3: NotificationS3,
}

#[derive(Debug, Deserialize)]
struct NotificationS3 {
    object: NotificationObject,
}

#[derive(Debug, Deserialize)]
struct NotificationObject {
    key: String,
}

/// Parse a transcription-queue message body.
///
/// Internal messages carry `meetingId` directly. External bucket
/// notifications synthesize `meetingId = meeting-<epoch-ms>` and derive the
/// meeting type from the filename prefix. Messages without a usable object
/// key, or pointing at `.keep` placeholders, are skipped.
pub fn parse_new_job(body: &str) -> Result<ParsedNewJob> {
    let value: serde_json::Value =
        serde_json::from_str(body).context("transcription message is not valid JSON")?;

    if value.get("meetingId").is_some() {
        let job: NewJob =
            serde_json::from_value(value).context("malformed internal NewJob message")?;
        if job.s3_key.is_empty() {
            return Ok(ParsedNewJob::Skip("missing s3Key"));
        }
        if job.s3_key.ends_with(".keep") {
            return Ok(ParsedNewJob::Skip("placeholder .keep object"));
        }
        return Ok(ParsedNewJob::Internal(job));
    }

    let notification: BucketNotification =
        serde_json::from_value(value).context("message is neither NewJob nor bucket notification")?;
    let Some(record) = notification.records.into_iter().next() else {
        return Ok(ParsedNewJob::Skip("notification without records"));
    };

    let s3_key = record.s3.object.key;
    if s3_key.is_empty() {
        return Ok(ParsedNewJob::Skip("missing s3Key"));
    }
    if s3_key.ends_with(".keep") {
        return Ok(ParsedNewJob::Skip("placeholder .keep object"));
    }

    let filename = s3_key.rsplit('/').next().unwrap_or(&s3_key).to_string();
    let meeting_type = MeetingType::from_filename(&filename);

    Ok(ParsedNewJob::External(NewJob {
        meeting_id: synthesize_meeting_id(),
        s3_key,
        filename,
        meeting_type,
        created_at: None,
    }))
}
