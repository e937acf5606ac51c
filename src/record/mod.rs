//! Meeting record types: the durable state of a single pipeline job.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Coarse lifecycle state of a meeting job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Created,
    Pending,
    Processing,
    Transcribed,
    Reported,
    Completed,
    Failed,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Transcribed => "transcribed",
            Self::Reported => "reported",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "transcribed" => Some(Self::Transcribed),
            "reported" => Some(Self::Reported),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Fine-grained progress label surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStage {
    Transcribing,
    Reporting,
    Generating,
    Exporting,
    Sending,
    Done,
    Failed,
}

impl MeetingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcribing => "transcribing",
            Self::Reporting => "reporting",
            Self::Generating => "generating",
            Self::Exporting => "exporting",
            Self::Sending => "sending",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "transcribing" => Some(Self::Transcribing),
            "reporting" => Some(Self::Reporting),
            "generating" => Some(Self::Generating),
            "exporting" => Some(Self::Exporting),
            "sending" => Some(Self::Sending),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Kind of meeting, selects the report prompt and schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingType {
    #[default]
    General,
    Weekly,
    Tech,
    Customer,
}

impl MeetingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Weekly => "weekly",
            Self::Tech => "tech",
            Self::Customer => "customer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general" => Some(Self::General),
            "weekly" => Some(Self::Weekly),
            "tech" => Some(Self::Tech),
            "customer" => Some(Self::Customer),
            _ => None,
        }
    }

    /// Derive a meeting type from an uploaded filename prefix.
    /// `weekly__notes.mp4` → weekly, `tech__sync.mp4` → tech, else general.
    pub fn from_filename(filename: &str) -> Self {
        if filename.starts_with("weekly__") {
            Self::Weekly
        } else if filename.starts_with("tech__") {
            Self::Tech
        } else {
            Self::General
        }
    }
}

/// Composite primary key of a meeting record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub meeting_id: String,
    pub created_at: String,
}

impl RecordKey {
    pub fn new(meeting_id: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            created_at: created_at.into(),
        }
    }
}

/// The durable record of a single meeting job.
///
/// `created_at` is set exactly once at creation and propagated through every
/// queue message that references the record; no stage derives its own value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingRecord {
    pub meeting_id: String,
    pub created_at: String,
    pub status: MeetingStatus,
    pub stage: MeetingStage,
    pub title: String,
    pub filename: String,
    pub meeting_type: MeetingType,
    pub s3_key: String,
    #[serde(default)]
    pub transcribe_key: String,
    #[serde(default)]
    pub whisper_key: String,
    #[serde(default)]
    pub funasr_key: String,
    #[serde(default)]
    pub report_key: String,
    #[serde(default)]
    pub pdf_key: String,
    #[serde(default)]
    pub recipient_emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<String>,
}

impl MeetingRecord {
    /// A fresh record as the upload collaborator (or the external-notification
    /// path) creates it: `status=pending, stage=transcribing`.
    pub fn new_pending(
        meeting_id: impl Into<String>,
        created_at: impl Into<String>,
        title: impl Into<String>,
        filename: impl Into<String>,
        meeting_type: MeetingType,
        s3_key: impl Into<String>,
    ) -> Self {
        let created_at = created_at.into();
        Self {
            meeting_id: meeting_id.into(),
            created_at: created_at.clone(),
            status: MeetingStatus::Pending,
            stage: MeetingStage::Transcribing,
            title: title.into(),
            filename: filename.into(),
            meeting_type,
            s3_key: s3_key.into(),
            transcribe_key: String::new(),
            whisper_key: String::new(),
            funasr_key: String::new(),
            report_key: String::new(),
            pdf_key: String::new(),
            recipient_emails: Vec::new(),
            error_message: None,
            updated_at: created_at,
            exported_at: None,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.meeting_id.clone(), self.created_at.clone())
    }
}

/// A glossary term injected into report prompts to stabilize spelling.
/// Read-only from the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryTerm {
    pub term_id: String,
    pub term: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub definition: String,
    pub created_at: String,
}

/// Current instant as an ISO-8601 UTC string with millisecond precision.
/// Lexically sortable; the canonical `createdAt`/`updatedAt` format.
pub fn now_iso_millis() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Synthesize a meeting id for an external bucket notification.
pub fn synthesize_meeting_id() -> String {
    format!("meeting-{}", Utc::now().timestamp_millis())
}
