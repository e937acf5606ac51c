//! Record store port: the single source of truth for meeting jobs.
//!
//! Composite primary key `(meeting_id, created_at)`, secondary access path
//! on `(status, created_at)` for dedup and listing. Every mutation is either
//! an idempotent merge (`update`) or a conditional update (`update_if_status`)
//! guarding the retry contract.

use anyhow::Result;
use async_trait::async_trait;

use crate::record::{now_iso_millis, GlossaryTerm, MeetingRecord, MeetingStage, MeetingStatus, RecordKey};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A partial update applied to an existing record. Unset fields are left
/// untouched; `updated_at` is always stamped by the store.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub status: Option<MeetingStatus>,
    pub stage: Option<MeetingStage>,
    pub transcribe_key: Option<String>,
    pub whisper_key: Option<String>,
    pub funasr_key: Option<String>,
    pub report_key: Option<String>,
    pub pdf_key: Option<String>,
    pub error_message: Option<String>,
    /// Remove the error message (the retry path clears it).
    pub clear_error: bool,
    pub exported_at: Option<String>,
}

impl RecordPatch {
    /// Apply this patch in place. `updated_at` is stamped with the current
    /// instant; `created_at` is never touched.
    pub fn apply(&self, record: &mut MeetingRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(stage) = self.stage {
            record.stage = stage;
        }
        if let Some(key) = &self.transcribe_key {
            record.transcribe_key = key.clone();
        }
        if let Some(key) = &self.whisper_key {
            record.whisper_key = key.clone();
        }
        if let Some(key) = &self.funasr_key {
            record.funasr_key = key.clone();
        }
        if let Some(key) = &self.report_key {
            record.report_key = key.clone();
        }
        if let Some(key) = &self.pdf_key {
            record.pdf_key = key.clone();
        }
        if self.clear_error {
            record.error_message = None;
        } else if let Some(message) = &self.error_message {
            record.error_message = Some(message.clone());
        }
        if let Some(at) = &self.exported_at {
            record.exported_at = Some(at.clone());
        }
        record.updated_at = now_iso_millis();
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &RecordKey) -> Result<Option<MeetingRecord>>;

    /// Unconditional put; overwrites any existing record with the same key.
    async fn put(&self, record: &MeetingRecord) -> Result<()>;

    /// Merge a patch into an existing record. Missing record is an error.
    async fn update(&self, key: &RecordKey, patch: RecordPatch) -> Result<()>;

    /// Merge a patch only while the record's status equals `expected`.
    /// Returns `Ok(false)` when the condition does not hold (or the record
    /// is missing); the caller decides whether that is a conflict.
    async fn update_if_status(
        &self,
        key: &RecordKey,
        expected: MeetingStatus,
        patch: RecordPatch,
    ) -> Result<bool>;

    /// Query the `(status, created_at)` access path, optionally filtered on
    /// `s3_key` equality. Results ordered by `created_at` ascending.
    async fn find_by_status(
        &self,
        status: MeetingStatus,
        s3_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MeetingRecord>>;

    /// Most recent record for a meeting id, across all statuses.
    async fn find_latest(&self, meeting_id: &str) -> Result<Option<MeetingRecord>>;
}

/// Glossary terms, read-only from the pipeline. Implementations page
/// through the underlying table internally and return the full set.
#[async_trait]
pub trait GlossaryStore: Send + Sync {
    async fn list_terms(&self) -> Result<Vec<GlossaryTerm>>;
}
