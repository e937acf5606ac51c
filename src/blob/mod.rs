//! Blob port and the pipeline's key layout.
//!
//! ```text
//! <prefix>/inbox/<meetingId>/<filename>
//! <prefix>/transcripts/<meetingId>/{transcribe,whisper,funasr}.json
//! <prefix>/reports/<meetingId>/report.json
//! <prefix>/exports/<meetingId>/report.pdf
//! ```

use anyhow::Result;
use async_trait::async_trait;

pub mod fs;
pub mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Store bytes; returns the absolute key including the configured prefix.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String>;
}

/// Blob key helpers; the single place the layout is spelled out.
pub mod keys {
    pub fn inbox(meeting_id: &str, filename: &str) -> String {
        format!("inbox/{meeting_id}/{filename}")
    }

    pub fn transcribe_transcript(meeting_id: &str) -> String {
        format!("transcripts/{meeting_id}/transcribe.json")
    }

    pub fn whisper_transcript(meeting_id: &str) -> String {
        format!("transcripts/{meeting_id}/whisper.json")
    }

    pub fn funasr_transcript(meeting_id: &str) -> String {
        format!("transcripts/{meeting_id}/funasr.json")
    }

    pub fn report(meeting_id: &str) -> String {
        format!("reports/{meeting_id}/report.json")
    }

    pub fn export_pdf(meeting_id: &str) -> String {
        format!("exports/{meeting_id}/report.pdf")
    }
}

/// Join a configured prefix with a layout key.
pub fn prefixed(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), key)
    }
}
