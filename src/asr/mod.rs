//! ASR tracks: the up-to-three speech-recognition back-ends a job fans out to.
//!
//! Each track is independently failable. `Ok(Some(key))` means a transcript
//! blob exists at `key`; `Ok(None)` means the backend was unavailable and the
//! track was skipped; `Err` means the track ran and failed. One track's error
//! never cancels its siblings; the fan-out captures results per track.

use anyhow::Result;
use async_trait::async_trait;

pub mod funasr;
pub mod transcribe;
pub mod whisper;

pub use funasr::FunAsrTrack;
pub use transcribe::{TranscribeJobClient, TranscribeJobState, TranscribeTrack};
pub use whisper::WhisperTrack;

/// Which record field a track's transcript key lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Transcribe,
    Whisper,
    FunAsr,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transcribe => "transcribe",
            Self::Whisper => "whisper",
            Self::FunAsr => "funasr",
        }
    }
}

#[async_trait]
pub trait AsrTrack: Send + Sync {
    fn kind(&self) -> TrackKind;

    /// Run recognition for one job and return the transcript blob key.
    async fn run(&self, meeting_id: &str, s3_key: &str) -> Result<Option<String>>;
}
