//! Shared harness for cross-stage scenario tests: in-memory ports plus
//! scripted ASR tracks and LLM responses.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use minutecast::asr::{AsrTrack, TrackKind};
use minutecast::blob::{BlobStore, MemoryBlobStore};
use minutecast::email::MemoryMailer;
use minutecast::glossary::GlossaryCache;
use minutecast::llm::LlmClient;
use minutecast::pipeline::{
    poll_once, ExportStage, ReportStage, RetryService, Stage, TranscriptionStage,
};
use minutecast::queue::{MemoryQueue, QueueClient};
use minutecast::store::MemoryStore;

pub const TRANSCRIPTION_QUEUE: &str = "transcription";
pub const REPORT_QUEUE: &str = "report";
pub const EXPORT_QUEUE: &str = "export";

/// An LLM whose responses are scripted per invocation; `Err` entries make
/// the invocation fail like a transport error would.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
        })
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn invoke(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted response left".to_string()));
        next.map_err(|e| anyhow::anyhow!(e))
    }
}

/// A track that stores a fixed payload at its transcript key, the way the
/// real HTTP tracks store the server response.
pub struct BlobWritingTrack {
    kind: TrackKind,
    blobs: Arc<MemoryBlobStore>,
    payload: Vec<u8>,
}

impl BlobWritingTrack {
    pub fn new(kind: TrackKind, blobs: Arc<MemoryBlobStore>, payload: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            kind,
            blobs,
            payload: payload.to_vec(),
        })
    }
}

#[async_trait]
impl AsrTrack for BlobWritingTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    async fn run(&self, meeting_id: &str, _s3_key: &str) -> Result<Option<String>> {
        let key = match self.kind {
            TrackKind::Transcribe => minutecast::blob::keys::transcribe_transcript(meeting_id),
            TrackKind::Whisper => minutecast::blob::keys::whisper_transcript(meeting_id),
            TrackKind::FunAsr => minutecast::blob::keys::funasr_transcript(meeting_id),
        };
        self.blobs
            .put(&key, &self.payload, "application/json")
            .await?;
        Ok(Some(key))
    }
}

/// A track whose backend always fails.
pub struct FailingTrack(pub TrackKind);

#[async_trait]
impl AsrTrack for FailingTrack {
    fn kind(&self) -> TrackKind {
        self.0
    }

    async fn run(&self, _meeting_id: &str, _s3_key: &str) -> Result<Option<String>> {
        anyhow::bail!("backend reported FAILED")
    }
}

pub struct TestPipeline {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub queue: Arc<MemoryQueue>,
    pub mailer: Arc<MemoryMailer>,
    pub transcription: Arc<dyn Stage>,
    pub report: Arc<dyn Stage>,
    pub export: Arc<dyn Stage>,
    pub retry: RetryService,
}

impl TestPipeline {
    /// Build a pipeline; `tracks` receives the harness blob store so tracks
    /// can write transcripts the report stage will read back.
    pub fn new<F>(tracks: F, llm: Arc<dyn LlmClient>) -> Self
    where
        F: FnOnce(Arc<MemoryBlobStore>) -> Vec<Arc<dyn AsrTrack>>,
    {
        Self::with_default_recipient(tracks, llm, "team@example.com")
    }

    pub fn with_default_recipient<F>(
        tracks: F,
        llm: Arc<dyn LlmClient>,
        default_recipient: &str,
    ) -> Self
    where
        F: FnOnce(Arc<MemoryBlobStore>) -> Vec<Arc<dyn AsrTrack>>,
    {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let tracks = tracks(blobs.clone());
        let queue = MemoryQueue::new();
        let mailer = Arc::new(MemoryMailer::new());
        let glossary = Arc::new(GlossaryCache::new(store.clone()));

        let transcription: Arc<dyn Stage> = Arc::new(TranscriptionStage::new(
            store.clone(),
            queue.clone(),
            tracks,
            TRANSCRIPTION_QUEUE,
            REPORT_QUEUE,
        ));
        let report: Arc<dyn Stage> = Arc::new(ReportStage::new(
            store.clone(),
            blobs.clone(),
            queue.clone(),
            llm,
            glossary,
            REPORT_QUEUE,
            EXPORT_QUEUE,
        ));
        let export: Arc<dyn Stage> = Arc::new(ExportStage::new(
            store.clone(),
            blobs.clone(),
            mailer.clone(),
            EXPORT_QUEUE,
            "minutes@example.com",
            default_recipient,
        ));
        let retry = RetryService::new(store.clone(), queue.clone(), TRANSCRIPTION_QUEUE);

        Self {
            store,
            blobs,
            queue,
            mailer,
            transcription,
            report,
            export,
            retry,
        }
    }

    /// Process one already-visible message on the given stage.
    pub async fn step(&self, stage: &Arc<dyn Stage>) -> usize {
        let queue: Arc<dyn QueueClient> = self.queue.clone();
        poll_once(&queue, stage).await.expect("queue receive failed")
    }

    pub async fn send(&self, queue_name: &str, body: &str) {
        self.queue.send(queue_name, body).await.unwrap();
    }

    pub async fn receive_raw(&self, queue_name: &str) -> Vec<String> {
        self.queue
            .receive(queue_name, 10, Duration::from_millis(10))
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect()
    }
}
