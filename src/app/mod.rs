//! Service wiring: build ports from config, spawn the three stage workers
//! and the HTTP surface, run until interrupted.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::api::{self, ApiState};
use crate::asr::{AsrTrack, FunAsrTrack, WhisperTrack};
use crate::blob::{BlobStore, FsBlobStore};
use crate::config::Config;
use crate::email::{EmailSender, SendmailMailer};
use crate::glossary::GlossaryCache;
use crate::llm::{HttpLlmClient, LlmClient};
use crate::pipeline::{
    run_stage, ExportStage, ReportStage, RetryService, Stage, TranscriptionStage,
};
use crate::queue::{MemoryQueue, QueueClient};
use crate::store::SqliteStore;

pub async fn run_service() -> Result<()> {
    let config = Config::from_env()?;
    info!("Starting minutecast (data dir: {:?})", config.data_dir);

    let store = Arc::new(
        SqliteStore::open(&config.db_path()).context("Failed to open record store")?,
    );
    let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(
        config.blob_root(),
        config.s3_prefix.clone(),
    ));
    let queue: Arc<dyn QueueClient> = MemoryQueue::new();
    let glossary = Arc::new(GlossaryCache::new(store.clone()));
    let llm: Arc<dyn LlmClient> = Arc::new(
        HttpLlmClient::from_config(&config.llm).context("Failed to build LLM client")?,
    );
    let mailer: Arc<dyn EmailSender> = Arc::new(SendmailMailer::new(
        config.email.sendmail_path.clone(),
    ));

    let tracks = build_tracks(&config, blobs.clone())?;
    info!(
        "ASR ensemble: {} track(s) enabled",
        tracks.len()
    );

    let transcription: Arc<dyn Stage> = Arc::new(TranscriptionStage::new(
        store.clone(),
        queue.clone(),
        tracks,
        config.transcription_queue.clone(),
        config.report_queue.clone(),
    ));
    let report: Arc<dyn Stage> = Arc::new(ReportStage::new(
        store.clone(),
        blobs.clone(),
        queue.clone(),
        llm,
        glossary,
        config.report_queue.clone(),
        config.export_queue.clone(),
    ));
    let export: Arc<dyn Stage> = Arc::new(ExportStage::new(
        store.clone(),
        blobs,
        mailer,
        config.export_queue.clone(),
        config.email.from.clone(),
        config.email.default_to.clone(),
    ));

    let retry = Arc::new(RetryService::new(
        store,
        queue.clone(),
        config.transcription_queue.clone(),
    ));

    let shutdown = CancellationToken::new();

    let api_addr = config.api_addr.clone();
    let api_router = api::router(ApiState { retry });
    let api_shutdown = shutdown.clone();
    let api_server = tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(&api_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind API address {api_addr}: {e}");
                return;
            }
        };
        info!("HTTP surface listening on {api_addr}");
        let result = axum::serve(listener, api_router)
            .with_graceful_shutdown(async move { api_shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            error!("API server failed: {e}");
        }
    });

    let workers = vec![
        tokio::spawn(run_stage(queue.clone(), transcription, shutdown.clone())),
        tokio::spawn(run_stage(queue.clone(), report, shutdown.clone())),
        tokio::spawn(run_stage(queue, export, shutdown.clone())),
    ];

    info!("minutecast is ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, finishing in-flight messages");
    shutdown.cancel();

    for worker in workers {
        if let Err(e) = worker.await {
            warn!("Worker task join failed: {e}");
        }
    }
    if let Err(e) = api_server.await {
        warn!("API task join failed: {e}");
    }

    info!("minutecast stopped");
    Ok(())
}

/// Build the enabled ASR tracks. The managed batch-transcribe track needs a
/// cloud client this binary does not carry; enabling it here only logs.
fn build_tracks(config: &Config, blobs: Arc<dyn BlobStore>) -> Result<Vec<Arc<dyn AsrTrack>>> {
    let mut tracks: Vec<Arc<dyn AsrTrack>> = Vec::new();

    if config.asr.enable_transcribe {
        warn!(
            "ENABLE_TRANSCRIBE is set but no managed transcribe client is wired \
             in the standalone binary; track skipped"
        );
    }
    if config.asr.enable_whisper {
        tracks.push(Arc::new(WhisperTrack::new(
            config.asr.whisper_url.clone(),
            config.s3_bucket.clone(),
            blobs.clone(),
        )));
    }
    if config.asr.funasr_enabled() {
        tracks.push(Arc::new(FunAsrTrack::new(
            config.asr.funasr_url.clone(),
            config.s3_bucket.clone(),
            blobs,
        )));
    }

    if tracks.is_empty() {
        bail!("No usable ASR track; set ENABLE_WHISPER or FUNASR_URL");
    }
    Ok(tracks)
}
