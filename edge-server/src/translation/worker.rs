//! Background translation worker.
//!
//! Started once at startup. Consumes jobs from the pipeline queue, runs each
//! through chunking and the backend, and writes the result to the store.
//!
//! A job's lock is restamped when the job starts and then every
//! [`LOCK_REFRESH_INTERVAL`] while it runs, so the stale-lock sweep only ever
//! frees locks whose owner is gone. A job that finds its lock taken over
//! stops without touching the backend or the new owner's lock.

use super::backend::TranslationBackend;
use super::pipeline::TranslationJob;
use crate::config::TranslationConfig;
use crate::error::EdgeError;
use crate::server::EdgeMetrics;
use crate::storage::TranslationStore;
use edge_core::PreparedDocument;
use edge_types::{CachedTranslation, TextKind};
use futures_util::future::try_join_all;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Semaphore};

/// How often a running job restamps its lock.
///
/// Must stay well below the cleanup task's lock TTL.
pub const LOCK_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn the background translation worker.
///
/// Returns a handle that can be used to abort the task. The task ends once
/// every sender of the queue is dropped and in-flight jobs have finished.
pub fn spawn_translation_worker(
    mut jobs: mpsc::Receiver<TranslationJob>,
    store: Arc<dyn TranslationStore>,
    backend: Arc<dyn TranslationBackend>,
    config: TranslationConfig,
    metrics: Arc<EdgeMetrics>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.worker_enabled {
            tracing::info!("Translation worker disabled");
            return;
        }

        let slots = config.max_concurrent_jobs.max(1);
        tracing::info!("Translation worker started (concurrency: {})", slots);

        let permits = Arc::new(Semaphore::new(slots));
        let config = Arc::new(config);

        while let Some(job) = jobs.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };

            let store = store.clone();
            let backend = backend.clone();
            let config = config.clone();
            let metrics = metrics.clone();

            tokio::spawn(async move {
                run_job(job, store.as_ref(), backend.as_ref(), &config, &metrics).await;
                drop(permit);
            });
        }

        // Wait for in-flight jobs before reporting the worker stopped.
        let _ = permits.acquire_many(slots as u32).await;
        tracing::info!("Translation worker stopped");
    })
}

/// Run one job and release its lock.
async fn run_job(
    job: TranslationJob,
    store: &dyn TranslationStore,
    backend: &dyn TranslationBackend,
    config: &TranslationConfig,
    metrics: &EdgeMetrics,
) {
    let hash = job.hash;

    // The job may have waited in the queue longer than the lock TTL.
    match store.refresh_lock(&hash, &job.lock).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Translation lock {:?} lost while queued, skipped", hash);
            return;
        }
        Err(e) => {
            metrics.jobs_failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!("Failed to refresh translation lock {:?}: {}", hash, e);
            release(store, &job).await;
            return;
        }
    }

    let outcome = tokio::select! {
        result = translate_job(&job, store, backend, config) => Some(result),
        () = hold_lock(&job, store) => None,
    };

    match outcome {
        Some(Ok(true)) => {
            metrics.jobs_completed.fetch_add(1, Ordering::Relaxed);
            tracing::info!("Translated {:?} into {}", hash, job.request.locale);
        }
        Some(Ok(false)) => {
            tracing::debug!("Translation {:?} already cached, skipped", hash);
        }
        Some(Err(e)) => {
            metrics.jobs_failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                "Translation {:?} into {} failed: {}",
                hash,
                job.request.locale,
                e
            );
        }
        None => {
            metrics.jobs_failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Translation lock {:?} lost while running, abandoned", hash);
            return;
        }
    }

    release(store, &job).await;
}

/// Keep restamping the job's lock. Returns once the lock is no longer ours.
async fn hold_lock(job: &TranslationJob, store: &dyn TranslationStore) {
    let mut timer = tokio::time::interval(LOCK_REFRESH_INTERVAL);
    // The first tick is immediate and the lock was just refreshed.
    timer.tick().await;

    loop {
        timer.tick().await;
        match store.refresh_lock(&job.hash, &job.lock).await {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                tracing::warn!("Failed to refresh translation lock {:?}: {}", job.hash, e);
            }
        }
    }
}

async fn release(store: &dyn TranslationStore, job: &TranslationJob) {
    if let Err(e) = store.unlock(&job.hash, &job.lock).await {
        tracing::error!("Failed to release translation lock {:?}: {}", job.hash, e);
    }
}

/// Translate and store. Returns `false` if the entry already existed.
async fn translate_job(
    job: &TranslationJob,
    store: &dyn TranslationStore,
    backend: &dyn TranslationBackend,
    config: &TranslationConfig,
) -> Result<bool, EdgeError> {
    if store.get(&job.hash).await?.is_some() {
        return Ok(false);
    }

    let request = &job.request;
    let window = match request.text_kind {
        TextKind::Markdown => config.markdown_window,
        TextKind::Html => config.html_window,
        TextKind::Plain => usize::MAX,
    };

    let document = PreparedDocument::prepare(&request.text, request.text_kind, window);
    tracing::debug!(
        "Translating {:?}: {} chunk(s) of {}",
        job.hash,
        document.chunks().len(),
        request.text_kind
    );

    // Any chunk failing abandons the whole job; partial output is discarded.
    let outputs = try_join_all(
        document
            .chunks()
            .iter()
            .map(|chunk| backend.translate(chunk, &request.locale, request.text_kind)),
    )
    .await?;

    let entry = CachedTranslation {
        hash: job.hash,
        content: document.reassemble(&outputs),
        locale: request.locale.clone(),
        text_kind: request.text_kind,
        kind: request.kind,
        created_at: current_timestamp(),
    };

    Ok(store.insert(&entry).await?)
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
