//! Cache lookup and single-flight job submission.

use crate::error::StorageError;
use crate::server::EdgeMetrics;
use crate::storage::{LockToken, TranslationStore};
use edge_types::{ContentHash, DescriptionKind, TextKind, TranslationStatus};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// A request to translate one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    /// Source text (English).
    pub text: String,
    /// Target locale code.
    pub locale: String,
    /// Markup flavour of `text`.
    pub text_kind: TextKind,
    /// Which part of the listing the text is.
    pub kind: DescriptionKind,
}

impl TranslationRequest {
    /// Cache and lock key for this request.
    pub fn hash(&self) -> ContentHash {
        ContentHash::of(&self.text, &self.locale)
    }
}

/// Work handed to the translation worker. The lock for `hash` is held.
#[derive(Debug, Clone)]
pub struct TranslationJob {
    /// Lock and cache key.
    pub hash: ContentHash,
    /// Owner token of the lock on `hash`.
    pub lock: LockToken,
    /// What to translate.
    pub request: TranslationRequest,
}

/// Front half of the pipeline: answers from the cache or submits a job.
pub struct TranslationPipeline {
    store: Arc<dyn TranslationStore>,
    metrics: Arc<EdgeMetrics>,
    queue: mpsc::Sender<TranslationJob>,
}

impl std::fmt::Debug for TranslationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationPipeline")
            .field("queue_capacity", &self.queue.max_capacity())
            .field("queue_free", &self.queue.capacity())
            .finish_non_exhaustive()
    }
}

impl TranslationPipeline {
    /// Create a pipeline and the receiving end of its job queue.
    pub fn new(
        store: Arc<dyn TranslationStore>,
        metrics: Arc<EdgeMetrics>,
        queue_capacity: usize,
    ) -> (Self, mpsc::Receiver<TranslationJob>) {
        let (queue, jobs) = mpsc::channel(queue_capacity.max(1));
        (
            Self {
                store,
                metrics,
                queue,
            },
            jobs,
        )
    }

    /// Return the cached translation, or make sure one is being produced.
    ///
    /// Never waits for translation work. A request that loses the lock race,
    /// or finds the queue full, is `Pending` and should be retried later.
    pub async fn request(
        &self,
        request: TranslationRequest,
    ) -> Result<TranslationStatus, StorageError> {
        self.metrics
            .translations_requested
            .fetch_add(1, Ordering::Relaxed);
        let hash = request.hash();

        if let Some(entry) = self.store.get(&hash).await? {
            self.metrics.translations_ready.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Translation cache hit: {:?} ({})", hash, request.locale);
            return Ok(TranslationStatus::Ready {
                content: entry.content,
                text_kind: entry.text_kind,
            });
        }

        self.metrics
            .translations_pending
            .fetch_add(1, Ordering::Relaxed);

        let Some(lock) = self.store.try_lock(&hash).await? else {
            tracing::debug!("Translation already in flight: {:?}", hash);
            return Ok(TranslationStatus::Pending);
        };

        let locale = request.locale.clone();
        match self.queue.try_send(TranslationJob {
            hash,
            lock,
            request,
        }) {
            Ok(()) => {
                tracing::info!("Queued translation {:?} into {}", hash, locale);
            }
            Err(TrySendError::Full(job)) => {
                tracing::warn!("Translation queue full, dropping {:?}", job.hash);
                self.store.unlock(&job.hash, &job.lock).await?;
            }
            Err(TrySendError::Closed(job)) => {
                tracing::warn!("Translation worker not running, dropping {:?}", job.hash);
                self.store.unlock(&job.hash, &job.lock).await?;
            }
        }

        Ok(TranslationStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use edge_types::CachedTranslation;

    async fn pipeline(capacity: usize) -> (TranslationPipeline, mpsc::Receiver<TranslationJob>, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let metrics = Arc::new(EdgeMetrics::default());
        let (pipeline, jobs) = TranslationPipeline::new(store.clone(), metrics, capacity);
        (pipeline, jobs, store)
    }

    fn request(text: &str, locale: &str) -> TranslationRequest {
        TranslationRequest {
            text: text.to_string(),
            locale: locale.to_string(),
            text_kind: TextKind::Markdown,
            kind: DescriptionKind::Description,
        }
    }

    #[tokio::test]
    async fn cache_hit_is_ready_without_job() {
        let (pipeline, mut jobs, store) = pipeline(4).await;
        let req = request("Hello", "zh-CN");
        store
            .insert(&CachedTranslation {
                hash: req.hash(),
                content: "你好".to_string(),
                locale: "zh-CN".to_string(),
                text_kind: TextKind::Markdown,
                kind: DescriptionKind::Description,
                created_at: 0,
            })
            .await
            .unwrap();

        let status = pipeline.request(req).await.unwrap();
        assert_eq!(
            status,
            TranslationStatus::Ready {
                content: "你好".to_string(),
                text_kind: TextKind::Markdown,
            }
        );
        assert!(jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn miss_takes_lock_and_queues_one_job() {
        let (pipeline, mut jobs, store) = pipeline(4).await;
        let req = request("Hello", "ja");

        assert_eq!(pipeline.request(req.clone()).await.unwrap(), TranslationStatus::Pending);
        assert_eq!(pipeline.request(req.clone()).await.unwrap(), TranslationStatus::Pending);

        let job = jobs.try_recv().unwrap();
        assert_eq!(job.hash, req.hash());
        assert_eq!(job.request, req);
        assert!(jobs.try_recv().is_err(), "second request must not queue work");

        // Lock is still held by the queued job.
        assert!(store.try_lock(&req.hash()).await.unwrap().is_none());
        assert!(store.refresh_lock(&job.hash, &job.lock).await.unwrap());
    }

    #[tokio::test]
    async fn full_queue_releases_lock() {
        let (pipeline, _jobs, store) = pipeline(1).await;

        pipeline.request(request("first", "de")).await.unwrap();
        let second = request("second", "de");
        assert_eq!(
            pipeline.request(second.clone()).await.unwrap(),
            TranslationStatus::Pending
        );

        assert!(store.try_lock(&second.hash()).await.unwrap().is_some(), "lock leaked");
    }

    #[tokio::test]
    async fn closed_queue_releases_lock() {
        let (pipeline, jobs, store) = pipeline(4).await;
        drop(jobs);

        let req = request("orphan", "fr");
        assert_eq!(pipeline.request(req.clone()).await.unwrap(), TranslationStatus::Pending);
        assert!(store.try_lock(&req.hash()).await.unwrap().is_some(), "lock leaked");
    }

    #[tokio::test]
    async fn different_locales_are_different_jobs() {
        let (pipeline, mut jobs, _store) = pipeline(4).await;
        pipeline.request(request("Hello", "ja")).await.unwrap();
        pipeline.request(request("Hello", "ko")).await.unwrap();

        assert_eq!(jobs.try_recv().unwrap().request.locale, "ja");
        assert_eq!(jobs.try_recv().unwrap().request.locale, "ko");
    }
}
