//! Retrieval service owning the build/query lifecycle.
//!
//! The service holds the single piece of mutable shared state in the crate:
//! the "current generation" slot. A generation (index + registry pair) is
//! constructed fully off to the side during a rebuild and installed with one
//! pointer swap, so queries either see the old generation or the new one,
//! never a half-built mix. Rebuilds are single-flight; queries run freely
//! against whatever generation they snapshot at entry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::corpus::CorpusRegistry;
use crate::embedding::TextEmbedder;
use crate::error::{RetrievalError, RetrievalResult};
use crate::index::{Dimension, FlatIndex};

/// One immutable, internally consistent build of the vector index and its
/// paired passage registry. `index.len() == registry.len()` by construction.
#[derive(Debug)]
pub struct IndexGeneration {
    index: FlatIndex,
    registry: CorpusRegistry,
}

impl IndexGeneration {
    fn new(index: FlatIndex, registry: CorpusRegistry) -> Self {
        debug_assert_eq!(index.len(), registry.len());
        Self { index, registry }
    }

    /// The exact k-NN index for this generation.
    #[must_use]
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    /// The position-to-passage mapping paired with this generation's index.
    #[must_use]
    pub fn registry(&self) -> &CorpusRegistry {
        &self.registry
    }

    /// Number of passages (and vectors) in this generation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Embedding dimension shared by every vector in this generation.
    #[must_use]
    pub fn dimension(&self) -> Dimension {
        self.index.dimension()
    }
}

/// A retrieved passage with its squared Euclidean distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub text: String,
    pub distance: f32,
}

/// Orchestrates embedding, index builds, and queries over the current
/// generation. Cheap to share behind an `Arc`; all methods take `&self`.
pub struct RetrievalService {
    embedder: Arc<dyn TextEmbedder>,
    current: RwLock<Option<Arc<IndexGeneration>>>,
    building: AtomicBool,
}

/// RAII release of the single-flight build slot. Dropping the guard (normal
/// return, error, or an abandoned rebuild future) frees the slot, so a
/// cancelled rebuild can never wedge the service.
struct BuildGuard<'a>(&'a AtomicBool);

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl RetrievalService {
    /// Creates a service in the uninitialized state: queries fail with
    /// `IndexNotReady` until the first successful rebuild.
    #[must_use]
    pub fn new(embedder: Arc<dyn TextEmbedder>) -> Self {
        Self {
            embedder,
            current: RwLock::new(None),
            building: AtomicBool::new(false),
        }
    }

    /// Whether a generation is currently ready to serve queries.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// Snapshot of the current generation, if any. The returned `Arc` keeps
    /// the generation alive for as long as the caller holds it, independent
    /// of later rebuilds.
    #[must_use]
    pub fn generation(&self) -> Option<Arc<IndexGeneration>> {
        self.current.read().clone()
    }

    /// Rebuilds the index from an ordered corpus of passages.
    ///
    /// Single-flight: a second rebuild while one is in flight fails with
    /// `BuildInProgress` rather than queueing. On any failure the previously
    /// current generation (if one exists) stays installed and queryable; the
    /// new generation only becomes visible through one atomic swap after it
    /// is fully constructed.
    ///
    /// # Errors
    /// `BuildInProgress`, `EmptyCorpus`, `EmbeddingFailure`, or
    /// `DimensionMismatch`, whichever occurs first.
    pub async fn rebuild(&self, passages: Vec<String>) -> RetrievalResult<()> {
        let _guard = self.claim_build_slot()?;

        if passages.is_empty() {
            return Err(RetrievalError::EmptyCorpus);
        }

        info!(passages = passages.len(), "rebuilding index generation");
        let vectors = self.embedder.embed_batch(&passages).await?;
        if vectors.len() != passages.len() {
            // embed_batch contract violation; refuse to pair mismatched sets
            return Err(RetrievalError::EmbeddingFailure {
                reason: format!(
                    "embedder returned {} vectors for {} passages",
                    vectors.len(),
                    passages.len()
                ),
            });
        }

        let index = FlatIndex::build(self.embedder.dimension(), &vectors)?;
        let registry = CorpusRegistry::from_texts(passages);
        let generation = Arc::new(IndexGeneration::new(index, registry));

        let count = generation.len();
        *self.current.write() = Some(generation);
        info!(passages = count, "new index generation is current");
        Ok(())
    }

    /// Embeds `text` and returns the `k` most similar passages with their
    /// distances, ordered ascending.
    ///
    /// The generation is snapshotted before the (suspending) embed call, so
    /// a rebuild completing mid-query never hands this query a different
    /// corpus than the one it started against.
    ///
    /// # Errors
    /// `IndexNotReady`, `EmbeddingFailure`, or `DimensionMismatch`,
    /// whichever occurs first.
    pub async fn query(&self, text: &str, k: usize) -> RetrievalResult<Vec<ScoredPassage>> {
        let generation = self.generation().ok_or(RetrievalError::IndexNotReady)?;

        let query_vector = self.embedder.embed(text).await?;
        let hits = generation.index().search(&query_vector, k)?;
        debug!(hits = hits.len(), k, "query search complete");

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            // Positions come from this generation's own index, so resolution
            // cannot fail; an unresolvable hit is dropped rather than
            // surfaced, matching the treatment of invalid positions as
            // non-existent content.
            match generation.registry().resolve(hit.position) {
                Ok(passage) => results.push(ScoredPassage {
                    text: passage.text.clone(),
                    distance: hit.distance,
                }),
                Err(err) => warn!(%err, "dropping unresolvable search hit"),
            }
        }
        Ok(results)
    }

    fn claim_build_slot(&self) -> RetrievalResult<BuildGuard<'_>> {
        if self
            .building
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_err()
        {
            return Err(RetrievalError::BuildInProgress);
        }
        Ok(BuildGuard(&self.building))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockTextEmbedder;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    fn fir_corpus() -> Vec<String> {
        vec![
            "FIR was registered under section 498A and 406 IPC.".to_string(),
            "The accused was granted interim bail.".to_string(),
            "Complainant claims mental harassment due to dowry.".to_string(),
            "No physical evidence was submitted to the court.".to_string(),
            "Statements recorded under Section 161 of CrPC.".to_string(),
        ]
    }

    fn mock_service() -> RetrievalService {
        RetrievalService::new(Arc::new(MockTextEmbedder::new()))
    }

    /// Embedder whose batch behavior can be switched between builds while
    /// single-text embedding always works, for exercising rebuild failures.
    struct SwitchableEmbedder {
        inner: MockTextEmbedder,
        mode: Mutex<BatchMode>,
    }

    #[derive(Clone, Copy)]
    enum BatchMode {
        Good,
        FailRemote,
        WrongDims,
    }

    impl SwitchableEmbedder {
        fn new() -> Self {
            Self {
                inner: MockTextEmbedder::new(),
                mode: Mutex::new(BatchMode::Good),
            }
        }

        fn set_mode(&self, mode: BatchMode) {
            *self.mode.lock().unwrap() = mode;
        }
    }

    #[async_trait]
    impl TextEmbedder for SwitchableEmbedder {
        async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>> {
            let mode = *self.mode.lock().unwrap();
            match mode {
                BatchMode::Good => self.inner.embed_batch(texts).await,
                BatchMode::FailRemote => Err(RetrievalError::EmbeddingFailure {
                    reason: "simulated outage".to_string(),
                }),
                BatchMode::WrongDims => {
                    let mut vectors = self.inner.embed_batch(texts).await?;
                    if let Some(last) = vectors.last_mut() {
                        last.pop();
                    }
                    Ok(vectors)
                }
            }
        }

        fn dimension(&self) -> Dimension {
            self.inner.dimension()
        }
    }

    /// Embedder that parks inside embed_batch until released, for pinning
    /// the service in the Building state.
    struct BlockingEmbedder {
        inner: MockTextEmbedder,
        entered: Notify,
        release: Notify,
    }

    impl BlockingEmbedder {
        fn new() -> Self {
            Self {
                inner: MockTextEmbedder::new(),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl TextEmbedder for BlockingEmbedder {
        async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>> {
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.embed_batch(texts).await
        }

        fn dimension(&self) -> Dimension {
            self.inner.dimension()
        }
    }

    #[tokio::test]
    async fn query_before_any_rebuild_is_not_ready() {
        let service = mock_service();
        assert!(!service.is_ready());
        let err = service.query("anything", 3).await.unwrap_err();
        assert!(matches!(err, RetrievalError::IndexNotReady));
    }

    #[tokio::test]
    async fn rebuild_with_empty_corpus_is_rejected() {
        let service = mock_service();
        let err = service.rebuild(Vec::new()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::EmptyCorpus));
        assert!(!service.is_ready());
        // The failed rebuild released the build slot
        service.rebuild(fir_corpus()).await.unwrap();
    }

    #[tokio::test]
    async fn generation_pairs_index_and_registry() {
        let service = mock_service();
        service.rebuild(fir_corpus()).await.unwrap();

        let generation = service.generation().unwrap();
        assert_eq!(generation.index().len(), generation.registry().len());
        assert_eq!(generation.len(), 5);
        for passage in generation.registry().iter() {
            assert!(generation.registry().resolve(passage.position).is_ok());
        }
    }

    #[tokio::test]
    async fn querying_a_passage_verbatim_returns_it_at_distance_zero() {
        let service = mock_service();
        service.rebuild(fir_corpus()).await.unwrap();

        let results = service
            .query("The accused was granted interim bail.", 5)
            .await
            .unwrap();
        assert_eq!(results[0].text, "The accused was granted interim bail.");
        assert_eq!(results[0].distance, 0.0);
    }

    #[tokio::test]
    async fn bail_question_ranks_bail_passage_first() {
        let service = mock_service();
        service.rebuild(fir_corpus()).await.unwrap();

        let results = service
            .query("Was the accused granted bail?", 5)
            .await
            .unwrap();
        assert_eq!(results.len(), 5);
        assert!(results[0].text.contains("interim bail"));
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[tokio::test]
    async fn k_caps_the_result_count() {
        let service = mock_service();
        service.rebuild(fir_corpus()).await.unwrap();

        assert_eq!(service.query("dowry", 2).await.unwrap().len(), 2);
        assert_eq!(service.query("dowry", 100).await.unwrap().len(), 5);
        assert!(service.query("dowry", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_remote_rebuild_keeps_prior_generation() {
        let embedder = Arc::new(SwitchableEmbedder::new());
        let service = RetrievalService::new(embedder.clone());

        service.rebuild(fir_corpus()).await.unwrap();
        let before = service.query("Was the accused granted bail?", 3).await.unwrap();

        embedder.set_mode(BatchMode::FailRemote);
        let err = service
            .rebuild(vec!["replacement corpus".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::EmbeddingFailure { .. }));

        let after = service.query("Was the accused granted bail?", 3).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn dimension_mismatch_rebuild_keeps_prior_generation() {
        let embedder = Arc::new(SwitchableEmbedder::new());
        let service = RetrievalService::new(embedder.clone());

        service.rebuild(fir_corpus()).await.unwrap();
        let before = service.query("dowry harassment", 3).await.unwrap();

        embedder.set_mode(BatchMode::WrongDims);
        let err = service
            .rebuild(vec!["one".to_string(), "two".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::DimensionMismatch { .. }));

        let after = service.query("dowry harassment", 3).await.unwrap();
        assert_eq!(before, after);

        // And the slot is free for a corrected rebuild
        embedder.set_mode(BatchMode::Good);
        service.rebuild(fir_corpus()).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_rebuild_is_rejected_as_single_flight() {
        let embedder = Arc::new(BlockingEmbedder::new());
        let service = Arc::new(RetrievalService::new(embedder.clone()));

        let background = {
            let service = service.clone();
            tokio::spawn(async move { service.rebuild(fir_corpus()).await })
        };
        embedder.entered.notified().await;

        // First build is parked inside embed_batch; a second one must bounce
        let err = service.rebuild(fir_corpus()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::BuildInProgress));

        // No prior generation exists, so queries are not ready while Building
        let err = service.query("bail", 3).await.unwrap_err();
        assert!(matches!(err, RetrievalError::IndexNotReady));

        embedder.release.notify_one();
        background.await.unwrap().unwrap();
        assert!(service.is_ready());
    }

    #[tokio::test]
    async fn queries_during_rebuild_see_one_consistent_generation() {
        let embedder = Arc::new(BlockingEmbedder::new());
        let service = Arc::new(RetrievalService::new(embedder.clone()));

        // First generation goes through unblocked
        let first = {
            let service = service.clone();
            tokio::spawn(async move { service.rebuild(fir_corpus()).await })
        };
        embedder.entered.notified().await;
        embedder.release.notify_one();
        first.await.unwrap().unwrap();

        // Second rebuild parks in the embedder with a replacement corpus
        let replacement = vec![
            "Chargesheet filed before the magistrate.".to_string(),
            "The accused was granted interim bail.".to_string(),
        ];
        let second = {
            let service = service.clone();
            let replacement = replacement.clone();
            tokio::spawn(async move { service.rebuild(replacement).await })
        };
        embedder.entered.notified().await;

        // Queries issued mid-rebuild serve the first generation, intact
        let original = fir_corpus();
        for _ in 0..8 {
            let results = service.query("granted interim bail", 5).await.unwrap();
            assert_eq!(results.len(), 5);
            for scored in &results {
                assert!(original.contains(&scored.text));
            }
        }

        // A snapshot taken before the swap stays valid after it
        let held = service.generation().unwrap();
        embedder.release.notify_one();
        second.await.unwrap().unwrap();

        assert_eq!(held.len(), 5);
        assert!(held.registry().resolve(crate::index::Position::new(4)).is_ok());

        // New queries see the replacement corpus
        let results = service.query("granted interim bail", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        for scored in &results {
            assert!(replacement.contains(&scored.text));
        }
    }

    #[tokio::test]
    async fn abandoned_rebuild_releases_the_build_slot() {
        let embedder = Arc::new(BlockingEmbedder::new());
        let service = Arc::new(RetrievalService::new(embedder.clone()));

        let abandoned = {
            let service = service.clone();
            tokio::spawn(async move { service.rebuild(fir_corpus()).await })
        };
        embedder.entered.notified().await;
        abandoned.abort();
        let _ = abandoned.await;

        // The aborted future dropped its guard; a fresh rebuild proceeds
        let retry = {
            let service = service.clone();
            tokio::spawn(async move { service.rebuild(fir_corpus()).await })
        };
        embedder.entered.notified().await;
        embedder.release.notify_one();
        retry.await.unwrap().unwrap();
        assert!(service.is_ready());
    }
}
