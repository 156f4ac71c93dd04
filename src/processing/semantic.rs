//! Embedding similarity between resume and job text

use crate::cache::{content_hash, CacheStats, ContentCache};
use crate::config::SemanticConfig;
use crate::error::{RelevanceError, Result};
use crate::processing::embeddings::{cosine_similarity, EmbeddingBackend};
use crate::processing::signals::{clamp_score, SemanticSignal};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

pub type EmbeddingCache = ContentCache<Arc<Vec<f32>>>;

pub struct SemanticMatcher {
    backend: Arc<dyn EmbeddingBackend>,
    cache: Arc<EmbeddingCache>,
    floor: f64,
    ceiling: f64,
}

impl SemanticMatcher {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, config: &SemanticConfig) -> Self {
        let cache = if config.cache_enabled {
            ContentCache::new(
                Duration::from_secs(config.cache_ttl_secs),
                config.cache_max_entries,
            )
        } else {
            ContentCache::disabled()
        };
        Self::with_cache(backend, Arc::new(cache), config)
    }

    /// Share one embedding cache between several matchers.
    pub fn with_cache(
        backend: Arc<dyn EmbeddingBackend>,
        cache: Arc<EmbeddingCache>,
        config: &SemanticConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            floor: config.calibration_floor,
            ceiling: config.calibration_ceiling,
        }
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Embed `text`, going through the cache. Backend errors surface as
    /// `EmbeddingUnavailable`.
    pub async fn embed(&self, text: &str) -> Result<Arc<Vec<f32>>> {
        let normalized = normalize_for_embedding(text);
        let key = content_hash(&[self.backend.model_id(), &normalized]);

        if let Some(cached) = self.cache.get(&key) {
            debug!("Embedding cache hit for {}", &key[..12]);
            return Ok(cached);
        }

        let embedding = self.backend.embed(&normalized).await.map_err(|e| match e {
            RelevanceError::EmbeddingUnavailable(msg) => RelevanceError::EmbeddingUnavailable(msg),
            other => RelevanceError::EmbeddingUnavailable(other.to_string()),
        })?;
        let embedding = Arc::new(embedding);
        self.cache.insert(key, Arc::clone(&embedding));
        Ok(embedding)
    }

    /// Compare a resume against an already embedded job.
    pub async fn evaluate_against(
        &self,
        resume_text: &str,
        job_embedding: &[f32],
    ) -> Result<SemanticSignal> {
        let resume_embedding = self.embed(resume_text).await?;
        let similarity = cosine_similarity(&resume_embedding, job_embedding)?;

        Ok(SemanticSignal {
            score: self.calibrate(similarity),
            similarity,
            model_id: self.backend.model_id().to_string(),
            dimension: resume_embedding.len(),
        })
    }

    pub async fn evaluate(&self, resume_text: &str, job_text: &str) -> Result<SemanticSignal> {
        let job_embedding = self.embed(job_text).await?;
        self.evaluate_against(resume_text, &job_embedding).await
    }

    /// Linear map of `[floor, ceiling]` onto `[0, 100]`, clipped. Raw cosine
    /// values for related documents bunch up well inside [0, 1].
    pub fn calibrate(&self, similarity: f64) -> f64 {
        let span = self.ceiling - self.floor;
        if span <= 0.0 {
            return if similarity >= self.ceiling { 100.0 } else { 0.0 };
        }
        clamp_score((similarity - self.floor) / span * 100.0)
    }
}

fn normalize_for_embedding(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
