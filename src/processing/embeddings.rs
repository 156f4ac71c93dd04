//! Text embedding backends
//!
//! `StaticEmbedder` wraps a Model2Vec static model. `HashingEmbedder` is a
//! deterministic feature-hashing fallback that needs no model files.

use crate::config::{EmbeddingBackendKind, SemanticConfig};
use crate::error::{RelevanceError, Result};
use crate::processing::text_processor::TextProcessor;
use async_trait::async_trait;
use log::{debug, info};
use model2vec_rs::model::StaticModel;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;

/// Maps text to a fixed-length vector. Calls for the same text return the
/// same vector.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Identifier recorded with every semantic signal.
    fn model_id(&self) -> &str;
}

pub struct StaticEmbedder {
    model: Arc<StaticModel>,
    model_id: String,
}

impl StaticEmbedder {
    /// Load from a local folder or a HuggingFace repo id.
    pub fn load(model: &str) -> Result<Self> {
        let start_time = Instant::now();
        info!("Loading Model2Vec embedding model: {}", model);

        let static_model = StaticModel::from_pretrained(model, None, None, None).map_err(|e| {
            RelevanceError::EmbeddingUnavailable(format!("Failed to load model {model}: {e}"))
        })?;

        info!("Embedding model loaded in {:.2?}", start_time.elapsed());
        Ok(Self {
            model: Arc::new(static_model),
            model_id: model.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for StaticEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = Arc::clone(&self.model);
        let text = text.to_string();
        let embedding = tokio::task::spawn_blocking(move || model.encode_single(&text))
            .await
            .map_err(|e| RelevanceError::Embedding(format!("Embedding task failed: {e}")))?;

        if embedding.is_empty() {
            return Err(RelevanceError::Embedding(
                "Model returned an empty embedding".to_string(),
            ));
        }
        Ok(embedding)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Feature-hashing embedder over content words and adjacent word pairs.
///
/// Each feature lands in one bucket with a hash-derived sign, and the
/// result is L2-normalized. Changing the hashing scheme changes every
/// vector, so `model_id` carries a version suffix.
pub struct HashingEmbedder {
    dimension: usize,
    processor: TextProcessor,
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            processor: TextProcessor::new(),
            model_id: format!("hashing-v1-{dimension}"),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens = self.processor.tokenize(text);

        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl EmbeddingBackend for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Build the backend named in the configuration.
pub fn backend_from_config(config: &SemanticConfig) -> Result<Arc<dyn EmbeddingBackend>> {
    match config.backend {
        EmbeddingBackendKind::Model2vec => {
            let embedder = StaticEmbedder::load(&config.model)?;
            Ok(Arc::new(embedder))
        }
        EmbeddingBackendKind::Hashing => {
            debug!("Using hashing embedder with {} dimensions", config.hashing_dimension);
            Ok(Arc::new(HashingEmbedder::new(config.hashing_dimension)))
        }
    }
}

/// Cosine similarity in [-1, 1]. Zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(RelevanceError::Embedding(format!(
            "Embedding dimensions don't match: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}
