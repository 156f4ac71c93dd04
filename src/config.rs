//! Configuration management for the relevance engine

use crate::error::{RelevanceError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub matching: MatchingConfig,
    pub semantic: SemanticConfig,
    pub reasoning: ReasoningConfig,
    pub scoring: ScoringConfig,
    pub batch: BatchConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Job descriptions shorter than this (after cleaning) are rejected.
    pub min_job_chars: usize,
    pub min_resume_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub fuzzy_threshold: f64,
    pub min_fuzzy_len: usize,
    pub exact_weight: f64,
    pub fuzzy_weight: f64,
    pub must_have_share: f64,
    pub good_to_have_share: f64,
    pub qualification_bonus: f64,
    pub experience_penalty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    Model2vec,
    Hashing,
}

/// What the orchestrator does when the embedding backend cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnavailablePolicy {
    Degrade,
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    pub backend: EmbeddingBackendKind,
    pub model: String,
    pub hashing_dimension: usize,
    pub calibration_floor: f64,
    pub calibration_ceiling: f64,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub on_unavailable: UnavailablePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Drop the reasoning signal and redistribute its weight.
    Exclude,
    /// Substitute `neutral_score`, flagged as degraded.
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_concurrency: usize,
    pub max_calls_per_window: usize,
    pub window_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub fallback: FallbackPolicy,
    pub neutral_score: f64,
    pub max_rationale_chars: usize,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub hard_weight: f64,
    pub semantic_weight: f64,
    pub reasoning_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub concurrency: usize,
    pub top_missing_skills: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub detailed: bool,
    pub color_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Console,
    Json,
    Markdown,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_job_chars: 20,
            min_resume_chars: 10,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.8,
            min_fuzzy_len: 4,
            exact_weight: 1.0,
            fuzzy_weight: 0.7,
            must_have_share: 0.7,
            good_to_have_share: 0.3,
            qualification_bonus: 5.0,
            experience_penalty: 20.0,
        }
    }
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackendKind::Model2vec,
            model: "minishlab/potion-base-8M".to_string(),
            hashing_dimension: 256,
            calibration_floor: 0.15,
            calibration_ceiling: 0.85,
            cache_enabled: true,
            cache_ttl_secs: 3600,
            cache_max_entries: 512,
            on_unavailable: UnavailablePolicy::Degrade,
        }
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            temperature: 0.1,
            max_tokens: 400,
            timeout_secs: 30,
            max_concurrency: 10,
            max_calls_per_window: 60,
            window_secs: 60,
            max_attempts: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8000,
            fallback: FallbackPolicy::Exclude,
            neutral_score: 50.0,
            max_rationale_chars: 600,
            cache_enabled: true,
            cache_ttl_secs: 86_400,
            cache_max_entries: 1024,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hard_weight: 0.4,
            semantic_weight: 0.4,
            reasoning_weight: 0.2,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            top_missing_skills: 10,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Console,
            detailed: false,
            color_output: true,
        }
    }
}

impl Config {
    /// Load from the default location, writing defaults on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            RelevanceError::Configuration(format!("Failed to parse config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            RelevanceError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("resume-relevance")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;
        let weights = [s.hard_weight, s.semantic_weight, s.reasoning_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(RelevanceError::Configuration(
                "scoring weights must be non-negative".to_string(),
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(RelevanceError::Configuration(
                "scoring weights must have a positive sum".to_string(),
            ));
        }

        let m = &self.matching;
        if !(0.0..=1.0).contains(&m.fuzzy_threshold) {
            return Err(RelevanceError::Configuration(format!(
                "matching.fuzzy_threshold must be within [0, 1], got {}",
                m.fuzzy_threshold
            )));
        }
        if m.fuzzy_weight > m.exact_weight {
            return Err(RelevanceError::Configuration(
                "matching.fuzzy_weight must not exceed matching.exact_weight".to_string(),
            ));
        }
        if m.must_have_share < 0.0 || m.good_to_have_share < 0.0 {
            return Err(RelevanceError::Configuration(
                "matching shares must be non-negative".to_string(),
            ));
        }

        let sem = &self.semantic;
        if sem.calibration_floor >= sem.calibration_ceiling {
            return Err(RelevanceError::Configuration(format!(
                "semantic.calibration_floor ({}) must be below calibration_ceiling ({})",
                sem.calibration_floor, sem.calibration_ceiling
            )));
        }

        let r = &self.reasoning;
        if r.max_concurrency == 0 || r.max_attempts == 0 || r.max_calls_per_window == 0 {
            return Err(RelevanceError::Configuration(
                "reasoning concurrency, attempts and window size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&r.neutral_score) {
            return Err(RelevanceError::Configuration(
                "reasoning.neutral_score must be within [0, 100]".to_string(),
            ));
        }

        if self.batch.concurrency == 0 {
            return Err(RelevanceError::Configuration(
                "batch.concurrency must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
