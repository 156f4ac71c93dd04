//! Retry, timeout, rate and fallback settings for reasoning calls

use crate::config::{FallbackPolicy, ReasoningConfig};
use std::time::Duration;

/// What to do once every attempt has failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fallback {
    /// Drop the signal; the aggregator redistributes its weight.
    Exclude,
    /// Substitute a fixed score, flagged as degraded.
    Neutral { score: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningPolicy {
    pub max_concurrency: usize,
    pub max_calls_per_window: usize,
    pub window: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub timeout: Duration,
    pub fallback: Fallback,
}

impl Default for ReasoningPolicy {
    fn default() -> Self {
        Self::from_config(&ReasoningConfig::default())
    }
}

impl ReasoningPolicy {
    pub fn from_config(config: &ReasoningConfig) -> Self {
        let fallback = match config.fallback {
            FallbackPolicy::Exclude => Fallback::Exclude,
            FallbackPolicy::Neutral => Fallback::Neutral {
                score: config.neutral_score,
            },
        };

        Self {
            max_concurrency: config.max_concurrency.max(1),
            max_calls_per_window: config.max_calls_per_window.max(1),
            window: Duration::from_secs(config.window_secs),
            max_attempts: config.max_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            fallback,
        }
    }

    /// Delay before retry number `retry` (1 for the first retry): the base
    /// doubles each time and is capped at `backoff_max`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
    }
}
