//! Structured reasoning signal with caching, retries and fallback

use crate::cache::{content_hash, CacheStats, ContentCache};
use crate::config::ReasoningConfig;
use crate::error::{RelevanceError, Result};
use crate::llm::client::ReasoningBackend;
use crate::llm::policy::{Fallback, ReasoningPolicy};
use crate::llm::prompts::build_relevance_request;
use crate::llm::rate_limiter::RateLimiter;
use crate::processing::document::ResumeDocument;
use crate::processing::requirements::JobRequirement;
use crate::processing::signals::ReasoningSignal;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningStatus {
    Fresh,
    Cached,
    Degraded,
    Excluded,
    Disabled,
}

impl fmt::Display for ReasoningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReasoningStatus::Fresh => "fresh",
            ReasoningStatus::Cached => "cached",
            ReasoningStatus::Degraded => "degraded",
            ReasoningStatus::Excluded => "excluded",
            ReasoningStatus::Disabled => "disabled",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningOutcome {
    Scored {
        signal: ReasoningSignal,
        status: ReasoningStatus,
    },
    /// Every attempt failed and the policy drops the signal.
    Excluded { reason: String },
    /// No reasoning backend is configured.
    Disabled,
}

impl ReasoningOutcome {
    pub fn status(&self) -> ReasoningStatus {
        match self {
            ReasoningOutcome::Scored { status, .. } => *status,
            ReasoningOutcome::Excluded { .. } => ReasoningStatus::Excluded,
            ReasoningOutcome::Disabled => ReasoningStatus::Disabled,
        }
    }

    pub fn signal(&self) -> Option<&ReasoningSignal> {
        match self {
            ReasoningOutcome::Scored { signal, .. } => Some(signal),
            _ => None,
        }
    }

    pub fn into_signal(self) -> Option<ReasoningSignal> {
        match self {
            ReasoningOutcome::Scored { signal, .. } => Some(signal),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawJudgement {
    score: serde_json::Value,
    #[serde(default)]
    rationale: String,
}

pub struct ReasoningAnalyzer {
    backend: Arc<dyn ReasoningBackend>,
    policy: ReasoningPolicy,
    limiter: Arc<RateLimiter>,
    cache: Arc<ContentCache<ReasoningSignal>>,
    max_rationale_chars: usize,
}

impl ReasoningAnalyzer {
    pub fn new(backend: Arc<dyn ReasoningBackend>, config: &ReasoningConfig) -> Self {
        let policy = ReasoningPolicy::from_config(config);
        let cache = if config.cache_enabled {
            ContentCache::new(
                Duration::from_secs(config.cache_ttl_secs),
                config.cache_max_entries,
            )
        } else {
            ContentCache::disabled()
        };

        Self {
            backend,
            limiter: Arc::new(RateLimiter::from_policy(&policy)),
            policy,
            cache: Arc::new(cache),
            max_rationale_chars: config.max_rationale_chars,
        }
    }

    pub fn with_policy(mut self, policy: ReasoningPolicy) -> Self {
        self.limiter = Arc::new(RateLimiter::from_policy(&policy));
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ReasoningPolicy {
        &self.policy
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Calls currently holding a concurrency slot.
    pub fn in_flight(&self) -> usize {
        self.limiter.in_flight()
    }

    /// Never fails: exhausted retries resolve through the fallback policy.
    pub async fn analyze(
        &self,
        resume: &ResumeDocument,
        requirement: &JobRequirement,
        job_text: &str,
    ) -> ReasoningOutcome {
        let key = content_hash(&[
            &content_hash(&[resume.cleaned_text()]),
            &content_hash(&[job_text]),
            self.backend.model_id(),
        ]);

        if let Some(mut signal) = self.cache.get(&key) {
            debug!("Reasoning cache hit for {}", &key[..12]);
            signal.cached = true;
            return ReasoningOutcome::Scored {
                signal,
                status: ReasoningStatus::Cached,
            };
        }

        match self.call_with_retries(resume, requirement, job_text).await {
            Ok(signal) => {
                self.cache.insert(key, signal.clone());
                ReasoningOutcome::Scored {
                    signal,
                    status: ReasoningStatus::Fresh,
                }
            }
            Err(e) => self.fall_back(e),
        }
    }

    async fn call_with_retries(
        &self,
        resume: &ResumeDocument,
        requirement: &JobRequirement,
        job_text: &str,
    ) -> Result<ReasoningSignal> {
        let request = build_relevance_request(resume.cleaned_text(), requirement, job_text);
        let mut last_error = RelevanceError::Reasoning("no attempt made".to_string());

        for attempt in 1..=self.policy.max_attempts {
            if attempt > 1 {
                let delay = self.policy.backoff_for(attempt - 1);
                warn!(
                    "Reasoning attempt {} failed ({}), retrying after {}ms...",
                    attempt - 1,
                    last_error,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let _permit = self.limiter.acquire().await?;
            let reply = match tokio::time::timeout(self.policy.timeout, self.backend.reason(&request))
                .await
            {
                Ok(reply) => reply,
                Err(_) => Err(RelevanceError::ReasoningTransientFailure(format!(
                    "no reply within {:?}",
                    self.policy.timeout
                ))),
            };

            let outcome = reply.and_then(|text| {
                parse_reasoning_response(&text, self.max_rationale_chars)
            });
            match outcome {
                Ok((score, rationale)) => {
                    return Ok(ReasoningSignal {
                        score,
                        rationale,
                        degraded: false,
                        cached: false,
                    })
                }
                Err(e) if e.is_transient() => last_error = e,
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    fn fall_back(&self, error: RelevanceError) -> ReasoningOutcome {
        match self.policy.fallback {
            Fallback::Exclude => {
                warn!("Reasoning signal excluded: {}", error);
                ReasoningOutcome::Excluded {
                    reason: error.to_string(),
                }
            }
            Fallback::Neutral { score } => {
                warn!("Reasoning degraded to neutral score {}: {}", score, error);
                ReasoningOutcome::Scored {
                    signal: ReasoningSignal {
                        score: score.clamp(0.0, 100.0),
                        rationale: String::new(),
                        degraded: true,
                        cached: false,
                    },
                    status: ReasoningStatus::Degraded,
                }
            }
        }
    }
}

/// Parse a `{"score": .., "rationale": ..}` reply. Code fences and chatter
/// around the outermost object are ignored; the score must be a finite
/// number in [0, 100]. The rationale is cut to `max_rationale_chars`.
pub fn parse_reasoning_response(reply: &str, max_rationale_chars: usize) -> Result<(f64, String)> {
    let text = strip_json_fences(reply);
    let object = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(RelevanceError::ReasoningMalformedResponse(
                "reply contains no JSON object".to_string(),
            ))
        }
    };

    let raw: RawJudgement = serde_json::from_str(object)
        .map_err(|e| RelevanceError::ReasoningMalformedResponse(format!("invalid JSON: {e}")))?;

    let score = match &raw.score {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|score| score.is_finite() && (0.0..=100.0).contains(score))
    .ok_or_else(|| {
        RelevanceError::ReasoningMalformedResponse(format!("score out of range: {}", raw.score))
    })?;

    let rationale = truncate_chars(raw.rationale.trim(), max_rationale_chars);
    Ok((score, rationale))
}

fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => stripped
            .trim_start()
            .strip_suffix("```")
            .map(str::trim)
            .unwrap_or(stripped.trim_start()),
        None => text,
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => text[..index].trim_end().to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FallbackPolicy;
    use crate::llm::client::ReasoningRequest;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays scripted replies; repeats the last one when the script runs out.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<String>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReasoningBackend for ScriptedBackend {
        async fn reason(&self, _request: &ReasoningRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock();
            match replies.len() {
                0 => Err(RelevanceError::Reasoning("script exhausted".to_string())),
                1 => clone_reply(&replies[0]),
                _ => replies.pop_front().unwrap_or_else(|| Ok(String::new())),
            }
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    struct HangingBackend;

    #[async_trait]
    impl ReasoningBackend for HangingBackend {
        async fn reason(&self, _request: &ReasoningRequest) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(r#"{"score": 10, "rationale": "late"}"#.to_string())
        }

        fn model_id(&self) -> &str {
            "hanging"
        }
    }

    fn clone_reply(reply: &Result<String>) -> Result<String> {
        match reply {
            Ok(text) => Ok(text.clone()),
            Err(RelevanceError::ReasoningTransientFailure(msg)) => {
                Err(RelevanceError::ReasoningTransientFailure(msg.clone()))
            }
            Err(e) => Err(RelevanceError::Reasoning(e.to_string())),
        }
    }

    fn resume() -> ResumeDocument {
        ResumeDocument::from_text("Jane Doe\nSkills: Python, SQL, Docker", 5).unwrap()
    }

    fn requirement() -> JobRequirement {
        JobRequirement::new("Data Engineer", &["python", "sql", "aws"], &[])
    }

    const GOOD_REPLY: &str = r#"{"score": 72, "rationale": "Solid Python. Consider adding AWS projects."}"#;

    #[test]
    fn test_parse_plain_and_fenced_replies() {
        let (score, rationale) = parse_reasoning_response(GOOD_REPLY, 600).unwrap();
        assert_eq!(score, 72.0);
        assert!(rationale.starts_with("Solid Python"));

        let fenced = format!("```json\n{GOOD_REPLY}\n```");
        assert_eq!(parse_reasoning_response(&fenced, 600).unwrap().0, 72.0);

        let chatty = format!("Sure! Here is the result: {GOOD_REPLY} Hope it helps.");
        assert_eq!(parse_reasoning_response(&chatty, 600).unwrap().0, 72.0);

        let quoted = r#"{"score": "64.5", "rationale": "ok"}"#;
        assert_eq!(parse_reasoning_response(quoted, 600).unwrap().0, 64.5);
    }

    #[test]
    fn test_parse_rejects_malformed_replies() {
        for reply in [
            "no json here",
            r#"{"score": 120, "rationale": "too high"}"#,
            r#"{"score": -1}"#,
            r#"{"score": "high"}"#,
            r#"{"rationale": "no score"}"#,
            "{not json}",
        ] {
            let err = parse_reasoning_response(reply, 600).unwrap_err();
            assert!(
                matches!(err, RelevanceError::ReasoningMalformedResponse(_)),
                "accepted {reply:?}"
            );
        }
    }

    #[test]
    fn test_rationale_truncated_at_char_boundary() {
        let reply = format!(r#"{{"score": 50, "rationale": "{}"}}"#, "é".repeat(700));
        let (_, rationale) = parse_reasoning_response(&reply, 600).unwrap();
        assert_eq!(rationale.chars().count(), 600);
    }

    #[tokio::test]
    async fn test_fresh_then_cached() {
        let backend = ScriptedBackend::new(vec![Ok(GOOD_REPLY.to_string())]);
        let analyzer = ReasoningAnalyzer::new(backend.clone(), &ReasoningConfig::default());

        let first = analyzer.analyze(&resume(), &requirement(), "job text").await;
        let second = analyzer.analyze(&resume(), &requirement(), "job text").await;

        assert_eq!(first.status(), ReasoningStatus::Fresh);
        assert_eq!(second.status(), ReasoningStatus::Cached);
        assert_eq!(first.signal().unwrap().score, second.signal().unwrap().score);
        assert!(second.signal().unwrap().cached);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(RelevanceError::ReasoningTransientFailure("503".to_string())),
            Ok(GOOD_REPLY.to_string()),
        ]);
        let analyzer = ReasoningAnalyzer::new(backend.clone(), &ReasoningConfig::default());

        let outcome = analyzer.analyze(&resume(), &requirement(), "job").await;
        assert_eq!(outcome.status(), ReasoningStatus::Fresh);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_replies_exhaust_and_exclude() {
        let backend = ScriptedBackend::new(vec![Ok("I think the candidate is great".to_string())]);
        let analyzer = ReasoningAnalyzer::new(backend.clone(), &ReasoningConfig::default());

        let outcome = analyzer.analyze(&resume(), &requirement(), "job").await;
        assert_eq!(outcome.status(), ReasoningStatus::Excluded);
        assert!(outcome.signal().is_none());
        assert_eq!(backend.calls(), 3);

        // Failures are not cached
        analyzer.analyze(&resume(), &requirement(), "job").await;
        assert_eq!(backend.calls(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let backend = ScriptedBackend::new(vec![Err(RelevanceError::Reasoning(
            "401 unauthorized".to_string(),
        ))]);
        let analyzer = ReasoningAnalyzer::new(backend.clone(), &ReasoningConfig::default());

        let outcome = analyzer.analyze(&resume(), &requirement(), "job").await;
        assert_eq!(outcome.status(), ReasoningStatus::Excluded);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_neutral_fallback_is_degraded() {
        let config = ReasoningConfig {
            fallback: FallbackPolicy::Neutral,
            ..ReasoningConfig::default()
        };
        let analyzer = ReasoningAnalyzer::new(Arc::new(HangingBackend), &config);

        let outcome = analyzer.analyze(&resume(), &requirement(), "job").await;
        assert_eq!(outcome.status(), ReasoningStatus::Degraded);
        let signal = outcome.signal().unwrap();
        assert_eq!(signal.score, 50.0);
        assert!(signal.degraded);
    }
}
