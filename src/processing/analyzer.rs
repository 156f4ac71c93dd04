//! Analysis engine: drives the three signal producers for one resume/job pair

use crate::cache::content_hash;
use crate::config::{Config, UnavailablePolicy};
use crate::error::Result;
use crate::llm::analyzer::{ReasoningAnalyzer, ReasoningOutcome};
use crate::llm::client::{OpenRouterBackend, ReasoningBackend};
use crate::processing::aggregator::{AggregationInput, MatchResult, ScoreAggregator, SemanticStatus};
use crate::processing::document::ResumeDocument;
use crate::processing::embeddings::{backend_from_config, EmbeddingBackend};
use crate::processing::hard_matcher::HardMatcher;
use crate::processing::requirements::{JobRequirement, RequirementExtractor};
use crate::processing::semantic::SemanticMatcher;
use crate::processing::text_processor::TextProcessor;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

/// A job prepared once and shared by every resume it is scored against.
#[derive(Debug, Clone)]
pub struct JobContext {
    text: String,
    requirement: JobRequirement,
    content_hash: String,
}

impl JobContext {
    pub fn new(text: &str, requirement: JobRequirement) -> Self {
        let text = TextProcessor::new().clean_text(text);
        let content_hash = content_hash(&[&text]);
        Self {
            text,
            requirement,
            content_hash,
        }
    }

    /// For a job that arrives already structured; the text used for the
    /// semantic and reasoning signals is rendered from the requirement.
    pub fn from_requirement(requirement: JobRequirement) -> Self {
        let mut lines = vec![requirement.role_title.clone()];
        if let Some(company) = &requirement.company {
            lines.push(company.clone());
        }
        if !requirement.must_have.is_empty() {
            lines.push(format!("Required: {}", requirement.must_have.join(", ")));
        }
        if !requirement.good_to_have.is_empty() {
            lines.push(format!("Preferred: {}", requirement.good_to_have.join(", ")));
        }
        lines.extend(requirement.qualifications.iter().cloned());
        lines.extend(requirement.responsibilities.iter().cloned());
        if let Some(years) = requirement.min_experience_years {
            lines.push(format!("{years}+ years of experience"));
        }
        Self::new(&lines.join("\n"), requirement)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn requirement(&self) -> &JobRequirement {
        &self.requirement
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

pub struct AnalysisEngine {
    extractor: RequirementExtractor,
    hard: HardMatcher,
    semantic: Option<SemanticMatcher>,
    reasoning: Option<ReasoningAnalyzer>,
    aggregator: ScoreAggregator,
    config: Config,
}

impl AnalysisEngine {
    /// Lexical matching only; attach backends with `with_semantic` and
    /// `with_reasoning`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: RequirementExtractor::new(config.extraction.min_job_chars)?,
            hard: HardMatcher::new(config.matching.clone()),
            semantic: None,
            reasoning: None,
            aggregator: ScoreAggregator::new(config.scoring.clone()),
            config,
        })
    }

    /// Build the backends named in the configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let mut engine = Self::new(config)?;

        match backend_from_config(&engine.config.semantic) {
            Ok(backend) => engine = engine.with_semantic(backend),
            Err(e) if engine.config.semantic.on_unavailable == UnavailablePolicy::Degrade => {
                warn!("Semantic matching disabled: {}", e);
            }
            Err(e) => return Err(e),
        }

        if engine.config.reasoning.enabled {
            match OpenRouterBackend::from_config(&engine.config.reasoning) {
                Ok(backend) => engine = engine.with_reasoning(Arc::new(backend)),
                Err(e) => warn!("Reasoning disabled: {}", e),
            }
        }

        Ok(engine)
    }

    pub fn with_hard_matcher(mut self, hard: HardMatcher) -> Self {
        self.hard = hard;
        self
    }

    pub fn with_semantic(mut self, backend: Arc<dyn EmbeddingBackend>) -> Self {
        info!("Semantic matching with {}", backend.model_id());
        self.semantic = Some(SemanticMatcher::new(backend, &self.config.semantic));
        self
    }

    pub fn with_reasoning(mut self, backend: Arc<dyn ReasoningBackend>) -> Self {
        info!("Reasoning with {}", backend.model_id());
        self.reasoning = Some(ReasoningAnalyzer::new(backend, &self.config.reasoning));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn reasoning(&self) -> Option<&ReasoningAnalyzer> {
        self.reasoning.as_ref()
    }

    pub fn semantic(&self) -> Option<&SemanticMatcher> {
        self.semantic.as_ref()
    }

    pub fn extract_requirements(&self, job_text: &str) -> Result<JobRequirement> {
        self.extractor.extract(job_text)
    }

    pub fn prepare_job(&self, job_text: &str) -> Result<JobContext> {
        let requirement = self.extractor.extract(job_text)?;
        Ok(JobContext::new(job_text, requirement))
    }

    pub fn parse_resume(&self, resume_text: &str) -> Result<ResumeDocument> {
        ResumeDocument::from_text(resume_text, self.config.extraction.min_resume_chars)
    }

    /// Score one resume. Hard matching runs inline; the semantic and
    /// reasoning signals run concurrently.
    pub async fn analyze(&self, resume: &ResumeDocument, job: &JobContext) -> Result<MatchResult> {
        let start_time = Instant::now();
        let hard = self.hard.evaluate(resume, job.requirement());

        let semantic_future = async {
            match &self.semantic {
                Some(matcher) => Some(matcher.evaluate(resume.cleaned_text(), job.text()).await),
                None => None,
            }
        };
        let reasoning_future = async {
            match &self.reasoning {
                Some(analyzer) => analyzer.analyze(resume, job.requirement(), job.text()).await,
                None => ReasoningOutcome::Disabled,
            }
        };
        let (semantic, reasoning) = tokio::join!(semantic_future, reasoning_future);

        let (semantic, semantic_status) = match semantic {
            Some(Ok(signal)) => (Some(signal), SemanticStatus::Scored),
            Some(Err(e)) => match self.config.semantic.on_unavailable {
                UnavailablePolicy::Degrade => {
                    warn!("Semantic signal unavailable, continuing without it: {}", e);
                    (None, SemanticStatus::Unavailable)
                }
                UnavailablePolicy::Abort => return Err(e),
            },
            None => (None, SemanticStatus::Unavailable),
        };

        let result = self.aggregator.aggregate(AggregationInput {
            requirement: job.requirement(),
            hard: Some(hard),
            semantic,
            semantic_status,
            reasoning,
            candidate_name: resume.candidate_name().map(str::to_string),
        })?;

        debug!(
            "Scored {} against '{}': {:.1} ({}) in {:.2?}",
            resume.candidate_name().unwrap_or("resume"),
            job.requirement().role_title,
            result.score,
            result.verdict,
            start_time.elapsed()
        );
        Ok(result)
    }

    /// Convenience wrapper for one pair of raw texts.
    pub async fn analyze_text(&self, resume_text: &str, job_text: &str) -> Result<MatchResult> {
        let job = self.prepare_job(job_text)?;
        let resume = self.parse_resume(resume_text)?;
        self.analyze(&resume, &job).await
    }
}
