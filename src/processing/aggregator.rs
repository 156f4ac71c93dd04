//! Weighted fusion of the match signals into one explained result

use crate::config::ScoringConfig;
use crate::error::{RelevanceError, Result};
use crate::llm::analyzer::{ReasoningOutcome, ReasoningStatus};
use crate::processing::hard_matcher::{HardEvidence, MatchType};
use crate::processing::normalize::mentions_any_skill;
use crate::processing::requirements::JobRequirement;
use crate::processing::signals::{
    clamp_score, HardSignal, MatchSignal, SemanticSignal, SignalKind,
};
use crate::processing::text_processor::TextProcessor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

const MAX_MUST_HAVE_RECOMMENDATIONS: usize = 5;
const ADVICE_CUES: &[&str] = &["consider", "should", "lack", "missing", "improve"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    High,
    Medium,
    Low,
}

impl Verdict {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            Verdict::High
        } else if score >= 40.0 {
            Verdict::Medium
        } else {
            Verdict::Low
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verdict::High => "High",
            Verdict::Medium => "Medium",
            Verdict::Low => "Low",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticStatus {
    Scored,
    Unavailable,
}

impl fmt::Display for SemanticStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticStatus::Scored => write!(f, "scored"),
            SemanticStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeight {
    pub kind: SignalKind,
    pub weight: f64,
}

/// The explained outcome for one resume/job pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub candidate_name: Option<String>,
    pub role_title: String,
    pub score: f64,
    pub verdict: Verdict,
    pub confidence: f64,
    /// Requirement order.
    pub missing_must_have: Vec<String>,
    pub missing_good_to_have: Vec<String>,
    pub matched_skills: Vec<String>,
    pub recommendations: Vec<String>,
    pub signals: Vec<MatchSignal>,
    pub weights: Vec<SignalWeight>,
    pub semantic_status: SemanticStatus,
    pub reasoning_status: ReasoningStatus,
    pub analyzed_at: DateTime<Utc>,
}

impl MatchResult {
    pub fn signal(&self, kind: SignalKind) -> Option<&MatchSignal> {
        self.signals.iter().find(|signal| signal.kind() == kind)
    }

    pub fn weight(&self, kind: SignalKind) -> Option<f64> {
        self.weights.iter().find(|w| w.kind == kind).map(|w| w.weight)
    }

    pub fn hard_evidence(&self) -> Option<&HardEvidence> {
        self.signals.iter().find_map(|signal| match signal {
            MatchSignal::Hard(hard) => Some(&hard.evidence),
            _ => None,
        })
    }

    pub fn rationale(&self) -> Option<&str> {
        self.signals.iter().find_map(|signal| match signal {
            MatchSignal::Reasoning(reasoning) if !reasoning.rationale.is_empty() => {
                Some(reasoning.rationale.as_str())
            }
            _ => None,
        })
    }

    /// Missing must-have skills followed by missing good-to-have skills.
    pub fn gaps(&self) -> impl Iterator<Item = &str> {
        self.missing_must_have
            .iter()
            .chain(&self.missing_good_to_have)
            .map(String::as_str)
    }
}

/// Everything the aggregator needs for one pair.
pub struct AggregationInput<'a> {
    pub requirement: &'a JobRequirement,
    pub hard: Option<HardSignal>,
    pub semantic: Option<SemanticSignal>,
    pub semantic_status: SemanticStatus,
    pub reasoning: ReasoningOutcome,
    pub candidate_name: Option<String>,
}

pub struct ScoreAggregator {
    config: ScoringConfig,
    processor: TextProcessor,
}

impl ScoreAggregator {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            processor: TextProcessor::new(),
        }
    }

    pub fn aggregate(&self, input: AggregationInput<'_>) -> Result<MatchResult> {
        let AggregationInput {
            requirement,
            hard,
            semantic,
            semantic_status,
            reasoning,
            candidate_name,
        } = input;

        let reasoning_status = reasoning.status();
        let mut signals: Vec<MatchSignal> = Vec::with_capacity(3);
        if let Some(hard) = hard {
            signals.push(hard.into());
        }
        if let Some(semantic) = semantic {
            signals.push(semantic.into());
        }
        if let Some(reasoning) = reasoning.into_signal() {
            signals.push(reasoning.into());
        }

        if signals.is_empty() {
            return Err(RelevanceError::AggregationInputEmpty);
        }

        let available: Vec<SignalKind> = signals.iter().map(MatchSignal::kind).collect();
        let weights = effective_weights(&self.config, &available)?;
        let score = clamp_score(
            signals
                .iter()
                .zip(&weights)
                .map(|(signal, weight)| weight.weight * signal.score())
                .sum(),
        );

        let hard_score = signals.iter().find_map(|s| match s {
            MatchSignal::Hard(h) => Some(h.score),
            _ => None,
        });
        let semantic_score = signals.iter().find_map(|s| match s {
            MatchSignal::Semantic(sem) => Some(sem.score),
            _ => None,
        });
        let confidence = confidence(hard_score, semantic_score);

        let evidence = signals.iter().find_map(|s| match s {
            MatchSignal::Hard(h) => Some(&h.evidence),
            _ => None,
        });
        let rationale = signals.iter().find_map(|s| match s {
            MatchSignal::Reasoning(r) => Some(r.rationale.as_str()),
            _ => None,
        });
        let recommendations = self.recommendations(requirement, evidence, rationale);

        let (missing_must_have, missing_good_to_have, matched_skills) = match evidence {
            Some(evidence) => (
                evidence.missing_must_have.clone(),
                evidence.missing_good_to_have.clone(),
                evidence.matched_skills().map(str::to_string).collect(),
            ),
            None => (Vec::new(), Vec::new(), Vec::new()),
        };

        Ok(MatchResult {
            candidate_name,
            role_title: requirement.role_title.clone(),
            score,
            verdict: Verdict::from_score(score),
            confidence,
            missing_must_have,
            missing_good_to_have,
            matched_skills,
            recommendations,
            signals,
            weights,
            semantic_status,
            reasoning_status,
            analyzed_at: Utc::now(),
        })
    }

    fn recommendations(
        &self,
        requirement: &JobRequirement,
        evidence: Option<&HardEvidence>,
        rationale: Option<&str>,
    ) -> Vec<String> {
        // Each candidate carries the text checked against present skills;
        // lines built from the gap lists name only missing skills and carry none.
        let mut candidates: Vec<(String, Option<String>)> = Vec::new();
        let mut fuzzy_advice = None;

        if let Some(evidence) = evidence {
            for skill in evidence
                .missing_must_have
                .iter()
                .take(MAX_MUST_HAVE_RECOMMENDATIONS)
            {
                candidates.push((
                    format!(
                        "Add concrete evidence of {skill}; it is a must-have for the {} role.",
                        requirement.role_title
                    ),
                    None,
                ));
            }

            if !evidence.missing_good_to_have.is_empty() {
                candidates.push((
                    format!(
                        "Consider highlighting any exposure to {}, which the role lists as nice to have.",
                        evidence.missing_good_to_have.join(", ")
                    ),
                    None,
                ));
            }

            if let Some(experience) = evidence.experience.as_ref().filter(|e| !e.met) {
                let found = experience
                    .resume_years
                    .map(|years| format!("about {years} years were found"))
                    .unwrap_or_else(|| "no duration could be found".to_string());
                candidates.push((
                    format!(
                        "The role asks for at least {} years of experience and {found}; state dates and durations explicitly.",
                        experience.required_years
                    ),
                    None,
                ));
            }

            for check in evidence.qualifications.iter().filter(|q| !q.met) {
                candidates.push((
                    format!("Address the qualification requirement: {}.", check.requirement),
                    Some(check.requirement.clone()),
                ));
            }

            let fuzzy: Vec<String> = evidence
                .fuzzy_matches()
                .map(|m| format!("{} (resume says \"{}\")", m.skill, m.resume_term))
                .collect();
            if !fuzzy.is_empty() {
                fuzzy_advice = Some(format!(
                    "Use the job's exact wording for {} so keyword screening recognizes it.",
                    fuzzy.join(", ")
                ));
            }
        }

        if let Some(rationale) = rationale {
            for sentence in self.processor.split_sentences(rationale) {
                let lower = sentence.to_lowercase();
                if ADVICE_CUES.iter().any(|cue| lower.contains(cue)) {
                    candidates.push((sentence.clone(), Some(sentence)));
                }
            }
        }

        let present: HashSet<String> = evidence
            .map(|e| {
                e.matches
                    .iter()
                    .filter(|m| m.match_type == MatchType::Exact)
                    .map(|m| m.skill.clone())
                    .collect()
            })
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let mut recommendations = Vec::new();
        for (candidate, subject) in candidates {
            if subject.is_some_and(|text| mentions_any_skill(&text, &present)) {
                continue;
            }
            if seen.insert(candidate.to_lowercase()) {
                recommendations.push(candidate);
            }
        }
        if let Some(advice) = fuzzy_advice {
            if seen.insert(advice.to_lowercase()) {
                recommendations.push(advice);
            }
        }

        recommendations
    }
}

/// Redistribute configured weights over the available signals, in the
/// order given. The last weight is the complement of the others so the
/// weights sum to exactly 1.0.
pub fn effective_weights(config: &ScoringConfig, available: &[SignalKind]) -> Result<Vec<SignalWeight>> {
    if available.is_empty() {
        return Err(RelevanceError::AggregationInputEmpty);
    }

    let configured = |kind: SignalKind| match kind {
        SignalKind::Hard => config.hard_weight,
        SignalKind::Semantic => config.semantic_weight,
        SignalKind::Reasoning => config.reasoning_weight,
    };
    let total: f64 = available.iter().map(|kind| configured(*kind)).sum();

    let mut weights = Vec::with_capacity(available.len());
    let mut assigned = 0.0;
    for (index, kind) in available.iter().enumerate() {
        let weight = if index + 1 == available.len() {
            1.0 - assigned
        } else if total > 0.0 {
            configured(*kind) / total
        } else {
            1.0 / available.len() as f64
        };
        assigned += weight;
        weights.push(SignalWeight { kind: *kind, weight });
    }
    Ok(weights)
}

/// Agreement between the lexical and semantic views, in [0, 1].
pub fn confidence(hard: Option<f64>, semantic: Option<f64>) -> f64 {
    match (hard, semantic) {
        (Some(h), Some(s)) => (1.0 - (h - s).abs() / 100.0).clamp(0.0, 1.0),
        (Some(_), None) | (None, Some(_)) => 0.5,
        (None, None) => 0.25,
    }
}
