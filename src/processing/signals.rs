//! The three independently computed match signals

use crate::processing::hard_matcher::HardEvidence;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Hard,
    Semantic,
    Reasoning,
}

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [SignalKind::Hard, SignalKind::Semantic, SignalKind::Reasoning];
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalKind::Hard => "hard",
            SignalKind::Semantic => "semantic",
            SignalKind::Reasoning => "reasoning",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardSignal {
    pub score: f64,
    pub evidence: HardEvidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticSignal {
    pub score: f64,
    /// Raw cosine similarity in [-1, 1] before calibration.
    pub similarity: f64,
    pub model_id: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningSignal {
    pub score: f64,
    pub rationale: String,
    /// Set when `score` is a neutral substitute after the backend failed.
    pub degraded: bool,
    pub cached: bool,
}

/// One sub-score with its evidence. Every score is within [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MatchSignal {
    Hard(HardSignal),
    Semantic(SemanticSignal),
    Reasoning(ReasoningSignal),
}

impl MatchSignal {
    pub fn kind(&self) -> SignalKind {
        match self {
            MatchSignal::Hard(_) => SignalKind::Hard,
            MatchSignal::Semantic(_) => SignalKind::Semantic,
            MatchSignal::Reasoning(_) => SignalKind::Reasoning,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            MatchSignal::Hard(signal) => signal.score,
            MatchSignal::Semantic(signal) => signal.score,
            MatchSignal::Reasoning(signal) => signal.score,
        }
    }
}

impl From<HardSignal> for MatchSignal {
    fn from(signal: HardSignal) -> Self {
        MatchSignal::Hard(signal)
    }
}

impl From<SemanticSignal> for MatchSignal {
    fn from(signal: SemanticSignal) -> Self {
        MatchSignal::Semantic(signal)
    }
}

impl From<ReasoningSignal> for MatchSignal {
    fn from(signal: ReasoningSignal) -> Self {
        MatchSignal::Reasoning(signal)
    }
}

/// Clip a score into [0, 100]; NaN becomes 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(120.0), 100.0);
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(42.5), 42.5);
    }

    #[test]
    fn test_signal_kind_and_score() {
        let signal = MatchSignal::from(SemanticSignal {
            score: 61.0,
            similarity: 0.58,
            model_id: "hashing-256".to_string(),
            dimension: 256,
        });
        assert_eq!(signal.kind(), SignalKind::Semantic);
        assert_eq!(signal.score(), 61.0);

        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["kind"], "semantic");
    }
}
