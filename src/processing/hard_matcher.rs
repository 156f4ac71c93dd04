//! Lexical ("hard") matching of resume text against job requirements
//!
//! Exact matching intersects normalized resume n-grams with the requirement
//! skills; fuzzy matching catches spelling variants with a normalized
//! Levenshtein ratio. Qualifications and experience are validated
//! separately. Evaluation is a pure function of the resume, the requirement
//! and the matcher settings.

use crate::config::MatchingConfig;
use crate::processing::document::{ResumeDocument, SectionType};
use crate::processing::normalize::{contains_term, normalize_skill, word_tokens};
use crate::processing::requirements::JobRequirement;
use crate::processing::signals::{clamp_score, HardSignal};
use chrono::Datelike;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strsim::normalized_levenshtein;

/// Resume n-grams always cover at least this many words; longer
/// requirement skills raise the limit for their evaluation.
const MIN_NGRAM: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillPriority {
    MustHave,
    GoodToHave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub skill: String,
    pub priority: SkillPriority,
    pub match_type: MatchType,
    /// The resume wording that satisfied the skill.
    pub resume_term: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualificationCheck {
    pub requirement: String,
    pub met: bool,
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceCheck {
    pub required_years: f64,
    pub resume_years: Option<f64>,
    pub met: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardEvidence {
    pub matches: Vec<SkillMatch>,
    pub missing_must_have: Vec<String>,
    pub missing_good_to_have: Vec<String>,
    pub must_have_coverage: f64,
    pub good_to_have_coverage: f64,
    pub qualifications: Vec<QualificationCheck>,
    pub experience: Option<ExperienceCheck>,
    pub qualification_adjustment: f64,
    pub experience_penalty: f64,
}

impl HardEvidence {
    pub fn matched_skills(&self) -> impl Iterator<Item = &str> {
        self.matches.iter().map(|m| m.skill.as_str())
    }

    pub fn fuzzy_matches(&self) -> impl Iterator<Item = &SkillMatch> {
        self.matches
            .iter()
            .filter(|m| m.match_type == MatchType::Fuzzy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DegreeLevel {
    Associate,
    Bachelor,
    Master,
    Doctorate,
}

impl DegreeLevel {
    fn label(self) -> &'static str {
        match self {
            DegreeLevel::Associate => "associate degree",
            DegreeLevel::Bachelor => "bachelor's degree",
            DegreeLevel::Master => "master's degree",
            DegreeLevel::Doctorate => "doctorate",
        }
    }
}

/// Resume-side view used during one evaluation.
struct ResumeTerms {
    tokens: Vec<String>,
    /// normalized n-gram -> first surface form
    exact: HashMap<String, String>,
    /// (word count, normalized, surface) in text order
    candidates: Vec<(usize, String, String)>,
}

impl ResumeTerms {
    fn build(text: &str, max_ngram: usize) -> Self {
        let tokens = word_tokens(text);
        let mut exact = HashMap::new();
        let mut candidates = Vec::new();

        // Shorter windows first so a bare token wins the surface form over
        // a window that only adds filler ("with postgres").
        for n in 1..=max_ngram {
            for window in tokens.windows(n) {
                let surface = window.join(" ");
                let normalized = normalize_skill(&surface);
                if normalized.is_empty() || exact.contains_key(&normalized) {
                    continue;
                }
                exact.insert(normalized.clone(), surface.clone());
                candidates.push((normalized.split_whitespace().count(), normalized, surface));
            }
        }

        Self {
            tokens,
            exact,
            candidates,
        }
    }
}

pub struct HardMatcher {
    config: MatchingConfig,
    reference_year: i32,
    explicit_years_regex: Regex,
    year_range_regex: Regex,
    degree_patterns: Vec<(DegreeLevel, Regex)>,
    /// A bare "degree" counts as a bachelor's only when no level is named.
    generic_degree: Regex,
}

impl HardMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self::with_reference_year(config, chrono::Utc::now().year())
    }

    /// `reference_year` resolves open-ended ranges such as "2021 - present".
    pub fn with_reference_year(config: MatchingConfig, reference_year: i32) -> Self {
        let degree_patterns = vec![
            (
                DegreeLevel::Doctorate,
                Regex::new(r"(?i)\b(?:ph\.?\s?d|doctorate|doctoral)\b").expect("valid degree regex"),
            ),
            (
                DegreeLevel::Master,
                Regex::new(r"(?i)\b(?:master'?s?|m\.sc?|msc|m\.?tech|mba|m\.eng|meng)\b")
                    .expect("valid degree regex"),
            ),
            (
                DegreeLevel::Bachelor,
                Regex::new(r"(?i)\b(?:bachelor'?s?|b\.sc?|bsc|bs|b\.?tech|b\.e|b\.a|undergraduate)\b")
                    .expect("valid degree regex"),
            ),
            (
                DegreeLevel::Associate,
                Regex::new(r"(?i)\bassociate'?s?\s+degree\b").expect("valid degree regex"),
            ),
        ];

        Self {
            config,
            reference_year,
            explicit_years_regex: Regex::new(r"(?i)\b(\d{1,2}(?:\.\d+)?)\s*\+?\s*(?:years?|yrs?)\b")
                .expect("valid years regex"),
            year_range_regex: Regex::new(
                r"(?i)\b((?:19|20)\d{2})\s*(?:-|–|to)\s*((?:19|20)\d{2}|present|current|now|today)\b",
            )
            .expect("valid range regex"),
            degree_patterns,
            generic_degree: Regex::new(r"(?i)\bdegree\b").expect("valid degree regex"),
        }
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn evaluate(&self, resume: &ResumeDocument, requirement: &JobRequirement) -> HardSignal {
        let longest_skill = requirement
            .must_have
            .iter()
            .chain(&requirement.good_to_have)
            .map(|skill| word_tokens(skill).len())
            .max()
            .unwrap_or(0);
        let terms = ResumeTerms::build(resume.cleaned_text(), longest_skill.max(MIN_NGRAM));

        let mut matches = Vec::new();
        let mut missing_must_have = Vec::new();
        let mut missing_good_to_have = Vec::new();

        for (skills, priority) in [
            (&requirement.must_have, SkillPriority::MustHave),
            (&requirement.good_to_have, SkillPriority::GoodToHave),
        ] {
            for skill in skills {
                match self.match_skill(skill, priority, &terms) {
                    Some(found) => matches.push(found),
                    None if priority == SkillPriority::MustHave => {
                        missing_must_have.push(skill.clone())
                    }
                    None => missing_good_to_have.push(skill.clone()),
                }
            }
        }

        let must_have_coverage =
            self.coverage(&matches, SkillPriority::MustHave, requirement.must_have.len());
        let good_to_have_coverage =
            self.coverage(&matches, SkillPriority::GoodToHave, requirement.good_to_have.len());

        // A requirement without skills leaves nothing uncovered.
        let coverage_score = 100.0
            * match (
                requirement.must_have.is_empty(),
                requirement.good_to_have.is_empty(),
            ) {
                (false, false) => {
                    self.config.must_have_share * must_have_coverage
                        + self.config.good_to_have_share * good_to_have_coverage
                }
                (false, true) => must_have_coverage,
                (true, false) => good_to_have_coverage,
                (true, true) => 1.0,
            };

        let qualifications = self.check_qualifications(resume, &terms, &requirement.qualifications);
        let qualification_adjustment = self.qualification_adjustment(&qualifications);

        let experience = requirement
            .min_experience_years
            .map(|required| self.check_experience(resume.cleaned_text(), required));
        let experience_penalty = match &experience {
            Some(check) if !check.met => self.config.experience_penalty,
            _ => 0.0,
        };

        let score = clamp_score(coverage_score + qualification_adjustment - experience_penalty);

        HardSignal {
            score,
            evidence: HardEvidence {
                matches,
                missing_must_have,
                missing_good_to_have,
                must_have_coverage,
                good_to_have_coverage,
                qualifications,
                experience,
                qualification_adjustment,
                experience_penalty,
            },
        }
    }

    fn match_skill(
        &self,
        skill: &str,
        priority: SkillPriority,
        terms: &ResumeTerms,
    ) -> Option<SkillMatch> {
        if let Some(surface) = terms.exact.get(skill) {
            return Some(SkillMatch {
                skill: skill.to_string(),
                priority,
                match_type: MatchType::Exact,
                resume_term: surface.clone(),
                similarity: 1.0,
            });
        }

        if skill.chars().count() < self.config.min_fuzzy_len {
            return None;
        }

        let word_count = skill.split_whitespace().count();
        let mut best: Option<(f64, &str)> = None;
        for (count, normalized, surface) in &terms.candidates {
            if *count != word_count || normalized.chars().count() < self.config.min_fuzzy_len {
                continue;
            }
            let similarity = normalized_levenshtein(skill, normalized);
            if best.map_or(true, |(current, _)| similarity > current) {
                best = Some((similarity, surface.as_str()));
            }
        }

        best.filter(|(similarity, _)| *similarity >= self.config.fuzzy_threshold)
            .map(|(similarity, surface)| SkillMatch {
                skill: skill.to_string(),
                priority,
                match_type: MatchType::Fuzzy,
                resume_term: surface.to_string(),
                similarity,
            })
    }

    fn coverage(&self, matches: &[SkillMatch], priority: SkillPriority, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        let credit: f64 = matches
            .iter()
            .filter(|m| m.priority == priority)
            .map(|m| match m.match_type {
                MatchType::Exact => self.config.exact_weight,
                MatchType::Fuzzy => self.config.fuzzy_weight,
            })
            .sum();
        (credit / total as f64).clamp(0.0, 1.0)
    }

    fn check_qualifications(
        &self,
        resume: &ResumeDocument,
        terms: &ResumeTerms,
        qualifications: &[String],
    ) -> Vec<QualificationCheck> {
        let education_text = resume
            .section_text(SectionType::Education)
            .into_iter()
            .chain(resume.section_text(SectionType::Certifications))
            .collect::<Vec<_>>()
            .join("\n");
        let degree_source = if education_text.is_empty() {
            resume.cleaned_text()
        } else {
            education_text.as_str()
        };
        let resume_degree = self.highest_degree(degree_source);

        qualifications
            .iter()
            .map(|qualification| match self.lowest_degree(qualification) {
                Some(required) => QualificationCheck {
                    requirement: qualification.clone(),
                    met: resume_degree.is_some_and(|held| held >= required),
                    evidence: resume_degree.map(|held| held.label().to_string()),
                },
                None => {
                    let words = significant_words(qualification);
                    let met = !words.is_empty()
                        && words.iter().all(|w| contains_term(&terms.tokens, w));
                    QualificationCheck {
                        requirement: qualification.clone(),
                        met,
                        evidence: met.then(|| words.join(" ")),
                    }
                }
            })
            .collect()
    }

    /// Met qualifications add to the score, unmet ones subtract, scaled so
    /// the total stays within +/- `qualification_bonus`.
    fn qualification_adjustment(&self, checks: &[QualificationCheck]) -> f64 {
        if checks.is_empty() {
            return 0.0;
        }
        let met = checks.iter().filter(|c| c.met).count() as f64;
        let unmet = checks.len() as f64 - met;
        self.config.qualification_bonus * (met - unmet) / checks.len() as f64
    }

    fn degree_levels(&self, text: &str) -> Vec<DegreeLevel> {
        let named: Vec<DegreeLevel> = self
            .degree_patterns
            .iter()
            .filter(|(_, pattern)| pattern.is_match(text))
            .map(|(level, _)| *level)
            .collect();
        if named.is_empty() && self.generic_degree.is_match(text) {
            vec![DegreeLevel::Bachelor]
        } else {
            named
        }
    }

    fn highest_degree(&self, text: &str) -> Option<DegreeLevel> {
        self.degree_levels(text).into_iter().max()
    }

    fn lowest_degree(&self, text: &str) -> Option<DegreeLevel> {
        self.degree_levels(text).into_iter().min()
    }

    fn check_experience(&self, text: &str, required_years: f64) -> ExperienceCheck {
        let resume_years = self.estimate_years(text);
        ExperienceCheck {
            required_years,
            resume_years,
            met: resume_years.is_some_and(|years| years >= required_years),
        }
    }

    /// Larger of the explicit "N years" claims and the span covered by
    /// year ranges.
    pub fn estimate_years(&self, text: &str) -> Option<f64> {
        let explicit = self
            .explicit_years_regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
            .fold(None, |acc: Option<f64>, years| Some(acc.map_or(years, |a| a.max(years))));

        let mut earliest: Option<i32> = None;
        let mut latest: Option<i32> = None;
        for caps in self.year_range_regex.captures_iter(text) {
            let start = caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok());
            let end = caps.get(2).and_then(|m| {
                m.as_str()
                    .parse::<i32>()
                    .ok()
                    .or(Some(self.reference_year))
            });
            if let (Some(start), Some(end)) = (start, end) {
                if end >= start {
                    earliest = Some(earliest.map_or(start, |e| e.min(start)));
                    latest = Some(latest.map_or(end, |l| l.max(end)));
                }
            }
        }
        let span = match (earliest, latest) {
            (Some(start), Some(end)) => Some(f64::from(end - start)),
            _ => None,
        };

        match (explicit, span) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

const QUALIFICATION_FILLER: &[&str] = &[
    "a", "an", "the", "in", "of", "or", "and", "with", "related", "field", "equivalent",
    "similar", "any", "relevant", "preferred", "required", "strong", "valid", "active",
];

fn significant_words(qualification: &str) -> Vec<String> {
    word_tokens(qualification)
        .into_iter()
        .filter(|w| !QUALIFICATION_FILLER.contains(&w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> HardMatcher {
        HardMatcher::with_reference_year(MatchingConfig::default(), 2024)
    }

    fn resume(text: &str) -> ResumeDocument {
        ResumeDocument::from_text(text, 1).unwrap()
    }

    #[test]
    fn test_exact_matching_and_missing_order() {
        let requirement = JobRequirement::new("Data Engineer", &["Python", "SQL", "AWS"], &[]);
        let signal = matcher().evaluate(&resume("Skills\nPython, SQL, Docker"), &requirement);

        let matched: Vec<&str> = signal.evidence.matched_skills().collect();
        assert_eq!(matched, vec!["python", "sql"]);
        assert_eq!(signal.evidence.missing_must_have, vec!["aws"]);
        assert!((signal.score - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_case_invariance() {
        let requirement = JobRequirement::new("Dev", &["python", "docker"], &["kubernetes"]);
        let upper = matcher().evaluate(&resume("Skills: PYTHON, DOCKER"), &requirement);
        let lower = matcher().evaluate(&resume("Skills: python, docker"), &requirement);

        assert_eq!(upper.score, lower.score);
        assert_eq!(upper.evidence.missing_must_have, lower.evidence.missing_must_have);
    }

    #[test]
    fn test_fuzzy_match_is_partial_credit() {
        let requirement = JobRequirement::new("Dev", &["postgresql"], &[]);
        let signal = matcher().evaluate(&resume("Worked with postgresq daily"), &requirement);

        let fuzzy: Vec<&SkillMatch> = signal.evidence.fuzzy_matches().collect();
        assert_eq!(fuzzy.len(), 1);
        assert_eq!(fuzzy[0].resume_term, "postgresq");
        assert!((signal.score - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_alias_counts_as_exact() {
        let requirement = JobRequirement::new("Frontend", &["JavaScript", "Kubernetes"], &[]);
        let signal = matcher().evaluate(&resume("Built apps in JS and deployed to k8s"), &requirement);

        assert!(signal.evidence.missing_must_have.is_empty());
        assert!(signal
            .evidence
            .matches
            .iter()
            .all(|m| m.match_type == MatchType::Exact));
        assert_eq!(signal.score, 100.0);
    }

    #[test]
    fn test_short_skills_are_not_fuzzy_matched() {
        let requirement = JobRequirement::new("Dev", &["aws"], &[]);
        let signal = matcher().evaluate(&resume("Experience with awk scripting"), &requirement);
        assert_eq!(signal.evidence.missing_must_have, vec!["aws"]);
        assert_eq!(signal.score, 0.0);
    }

    #[test]
    fn test_must_and_good_shares() {
        let requirement = JobRequirement::new("Dev", &["python", "sql"], &["docker", "airflow"]);
        let signal = matcher().evaluate(&resume("Python and SQL with Docker"), &requirement);

        // 70 * 1.0 + 30 * 0.5
        assert!((signal.score - 85.0).abs() < 1e-9);
        assert_eq!(signal.evidence.missing_good_to_have, vec!["airflow"]);
    }

    #[test]
    fn test_unmet_experience_is_a_fixed_penalty() {
        let requirement = JobRequirement::new("Dev", &["python"], &[]).with_min_experience(5.0);

        let junior = matcher().evaluate(&resume("Python developer, 2 years"), &requirement);
        let senior = matcher().evaluate(&resume("Python developer, 2016 - present"), &requirement);

        assert_eq!(junior.score, 80.0);
        assert!(!junior.evidence.experience.as_ref().unwrap().met);
        assert_eq!(senior.score, 100.0);
        assert_eq!(senior.evidence.experience.as_ref().unwrap().resume_years, Some(8.0));
    }

    #[test]
    fn test_degree_levels() {
        let requirement = JobRequirement::new("Dev", &["python", "sql"], &[])
            .with_qualifications(&["Bachelor's degree in Computer Science"]);

        let masters = matcher().evaluate(
            &resume("Python, SQL\nEducation\nM.Sc. Computer Science"),
            &requirement,
        );
        assert!(masters.evidence.qualifications[0].met);
        assert_eq!(masters.evidence.qualification_adjustment, 5.0);
        assert_eq!(masters.score, 100.0);

        let none = matcher().evaluate(&resume("Python, SQL\nSelf-taught"), &requirement);
        assert!(!none.evidence.qualifications[0].met);
        assert_eq!(none.score, 95.0);
    }

    #[test]
    fn test_named_degree_level_is_not_lowered_by_the_word_degree() {
        let requirement = JobRequirement::new("Dev", &["python"], &[])
            .with_qualifications(&["Master's degree in Computer Science"]);

        let bachelor = matcher().evaluate(
            &resume("Python\nEducation\nB.Sc. Computer Science"),
            &requirement,
        );
        assert!(!bachelor.evidence.qualifications[0].met);
        assert_eq!(bachelor.evidence.qualifications[0].evidence.as_deref(), Some("bachelor's degree"));

        let generic = JobRequirement::new("Dev", &["python"], &[])
            .with_qualifications(&["Degree in Computer Science or related field"]);
        let signal = matcher().evaluate(
            &resume("Python\nEducation\nB.Sc. Computer Science"),
            &generic,
        );
        assert!(signal.evidence.qualifications[0].met);
    }

    #[test]
    fn test_degree_abbreviations_need_word_boundaries() {
        let requirement = JobRequirement::new("Dev", &["kubernetes"], &[])
            .with_qualifications(&["Master's degree in Computer Science"]);
        let signal = matcher().evaluate(
            &resume("Mastered Kubernetes while running production clusters"),
            &requirement,
        );

        assert!(!signal.evidence.qualifications[0].met);
        assert_eq!(signal.evidence.qualifications[0].evidence, None);
        assert_eq!(signal.score, 95.0);
    }

    #[test]
    fn test_long_skills_match_whole_phrases() {
        let requirement =
            JobRequirement::new("Architect", &["distributed systems design patterns"], &[]);
        let signal = matcher().evaluate(
            &resume("Skills: distributed systems design patterns"),
            &requirement,
        );

        assert!(signal.evidence.missing_must_have.is_empty());
        assert_eq!(signal.evidence.matches[0].match_type, MatchType::Exact);
        assert_eq!(signal.score, 100.0);
    }

    #[test]
    fn test_requirement_without_skills_is_fully_covered() {
        let none: [&str; 0] = [];
        let requirement = JobRequirement::new("Analyst", &none, &none);
        let signal = matcher().evaluate(&resume("Spreadsheets and reporting"), &requirement);

        assert!(signal.evidence.matches.is_empty());
        assert_eq!(signal.score, 100.0);
    }

    #[test]
    fn test_certification_words() {
        let requirement = JobRequirement::new("Cloud", &["aws"], &[])
            .with_qualifications(&["AWS Certified Solutions Architect"]);
        let signal = matcher().evaluate(
            &resume("AWS Certified Solutions Architect - Associate, 2022"),
            &requirement,
        );
        assert!(signal.evidence.qualifications[0].met);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let requirement = JobRequirement::new("Dev", &["rust", "tokio", "grpc"], &["kafka"]);
        let doc = resume("Rust services using Tokio and gRPC, some Kafak");
        let first = matcher().evaluate(&doc, &requirement);
        for _ in 0..5 {
            assert_eq!(matcher().evaluate(&doc, &requirement), first);
        }
    }
}
