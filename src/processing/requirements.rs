//! Requirement extraction from job-description text
//!
//! A structured pass walks the posting line by line and routes list items
//! into must-have, good-to-have or qualification buckets based on the
//! section header they sit under. A cue pass then picks up inline phrasing
//! ("Required: ...", "... is a plus") anywhere in the text. When neither
//! finds a must-have skill, the whole text is scanned with the skill
//! vocabulary, and as a last resort the most frequent keywords are used.

use crate::error::{RelevanceError, Result};
use crate::processing::normalize::normalize_skill;
use crate::processing::text_processor::TextProcessor;
use crate::processing::vocabulary::SkillVocabulary;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Structured requirements of one job posting. Skill lists are normalized,
/// unique and disjoint, and keep the order they were declared in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequirement {
    pub role_title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub must_have: Vec<String>,
    pub good_to_have: Vec<String>,
    pub qualifications: Vec<String>,
    pub min_experience_years: Option<f64>,
    pub responsibilities: Vec<String>,
}

impl JobRequirement {
    pub fn new<S: AsRef<str>>(role_title: &str, must_have: &[S], good_to_have: &[S]) -> Self {
        Self {
            role_title: role_title.to_string(),
            company: None,
            location: None,
            must_have: must_have.iter().map(|s| s.as_ref().to_string()).collect(),
            good_to_have: good_to_have.iter().map(|s| s.as_ref().to_string()).collect(),
            qualifications: Vec::new(),
            min_experience_years: None,
            responsibilities: Vec::new(),
        }
        .normalized()
    }

    pub fn with_qualifications<S: AsRef<str>>(mut self, qualifications: &[S]) -> Self {
        self.qualifications = qualifications
            .iter()
            .map(|q| q.as_ref().trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        self
    }

    pub fn with_min_experience(mut self, years: f64) -> Self {
        self.min_experience_years = Some(years);
        self
    }

    /// Re-establish the skill invariants: normalized, non-empty, unique,
    /// and good-to-have never repeats a must-have.
    pub fn normalized(mut self) -> Self {
        let mut must = Vec::new();
        for skill in &self.must_have {
            push_unique(&mut must, normalize_skill(skill));
        }
        let mut good = Vec::new();
        for skill in &self.good_to_have {
            let skill = normalize_skill(skill);
            if !must.contains(&skill) {
                push_unique(&mut good, skill);
            }
        }
        self.must_have = must;
        self.good_to_have = good;
        self
    }
}

/// The JSON shape produced by an LLM-based job parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedJobDescription {
    pub role_title: String,
    pub company: String,
    pub location: String,
    pub must_have_skills: Vec<String>,
    pub good_to_have_skills: Vec<String>,
    pub qualifications: Vec<String>,
    pub responsibilities: Vec<String>,
    pub experience_years: Option<f64>,
}

impl From<ParsedJobDescription> for JobRequirement {
    fn from(parsed: ParsedJobDescription) -> Self {
        let non_empty = |s: String| {
            let trimmed = s.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        };
        JobRequirement {
            role_title: non_empty(parsed.role_title).unwrap_or_else(|| "Untitled Role".to_string()),
            company: non_empty(parsed.company),
            location: non_empty(parsed.location),
            must_have: parsed.must_have_skills,
            good_to_have: parsed.good_to_have_skills,
            qualifications: parsed.qualifications,
            min_experience_years: parsed.experience_years.filter(|y| y.is_finite() && *y >= 0.0),
            responsibilities: parsed.responsibilities,
        }
        .normalized()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JdSection {
    MustHave,
    GoodToHave,
    Qualifications,
    Responsibilities,
    Other,
}

const GOOD_CUES: &[&str] = &[
    "preferred",
    "nice to have",
    "nice-to-have",
    "good to have",
    "good-to-have",
    "bonus",
    "desired",
    "desirable",
    "optional",
    "pluses",
];
const MUST_CUES: &[&str] = &[
    "required",
    "requirements",
    "requirement",
    "must have",
    "must-have",
    "mandatory",
    "essential",
    "minimum qualifications",
    "basic qualifications",
    "what you need",
    "what we're looking for",
    "what we are looking for",
    "skills",
];
const QUALIFICATION_CUES: &[&str] = &["qualifications", "education", "certifications"];
const RESPONSIBILITY_CUES: &[&str] = &[
    "responsibilities",
    "what you'll do",
    "what you will do",
    "duties",
    "about the role",
    "day to day",
];
const OTHER_CUES: &[&str] = &[
    "about us",
    "about",
    "benefits",
    "perks",
    "who we are",
    "compensation",
    "salary",
    "how to apply",
];

pub struct RequirementExtractor {
    vocabulary: SkillVocabulary,
    processor: TextProcessor,
    min_chars: usize,
    bullet_regex: Regex,
    years_regex: Regex,
    qualification_regex: Regex,
    item_noise_regex: Regex,
    inline_must_regex: Regex,
    inline_good_regex: Regex,
    trailing_plus_regex: Regex,
}

impl RequirementExtractor {
    pub fn new(min_chars: usize) -> Result<Self> {
        Self::with_vocabulary(SkillVocabulary::new()?, min_chars)
    }

    pub fn with_vocabulary(vocabulary: SkillVocabulary, min_chars: usize) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| RelevanceError::Processing(format!("Invalid extractor regex: {e}")))
        };

        Ok(Self {
            vocabulary,
            processor: TextProcessor::new(),
            min_chars,
            bullet_regex: compile(r"^\s*(?:[-*•▪◦>]+|\d+[.)])\s*")?,
            years_regex: compile(
                r"(?i)(\d+(?:\.\d+)?|one|two|three|four|five|six|seven|eight|nine|ten)\s*\+?\s*(?:(?:-|to)\s*\d+\s*\+?\s*)?(?:years?|yrs?)\b",
            )?,
            qualification_regex: compile(
                r"(?i)\b(?:bachelor'?s?|master'?s?|ph\.?d|doctorate|degree|b\.?tech|m\.?tech|b\.e|mba|diploma|certification|certified)\b",
            )?,
            item_noise_regex: compile(
                r"(?i)(?:\b(?:at\s+least|minimum\s+of|min\.?)\s+)?\b(?:\d+(?:\.\d+)?|one|two|three|four|five|six|seven|eight|nine|ten)\s*\+?\s*(?:(?:-|to)\s*\d+\s*\+?\s*)?(?:years?|yrs?)\b(?:\s+of)?|\b(?:is|are)?\s*(?:a\s+)?(?:strong\s+)?(?:plus|bonus|preferred|required|mandatory|desired)\b",
            )?,
            inline_must_regex: compile(
                r"(?i)\b(?:required|must[- ]have|mandatory)\s*:[ \t]*([^\n.]+)",
            )?,
            inline_good_regex: compile(
                r"(?i)\b(?:preferred|nice[- ]to[- ]have|good[- ]to[- ]have|bonus)\s*:[ \t]*([^\n.]+)",
            )?,
            trailing_plus_regex: compile(
                r"(?i)(?:^|[.\n])\s*([^.\n]+?)\s+(?:is|are|would be)\s+(?:a\s+)?(?:big\s+)?(?:plus|bonus)",
            )?,
        })
    }

    /// Turn a job posting into a `JobRequirement`.
    pub fn extract(&self, text: &str) -> Result<JobRequirement> {
        let cleaned = self.processor.clean_text(text);
        let length = cleaned.chars().count();

        if length == 0 {
            return Err(RelevanceError::Extraction(
                "job description is empty after extraction".to_string(),
            ));
        }
        if length < self.min_chars {
            return Err(RelevanceError::Extraction(format!(
                "job description too short ({length} chars, minimum {})",
                self.min_chars
            )));
        }

        let mut sets = RequirementSets::default();
        let mut current = JdSection::Other;

        for line in cleaned.lines() {
            if let Some((key, value)) = self.labelled_field(line) {
                match key.as_str() {
                    "title" | "job title" | "role" | "position" => {
                        sets.role_title.get_or_insert(value);
                    }
                    "company" => {
                        sets.company.get_or_insert(value);
                    }
                    _ => {
                        sets.location.get_or_insert(value);
                    }
                }
                continue;
            }

            if let Some((section, inline)) = self.classify_header(line) {
                current = section;
                if let Some(inline) = inline {
                    self.ingest(&mut sets, &inline, current);
                }
                continue;
            }

            self.ingest(&mut sets, line, current);
        }

        self.apply_inline_cues(&mut sets, &cleaned);

        if sets.must_have.is_empty() {
            debug!("No explicit must-have skills found, scanning full text");
            for skill in self.vocabulary.find_skills(&cleaned) {
                if !sets.good_to_have.contains(&skill) {
                    push_unique(&mut sets.must_have, skill);
                }
            }
        }
        if sets.must_have.is_empty() {
            debug!("Vocabulary scan found nothing, using frequent keywords");
            for keyword in self.processor.extract_keywords(&cleaned, 5) {
                push_unique(&mut sets.must_have, normalize_skill(&keyword));
            }
        }

        let role_title = sets
            .role_title
            .or_else(|| self.guess_title(&cleaned))
            .unwrap_or_else(|| "Untitled Role".to_string());

        let requirement = JobRequirement {
            role_title,
            company: sets.company,
            location: sets.location,
            must_have: sets.must_have,
            good_to_have: sets.good_to_have,
            qualifications: sets.qualifications,
            min_experience_years: self.experience_years(&cleaned),
            responsibilities: sets.responsibilities,
        }
        .normalized();

        debug!(
            "Extracted {} must-have, {} good-to-have, {} qualifications for '{}'",
            requirement.must_have.len(),
            requirement.good_to_have.len(),
            requirement.qualifications.len(),
            requirement.role_title
        );

        Ok(requirement)
    }

    /// Minimum years of experience from the first "N years" mention.
    pub fn experience_years(&self, text: &str) -> Option<f64> {
        self.years_regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| parse_number(m.as_str()))
    }

    fn labelled_field(&self, line: &str) -> Option<(String, String)> {
        let (head, rest) = line.split_once(':')?;
        let key = head.trim().trim_start_matches('#').trim().to_lowercase();
        let value = rest.trim();
        let known = matches!(
            key.as_str(),
            "title" | "job title" | "role" | "position" | "company" | "location"
        );
        (known && !value.is_empty()).then(|| (key, value.to_string()))
    }

    fn classify_header(&self, line: &str) -> Option<(JdSection, Option<String>)> {
        let stripped = line.trim().trim_start_matches('#').trim();
        if self.bullet_regex.is_match(line) && !line.trim_start().starts_with('#') {
            return None;
        }

        let (head, inline) = match stripped.split_once(':') {
            Some((head, rest)) => {
                let rest = rest.trim();
                (head, (!rest.is_empty()).then(|| rest.to_string()))
            }
            None => (stripped, None),
        };

        let head = head.trim().to_lowercase();
        let has_colon = inline.is_some() || stripped.ends_with(':');
        let words = head.split_whitespace().count();
        let max_words = if has_colon { 6 } else { 4 };
        if head.is_empty() || words > max_words || head.contains(['.', '!', '?']) {
            return None;
        }

        let padded = format!(" {} ", head.replace(['-', '&'], " "));
        let has_cue = |cues: &[&str]| {
            cues.iter()
                .any(|cue| padded.contains(&format!(" {} ", cue.replace('-', " "))))
        };

        // "Strong communication skills" is an item, "Technical Skills" a header
        let descriptive_skills_line = head.ends_with("skills")
            && !has_colon
            && words > 2
            && !padded.contains(" required ");

        let section = if has_cue(GOOD_CUES) {
            JdSection::GoodToHave
        } else if has_cue(MUST_CUES) && !descriptive_skills_line {
            JdSection::MustHave
        } else if has_cue(QUALIFICATION_CUES) {
            JdSection::Qualifications
        } else if has_cue(RESPONSIBILITY_CUES) {
            JdSection::Responsibilities
        } else if has_cue(OTHER_CUES) {
            JdSection::Other
        } else {
            return None;
        };

        Some((section, inline))
    }

    fn ingest(&self, sets: &mut RequirementSets, line: &str, section: JdSection) {
        let line = self.bullet_regex.replace(line, "");
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match section {
            JdSection::Responsibilities => sets.responsibilities.push(line.to_string()),
            JdSection::Other => {}
            JdSection::MustHave | JdSection::GoodToHave | JdSection::Qualifications => {
                if self.qualification_regex.is_match(line) {
                    push_unique(&mut sets.qualifications, line.to_string());
                    return;
                }
                let target = if section == JdSection::GoodToHave {
                    &mut sets.good_to_have
                } else {
                    &mut sets.must_have
                };
                for item in split_items(line) {
                    for skill in self.skills_from_item(&item) {
                        push_unique(target, skill);
                    }
                }
            }
        }
    }

    fn apply_inline_cues(&self, sets: &mut RequirementSets, text: &str) {
        for caps in self.inline_must_regex.captures_iter(text) {
            if let Some(list) = caps.get(1) {
                for item in split_items(list.as_str()) {
                    for skill in self.skills_from_item(&item) {
                        push_unique(&mut sets.must_have, skill);
                    }
                }
            }
        }

        let good_lists = self
            .inline_good_regex
            .captures_iter(text)
            .chain(self.trailing_plus_regex.captures_iter(text))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
            .collect::<Vec<_>>();

        for list in good_lists {
            for item in split_items(&list) {
                for skill in self.skills_from_item(&item) {
                    if !sets.must_have.contains(&skill) {
                        push_unique(&mut sets.good_to_have, skill);
                    }
                }
            }
        }
    }

    /// Short items are skill names in their own right; longer ones are prose
    /// and only contribute vocabulary hits.
    fn skills_from_item(&self, item: &str) -> Vec<String> {
        let without_noise = self.item_noise_regex.replace_all(item, " ");
        let candidate = normalize_skill(&without_noise);

        if candidate.is_empty() || candidate.chars().all(|c| !c.is_alphabetic()) {
            return Vec::new();
        }
        if candidate.split_whitespace().count() <= 4 && candidate.chars().count() <= 40 {
            return vec![candidate];
        }
        self.vocabulary.find_skills(item)
    }

    fn guess_title(&self, text: &str) -> Option<String> {
        let first = text.lines().map(str::trim).find(|l| !l.is_empty())?;
        let words = first.split_whitespace().count();
        if words == 0 || words > 12 || self.classify_header(first).is_some() {
            return None;
        }
        Some(first.trim_start_matches('#').trim().to_string())
    }
}

#[derive(Default)]
struct RequirementSets {
    role_title: Option<String>,
    company: Option<String>,
    location: Option<String>,
    must_have: Vec<String>,
    good_to_have: Vec<String>,
    qualifications: Vec<String>,
    responsibilities: Vec<String>,
}

fn push_unique(target: &mut Vec<String>, value: String) {
    if !value.is_empty() && !target.contains(&value) {
        target.push(value);
    }
}

/// Split a requirement line into items. Parenthesized lists become items of
/// their own: "ML frameworks (TensorFlow, PyTorch)" yields three.
fn split_items(line: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut outside = String::new();
    let mut inside = String::new();
    let mut depth = 0usize;

    for c in line.chars() {
        match c {
            '(' => {
                depth += 1;
                if depth == 1 {
                    continue;
                }
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    pieces.push(std::mem::take(&mut inside));
                    continue;
                }
            }
            _ => {}
        }
        if depth > 0 {
            inside.push(c);
        } else {
            outside.push(c);
        }
    }
    if !inside.is_empty() {
        pieces.push(inside);
    }
    pieces.insert(0, outside);

    pieces
        .iter()
        .flat_map(|piece| piece.split([',', ';', '|', '•']))
        .flat_map(|piece| {
            piece
                .split(". ")
                .flat_map(|p| p.split(" and "))
                .flat_map(|p| p.split(" or "))
                .flat_map(|p| p.split(" & "))
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .map(|piece| piece.trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}

fn parse_number(raw: &str) -> Option<f64> {
    let value = match raw.to_lowercase().as_str() {
        "one" => 1.0,
        "two" => 2.0,
        "three" => 3.0,
        "four" => 4.0,
        "five" => 5.0,
        "six" => 6.0,
        "seven" => 7.0,
        "eight" => 8.0,
        "nine" => 9.0,
        "ten" => 10.0,
        other => other.parse().ok()?,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA_ENGINEER_JD: &str = "Senior Data Engineer\n\
        Company: Acme Analytics\n\
        Location: Remote\n\
        \n\
        Responsibilities:\n\
        - Build batch pipelines on Spark\n\
        - Own data quality checks\n\
        \n\
        Requirements:\n\
        - 5+ years of Python\n\
        - SQL and data modeling\n\
        - Cloud platforms (AWS, GCP)\n\
        - Bachelor's degree in Computer Science or related field\n\
        \n\
        Nice to have:\n\
        - Kubernetes, Airflow\n\
        - Python3\n";

    fn extractor() -> RequirementExtractor {
        RequirementExtractor::new(20).unwrap()
    }

    #[test]
    fn test_empty_text_is_an_extraction_error() {
        let err = extractor().extract("  \n \n").unwrap_err();
        assert!(matches!(err, RelevanceError::Extraction(_)));
    }

    #[test]
    fn test_short_text_is_an_extraction_error() {
        let err = extractor().extract("Python").unwrap_err();
        assert!(matches!(err, RelevanceError::Extraction(_)));
    }

    #[test]
    fn test_sectioned_posting() {
        let req = extractor().extract(DATA_ENGINEER_JD).unwrap();

        assert_eq!(req.role_title, "Senior Data Engineer");
        assert_eq!(req.company.as_deref(), Some("Acme Analytics"));
        assert_eq!(req.location.as_deref(), Some("Remote"));
        assert_eq!(
            req.must_have,
            vec!["python", "sql", "data modeling", "cloud", "aws", "gcp"]
        );
        assert_eq!(req.good_to_have, vec!["kubernetes", "airflow"]);
        assert_eq!(req.min_experience_years, Some(5.0));
        assert_eq!(req.qualifications.len(), 1);
        assert!(req.qualifications[0].contains("Bachelor"));
        assert_eq!(req.responsibilities.len(), 2);
    }

    #[test]
    fn test_sets_are_disjoint() {
        let req = extractor().extract(DATA_ENGINEER_JD).unwrap();
        for skill in &req.good_to_have {
            assert!(!req.must_have.contains(skill), "{skill} in both sets");
        }
    }

    #[test]
    fn test_inline_cues() {
        let text = "Backend Developer\nWe build payment APIs. Required: Go, PostgreSQL, Docker. Preferred: Kafka. Terraform is a plus.";
        let req = extractor().extract(text).unwrap();

        assert_eq!(req.must_have, vec!["go", "postgresql", "docker"]);
        assert_eq!(req.good_to_have, vec!["kafka", "terraform"]);
    }

    #[test]
    fn test_fallback_scans_prose() {
        let text = "We are hiring an engineer to build machine learning models in Python and ship them with Docker on AWS.";
        let req = extractor().extract(text).unwrap();

        assert_eq!(req.must_have, vec!["machine learning", "python", "docker", "aws"]);
        assert!(req.good_to_have.is_empty());
    }

    #[test]
    fn test_fallback_never_returns_empty_must_have() {
        let text = "Seeking a florist for arranging bouquets, arranging centerpieces and greeting customers daily.";
        let req = extractor().extract(text).unwrap();
        assert!(!req.must_have.is_empty());
        assert_eq!(req.must_have[0], "arranging");
    }

    #[test]
    fn test_experience_phrasing() {
        let ex = extractor();
        assert_eq!(ex.experience_years("Minimum of three years in analytics"), Some(3.0));
        assert_eq!(ex.experience_years("3-5 years of experience"), Some(3.0));
        assert_eq!(ex.experience_years("no numbers here"), None);
    }

    #[test]
    fn test_parsed_job_description_conversion() {
        let json = r#"{
            "role_title": "ML Engineer",
            "company": "",
            "must_have_skills": ["Python3", "PyTorch"],
            "good_to_have_skills": ["python", "K8s"],
            "experience_years": 3
        }"#;
        let parsed: ParsedJobDescription = serde_json::from_str(json).unwrap();
        let req = JobRequirement::from(parsed);

        assert_eq!(req.must_have, vec!["python", "pytorch"]);
        assert_eq!(req.good_to_have, vec!["kubernetes"]);
        assert_eq!(req.company, None);
        assert_eq!(req.min_experience_years, Some(3.0));
    }

    #[test]
    fn test_split_items_expands_parentheses() {
        assert_eq!(
            split_items("ML frameworks (TensorFlow, PyTorch) and SQL"),
            vec!["ML frameworks", "SQL", "TensorFlow", "PyTorch"]
        );
    }
}
