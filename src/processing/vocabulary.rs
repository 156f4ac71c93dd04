//! Known-skill vocabulary scanned with Aho-Corasick

use crate::error::{RelevanceError, Result};
use crate::processing::normalize::normalize_skill;
use aho_corasick::{AhoCorasick, MatchKind};
use std::collections::HashSet;

/// Dictionary of skill names used when requirement text is prose rather
/// than a list. Matches are whole-word and ASCII case-insensitive.
pub struct SkillVocabulary {
    matcher: AhoCorasick,
    terms: Vec<String>,
}

impl SkillVocabulary {
    pub fn new() -> Result<Self> {
        Self::with_custom_skills(Vec::new())
    }

    pub fn with_custom_skills(additional_skills: Vec<String>) -> Result<Self> {
        let mut terms: Vec<String> = Self::default_tech_skills()
            .iter()
            .chain(Self::default_soft_skills())
            .map(|s| s.to_string())
            .chain(additional_skills.into_iter().map(|s| s.to_lowercase()))
            .collect();

        terms.sort();
        terms.dedup();
        // Longest first so "machine learning" wins over "learning"
        terms.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));

        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(&terms)
            .map_err(|e| RelevanceError::Processing(format!("Failed to build skill matcher: {e}")))?;

        Ok(Self { matcher, terms })
    }

    /// Normalized skills found in `text`, in order of first appearance.
    pub fn find_skills(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for mat in self.matcher.find_iter(text) {
            if !is_word_boundary(text, mat.start(), mat.end()) {
                continue;
            }
            let skill = normalize_skill(&self.terms[mat.pattern().as_usize()]);
            if !skill.is_empty() && seen.insert(skill.clone()) {
                found.push(skill);
            }
        }

        found
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn default_tech_skills() -> &'static [&'static str] {
        &[
            // Programming languages
            "rust", "python", "javascript", "typescript", "java", "c++", "c#", "golang", "ruby",
            "php", "swift", "kotlin", "scala", "haskell", "clojure", "matlab", "perl", "bash",
            "powershell", "sql", "nosql", "html", "css",
            // Web
            "react", "vue", "angular", "svelte", "sass", "tailwind", "jquery", "webpack",
            "node.js", "express", "next.js", "django", "flask", "fastapi", "spring boot",
            "rails", "graphql", "grpc", "rest api", "restful", "microservices",
            // Infrastructure
            "docker", "kubernetes", "aws", "azure", "gcp", "terraform", "ansible", "jenkins",
            "ci/cd", "devops", "linux", "nginx", "redis", "kafka", "rabbitmq",
            "elasticsearch", "git",
            // Data stores
            "postgresql", "postgres", "mysql", "mongodb", "cassandra", "dynamodb", "sqlite",
            "oracle", "snowflake", "bigquery",
            // Data and ML
            "machine learning", "deep learning", "natural language processing",
            "computer vision", "tensorflow", "pytorch", "scikit-learn", "keras", "pandas",
            "numpy", "spark", "hadoop", "airflow", "tableau", "power bi", "excel", "statistics",
            "data analysis", "data visualization", "etl",
            // Testing and process
            "pytest", "junit", "selenium", "cypress", "jest", "tdd", "agile", "scrum", "jira",
        ]
    }

    fn default_soft_skills() -> &'static [&'static str] {
        &[
            "leadership",
            "communication",
            "teamwork",
            "problem solving",
            "critical thinking",
            "time management",
            "project management",
            "stakeholder management",
            "collaboration",
            "mentoring",
        ]
    }
}

fn is_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    let is_word = |c: char| c.is_alphanumeric() || c == '+' || c == '#';
    !before.is_some_and(is_word) && !after.is_some_and(is_word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_creation() {
        let vocabulary = SkillVocabulary::new().unwrap();
        assert!(!vocabulary.is_empty());
    }

    #[test]
    fn test_finds_skills_in_prose() {
        let vocabulary = SkillVocabulary::new().unwrap();
        let skills = vocabulary
            .find_skills("You will build Machine Learning services in Python and deploy on AWS.");

        assert_eq!(skills, vec!["machine learning", "python", "aws"]);
    }

    #[test]
    fn test_requires_word_boundaries() {
        let vocabulary = SkillVocabulary::new().unwrap();
        let skills = vocabulary.find_skills("We use Javascript; no Java here. Trusted partners.");

        assert_eq!(skills, vec!["javascript", "java"]);
        assert!(!skills.contains(&"rust".to_string()));
    }

    #[test]
    fn test_custom_skills() {
        let vocabulary = SkillVocabulary::with_custom_skills(vec!["Solidity".to_string()]).unwrap();
        assert_eq!(vocabulary.find_skills("Solidity smart contracts"), vec!["solidity"]);
    }
}
