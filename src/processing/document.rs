//! Resume document structure and section detection

use crate::error::{RelevanceError, Result};
use crate::input::file_detector::FileType;
use crate::processing::text_processor::TextProcessor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Summary,
    Skills,
    Experience,
    Education,
    Projects,
    Certifications,
}

impl SectionType {
    fn header_patterns(self) -> &'static [&'static str] {
        match self {
            SectionType::Summary => &["summary", "profile", "objective", "about me", "overview"],
            SectionType::Skills => &[
                "skills",
                "technical skills",
                "core competencies",
                "competencies",
                "technologies",
                "tech stack",
                "tools",
                "expertise",
            ],
            SectionType::Experience => &[
                "experience",
                "work experience",
                "professional experience",
                "employment",
                "work history",
                "career",
            ],
            SectionType::Education => &["education", "academic background", "academics"],
            SectionType::Projects => &["projects", "portfolio", "notable projects"],
            SectionType::Certifications => &["certifications", "certificates", "licenses"],
        }
    }

    pub const ALL: [SectionType; 6] = [
        SectionType::Summary,
        SectionType::Skills,
        SectionType::Experience,
        SectionType::Education,
        SectionType::Projects,
        SectionType::Certifications,
    ];

    /// Classify a line as a section header, if it looks like one.
    pub fn from_header(line: &str) -> Option<SectionType> {
        let trimmed = line
            .trim()
            .trim_start_matches('#')
            .trim()
            .trim_end_matches(':')
            .trim()
            .to_lowercase();

        if trimmed.is_empty() || trimmed.contains(',') || trimmed.split_whitespace().count() > 4 {
            return None;
        }

        Self::ALL.into_iter().find(|section| {
            section
                .header_patterns()
                .iter()
                .any(|pattern| trimmed == *pattern || trimmed.ends_with(&format!(" {pattern}")))
        })
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionType::Summary => "summary",
            SectionType::Skills => "skills",
            SectionType::Experience => "experience",
            SectionType::Education => "education",
            SectionType::Projects => "projects",
            SectionType::Certifications => "certifications",
        };
        write!(f, "{name}")
    }
}

/// Byte range of a section body inside `ResumeDocument::cleaned_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub candidate_name: Option<String>,
    pub file_type: Option<FileType>,
    pub source: Option<String>,
    pub word_count: usize,
}

/// A resume reduced to text. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeDocument {
    raw_text: String,
    cleaned_text: String,
    sections: BTreeMap<SectionType, SectionSpan>,
    metadata: DocumentMetadata,
}

impl ResumeDocument {
    /// Build a document from extracted plain text.
    ///
    /// Fails with `Extraction` when the cleaned text is empty or shorter
    /// than `min_chars`.
    pub fn from_text(raw_text: &str, min_chars: usize) -> Result<Self> {
        let processor = TextProcessor::new();
        let cleaned_text = processor.clean_text(raw_text);
        let length = cleaned_text.chars().count();

        if length == 0 {
            return Err(RelevanceError::Extraction(
                "resume text is empty after extraction".to_string(),
            ));
        }
        if length < min_chars {
            return Err(RelevanceError::Extraction(format!(
                "resume text too short ({length} chars, minimum {min_chars})"
            )));
        }

        let sections = detect_sections(&cleaned_text);
        let candidate_name = detect_candidate_name(&cleaned_text);
        let word_count = cleaned_text.split_whitespace().count();

        Ok(Self {
            raw_text: raw_text.to_string(),
            cleaned_text,
            sections,
            metadata: DocumentMetadata {
                candidate_name,
                file_type: None,
                source: None,
                word_count,
            },
        })
    }

    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.metadata.file_type = Some(file_type);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.source = Some(source.into());
        self
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn cleaned_text(&self) -> &str {
        &self.cleaned_text
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn candidate_name(&self) -> Option<&str> {
        self.metadata.candidate_name.as_deref()
    }

    pub fn sections(&self) -> impl Iterator<Item = (SectionType, &str)> {
        self.sections
            .iter()
            .map(|(kind, span)| (*kind, &self.cleaned_text[span.start..span.end]))
    }

    pub fn section_text(&self, kind: SectionType) -> Option<&str> {
        self.sections
            .get(&kind)
            .map(|span| &self.cleaned_text[span.start..span.end])
    }

    pub fn has_section(&self, kind: SectionType) -> bool {
        self.sections.contains_key(&kind)
    }
}

/// Find section headers line by line; each body runs until the next header.
/// Repeated headers keep the first occurrence.
fn detect_sections(text: &str) -> BTreeMap<SectionType, SectionSpan> {
    let mut sections = BTreeMap::new();
    let mut current: Option<(SectionType, usize)> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if let Some(kind) = SectionType::from_header(line) {
            if let Some((open, start)) = current.take() {
                sections.entry(open).or_insert(SectionSpan { start, end: offset });
            }
            current = Some((kind, offset + line.len()));
        }
        offset += line.len();
    }

    if let Some((open, start)) = current {
        sections.entry(open).or_insert(SectionSpan {
            start: start.min(text.len()),
            end: text.len(),
        });
    }

    sections
}

const NAME_STOP_WORDS: &[&str] = &[
    "resume",
    "cv",
    "curriculum",
    "profile",
    "contact",
    "email",
    "phone",
    "address",
    "summary",
];

/// The first short, letters-only line near the top of the resume.
fn detect_candidate_name(text: &str) -> Option<String> {
    text.lines().take(5).map(str::trim).find_map(|line| {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() || words.len() > 4 {
            return None;
        }
        if !line.chars().any(|c| c.is_alphabetic()) {
            return None;
        }
        if line.chars().any(|c| c.is_ascii_digit() || c == '@' || c == '[' || c == ':') {
            return None;
        }
        let lower = line.to_lowercase();
        if words
            .iter()
            .any(|w| NAME_STOP_WORDS.contains(&w.to_lowercase().as_str()))
            || SectionType::from_header(&lower).is_some()
        {
            return None;
        }
        Some(line.to_string())
    })
}
