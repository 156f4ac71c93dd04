//! Text cleaning, tokenization and keyword statistics

use regex::Regex;
use std::collections::{HashMap, HashSet};
use unicode_segmentation::UnicodeSegmentation;

pub struct TextProcessor {
    stop_words: HashSet<&'static str>,
    email_regex: Regex,
    phone_regex: Regex,
    url_regex: Regex,
    spaces_regex: Regex,
    punct_regex: Regex,
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextProcessor {
    pub fn new() -> Self {
        let email_regex = Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
            .expect("Invalid email regex");

        let phone_regex =
            Regex::new(r"(?:\+?\d{1,3}[-. ]?)?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}\b")
                .expect("Invalid phone regex");

        let url_regex = Regex::new(r"https?://[^\s]+").expect("Invalid URL regex");
        let spaces_regex = Regex::new(r"[ \t\u{a0}]+").expect("Invalid whitespace regex");
        let punct_regex = Regex::new(r"[.!?]{2,}").expect("Invalid punctuation regex");

        Self {
            stop_words: Self::create_stop_words(),
            email_regex,
            phone_regex,
            url_regex,
            spaces_regex,
            punct_regex,
        }
    }

    /// Clean text while keeping line structure, which section detection needs.
    /// URLs are dropped, contact details are masked, blank lines are removed.
    pub fn clean_text(&self, text: &str) -> String {
        let normalized = Self::normalize_unicode(text);
        let without_urls = self.url_regex.replace_all(&normalized, "");
        let masked_email = self.email_regex.replace_all(&without_urls, "[EMAIL]");
        let masked = self.phone_regex.replace_all(&masked_email, "[PHONE]");

        masked
            .lines()
            .map(|line| {
                let collapsed = self.spaces_regex.replace_all(line.trim(), " ");
                self.punct_regex.replace_all(&collapsed, ".").to_string()
            })
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Lowercase word tokens without stop words or single characters.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .map(|word| word.to_lowercase())
            .filter(|word| {
                word.chars().count() > 1
                    && !self.stop_words.contains(word.as_str())
                    && word.chars().any(|c| c.is_alphabetic())
            })
            .collect()
    }

    pub fn split_sentences(&self, text: &str) -> Vec<String> {
        text.unicode_sentences()
            .flat_map(|s| s.split('\n'))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Most frequent tokens, ties broken by first occurrence so the result
    /// does not depend on hash iteration order.
    pub fn extract_keywords(&self, text: &str, max_keywords: usize) -> Vec<String> {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

        for (position, token) in self.tokenize(text).into_iter().enumerate() {
            if token.chars().count() <= 2 {
                continue;
            }
            let entry = counts.entry(token).or_insert((0, position));
            entry.0 += 1;
        }

        let mut keywords: Vec<(String, (usize, usize))> = counts.into_iter().collect();
        keywords.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

        keywords
            .into_iter()
            .take(max_keywords)
            .map(|(word, _)| word)
            .collect()
    }

    fn normalize_unicode(text: &str) -> String {
        text.chars()
            .map(|c| match c {
                '\u{2018}' | '\u{2019}' => '\'',
                '\u{201C}' | '\u{201D}' => '"',
                '\u{2013}' | '\u{2014}' => '-',
                '\u{2022}' | '\u{25CF}' | '\u{25AA}' | '\u{2023}' => '•',
                '\u{2026}' => '.',
                _ => c,
            })
            .collect()
    }

    fn create_stop_words() -> HashSet<&'static str> {
        [
            "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in",
            "is", "it", "its", "of", "on", "or", "that", "the", "to", "was", "will", "with",
            "this", "but", "they", "we", "you", "your", "our", "their", "if", "so", "some",
            "would", "into", "more", "no", "not", "than", "been", "who", "can", "may", "also",
            "any", "all", "such", "should", "must", "other", "about", "over", "per", "via",
            "well", "etc", "including", "within", "across", "who", "what", "which", "when",
            // Job-posting boilerplate
            "experience", "years", "year", "ability", "able", "work", "working", "team",
            "teams", "role", "candidate", "candidates", "required", "requirements",
            "preferred", "responsibilities", "qualifications", "strong", "skills", "knowledge",
            "understanding", "excellent", "good", "plus", "nice", "looking", "join", "company",
            "job", "position", "opportunity", "minimum", "using", "use", "new", "help",
        ]
        .into_iter()
        .collect()
    }
}
