//! Skill normalization shared by requirement extraction and lexical matching
//!
//! `normalize_skill` is the single definition of what makes two skill strings
//! "the same". Canonical names in the alias table are fixed points, which
//! makes the function idempotent.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static ALIAS_TO_CANONICAL: LazyLock<HashMap<String, &'static str>> = LazyLock::new(|| {
    let aliases: &[(&str, &[&str])] = &[
        // Languages
        ("python", &["python3", "python 3", "py", "python2", "cpython"]),
        (
            "javascript",
            &["js", "java script", "ecmascript", "es6", "node.js", "nodejs", "node js", "node"],
        ),
        ("typescript", &["ts", "type script"]),
        ("go", &["golang", "go lang"]),
        ("c++", &["cpp", "c plus plus"]),
        ("c#", &["csharp", "c sharp"]),
        ("java", &["java8", "java11", "java17", "openjdk"]),
        ("html", &["html5"]),
        ("css", &["css3", "cascading style sheets"]),
        // Data and ML
        ("sql", &["structured query language", "t-sql", "tsql"]),
        ("postgresql", &["postgres", "postgre sql"]),
        ("mongodb", &["mongo", "mongo db"]),
        (
            "machine learning",
            &["ml", "ai", "artificial intelligence", "machine-learning"],
        ),
        ("deep learning", &["dl", "deep-learning"]),
        ("nlp", &["natural language processing"]),
        ("tensorflow", &["tf", "keras", "tensor flow"]),
        ("pytorch", &["torch", "py torch"]),
        ("scikit-learn", &["sklearn", "scikit learn"]),
        // Cloud and infrastructure
        (
            "aws",
            &["amazon web services", "amazon aws", "aws cloud", "ec2", "s3", "lambda"],
        ),
        ("gcp", &["google cloud platform", "google cloud"]),
        ("azure", &["microsoft azure", "ms azure"]),
        ("docker", &["containerization", "docker compose", "docker-compose"]),
        ("kubernetes", &["k8s", "kube"]),
        ("cicd", &["ci cd", "ci-cd", "continuous integration", "continuous delivery"]),
        ("git", &["git scm", "version control"]),
        // Practices
        ("rest", &["rest api", "restful", "restful api", "rest apis", "restful apis"]),
        ("agile", &["scrum", "kanban"]),
        // Frontend
        ("react", &["reactjs", "react.js", "react js"]),
        ("vue", &["vuejs", "vue.js"]),
        ("angular", &["angularjs", "angular.js"]),
    ];

    // Keys go through the same cleanup as lookups so filler words inside an
    // alias ("structured query language") cannot make it unreachable.
    let mut map = HashMap::new();
    for (canonical, alias_list) in aliases {
        for alias in alias_list.iter() {
            map.insert(clean_phrase(alias), *canonical);
        }
    }
    map
});

/// Words that carry no skill identity ("Python programming" is "python").
static FILLER_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "programming",
        "language",
        "languages",
        "framework",
        "frameworks",
        "library",
        "libraries",
        "tool",
        "tools",
        "platform",
        "platforms",
        "skill",
        "skills",
        "experience",
        "knowledge",
        "proficiency",
        "proficient",
        "expertise",
        "familiarity",
    ]
    .into_iter()
    .collect()
});

/// Connectors dropped only when they lead the phrase ("with docker").
static LEADING_CONNECTORS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "of", "with", "in", "and", "or", "the", "a", "an", "using", "strong", "solid", "good",
        "excellent", "working", "hands-on",
    ]
    .into_iter()
    .collect()
});

static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid parenthesis regex"));

const SEPARATORS: &[char] = &[
    '/', '_', '|', ',', ';', ':', '"', '\'', '`', '*', '•', '(', ')', '[', ']', '{', '}', '!', '?',
];

/// Lowercase, strip parentheticals and punctuation, drop filler words,
/// collapse whitespace and fold synonyms onto a canonical name.
pub fn normalize_skill(raw: &str) -> String {
    let collapsed = clean_phrase(raw);
    match ALIAS_TO_CANONICAL.get(collapsed.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => collapsed,
    }
}

fn clean_phrase(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let without_parens = PARENTHESIZED.replace_all(&lowered, " ");
    let separated: String = without_parens
        .chars()
        .map(|c| if SEPARATORS.contains(&c) { ' ' } else { c })
        .collect();

    let mut words: Vec<&str> = separated
        .split_whitespace()
        .map(trim_word)
        .filter(|w| !w.is_empty() && !FILLER_WORDS.contains(w))
        .collect();

    while let Some(first) = words.first() {
        if LEADING_CONNECTORS.contains(first) {
            words.remove(0);
        } else {
            break;
        }
    }

    words.join(" ")
}

/// Split free text into lowercase word tokens with edge punctuation removed.
/// Symbols that belong to skill names (`c++`, `c#`, `node.js`) survive.
pub fn word_tokens(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    lowered
        .split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .map(trim_word)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `needle` (already normalized) occurs in `haystack` as whole words.
pub fn contains_term(haystack_tokens: &[String], needle: &str) -> bool {
    let needle_words: Vec<&str> = needle.split_whitespace().collect();
    if needle_words.is_empty() {
        return false;
    }
    haystack_tokens
        .windows(needle_words.len())
        .any(|window| window.iter().zip(&needle_words).all(|(a, b)| a == b))
}

/// Whether any n-gram of `text`, normalized like a skill, is one of
/// `skills` (canonical names). Catches aliases such as "JS" for javascript.
pub fn mentions_any_skill(text: &str, skills: &HashSet<String>) -> bool {
    let longest = skills
        .iter()
        .map(|skill| skill.split_whitespace().count())
        .max()
        .unwrap_or(0);
    if longest == 0 {
        return false;
    }

    let tokens = word_tokens(text);
    (1..=longest).any(|n| {
        tokens
            .windows(n)
            .any(|window| skills.contains(&normalize_skill(&window.join(" "))))
    })
}

fn trim_word(word: &str) -> &str {
    word.trim_end_matches(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .trim_start_matches(|c: char| !(c.is_alphanumeric() || c == '.' || c == '#'))
}
