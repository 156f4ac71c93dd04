//! Output formatters for single results and batch reports

use crate::config::OutputFormat;
use crate::error::{RelevanceError, Result};
use crate::processing::aggregator::{MatchResult, Verdict};
use crate::processing::batch::BatchReport;
use crate::processing::signals::{MatchSignal, SignalKind};
use colored::{Color, Colorize};
use std::path::Path;

const HISTOGRAM_WIDTH: usize = 30;

/// Trait for rendering analysis results
pub trait OutputFormatter {
    fn format_result(&self, result: &MatchResult) -> Result<String>;
    fn format_batch(&self, report: &BatchReport) -> Result<String>;
    fn supports_format(&self) -> OutputFormat;
}

/// Console formatter with optional colors
pub struct ConsoleFormatter {
    use_colors: bool,
    detailed: bool,
}

/// JSON formatter for machine consumption
pub struct JsonFormatter {
    pretty: bool,
}

/// Markdown formatter for saved reports
pub struct MarkdownFormatter {
    include_metadata: bool,
}

impl ConsoleFormatter {
    pub fn new(use_colors: bool, detailed: bool) -> Self {
        Self { use_colors, detailed }
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        if self.use_colors {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn format_header(&self, title: &str, level: u8) -> String {
        let prefix = match level {
            1 => "█",
            2 => "▓",
            _ => "▒",
        };

        let color = match level {
            1 => Color::Blue,
            2 => Color::Green,
            _ => Color::Yellow,
        };

        if self.use_colors {
            format!("\n{} {}\n", prefix.color(color).bold(), title.color(color).bold())
        } else {
            format!("\n{} {}\n", prefix, title)
        }
    }

    fn format_verdict_badge(&self, verdict: Verdict) -> String {
        let color = verdict_color(verdict);
        let badge = verdict.to_string().to_uppercase();
        if self.use_colors {
            format!("[{}]", badge.color(color).bold())
        } else {
            format!("[{}]", badge)
        }
    }

    fn format_signal_line(&self, result: &MatchResult, kind: SignalKind) -> String {
        let label = format!("{:<10}", kind.to_string());
        match (result.signal(kind), result.weight(kind)) {
            (Some(signal), Some(weight)) => format!(
                "  {} {:>5.1}  (weight {:.0}%){}\n",
                label,
                signal.score(),
                weight * 100.0,
                signal_note(signal)
            ),
            _ => {
                let status = match kind {
                    SignalKind::Reasoning => result.reasoning_status.to_string(),
                    SignalKind::Semantic => result.semantic_status.to_string(),
                    SignalKind::Hard => "unavailable".to_string(),
                };
                format!("  {} {}\n", label, self.colorize(&format!("-- ({status})"), Color::BrightBlack))
            }
        }
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_result(&self, result: &MatchResult) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.format_header("RESUME RELEVANCE", 1));
        output.push_str(&format!("Role: {}\n", result.role_title));
        if let Some(name) = &result.candidate_name {
            output.push_str(&format!("Candidate: {}\n", name));
        }

        output.push_str(&self.format_header("Summary", 2));
        output.push_str(&format!(
            "Score: {:.1}/100 {}\n",
            result.score,
            self.format_verdict_badge(result.verdict)
        ));
        output.push_str(&format!("Confidence: {:.0}%\n", result.confidence * 100.0));

        output.push_str(&self.format_header("Signals", 3));
        for kind in SignalKind::ALL {
            output.push_str(&self.format_signal_line(result, kind));
        }

        output.push_str(&self.format_header("Skills", 3));
        output.push_str(&format!(
            "Matched: {}\n",
            self.colorize(&join_or_none(&result.matched_skills), Color::Green)
        ));
        output.push_str(&format!(
            "Missing (must have): {}\n",
            self.colorize(&join_or_none(&result.missing_must_have), Color::Red)
        ));
        output.push_str(&format!(
            "Missing (good to have): {}\n",
            self.colorize(&join_or_none(&result.missing_good_to_have), Color::Yellow)
        ));

        if self.detailed {
            if let Some(evidence) = result.hard_evidence() {
                let fuzzy: Vec<String> = evidence
                    .fuzzy_matches()
                    .map(|m| format!("{} ~ \"{}\" ({:.2})", m.skill, m.resume_term, m.similarity))
                    .collect();
                if !fuzzy.is_empty() {
                    output.push_str(&format!("Fuzzy matches: {}\n", fuzzy.join(", ")));
                }
                for check in &evidence.qualifications {
                    let mark = if check.met { "✓" } else { "✗" };
                    output.push_str(&format!("  {} {}\n", mark, check.requirement));
                }
                if let Some(experience) = &evidence.experience {
                    let found = experience
                        .resume_years
                        .map(|y| format!("{y:.0} years"))
                        .unwrap_or_else(|| "unknown".to_string());
                    output.push_str(&format!(
                        "Experience: {:.0}+ years required, {} found\n",
                        experience.required_years, found
                    ));
                }
            }
        }

        if !result.recommendations.is_empty() {
            output.push_str(&self.format_header("Recommendations", 3));
            for (i, recommendation) in result.recommendations.iter().enumerate() {
                output.push_str(&format!("{}. {}\n", i + 1, recommendation));
            }
        }

        if self.detailed {
            if let Some(rationale) = result.rationale() {
                output.push_str(&self.format_header("Reasoning", 3));
                output.push_str(rationale);
                output.push('\n');
            }
        }

        Ok(output)
    }

    fn format_batch(&self, report: &BatchReport) -> Result<String> {
        let mut output = String::new();
        let stats = &report.statistics;

        output.push_str(&self.format_header("BATCH RELEVANCE REPORT", 1));
        output.push_str(&format!("Role: {}\n", report.role_title));
        output.push_str(&format!(
            "Resumes: {} | Scored: {} | Failed: {}\n",
            stats.total, stats.scored, stats.failed
        ));
        if report.cancelled {
            output.push_str(&self.colorize("Run was cancelled before every resume was dispatched\n", Color::Yellow));
        }

        output.push_str(&self.format_header("Ranking", 2));
        for (rank, entry) in report.ranked().into_iter().enumerate() {
            match entry.result() {
                Some(result) => output.push_str(&format!(
                    "{:>3}. {:<32} {:>5.1} {}\n",
                    rank + 1,
                    truncate(&entry.resume_id, 32),
                    result.score,
                    self.format_verdict_badge(result.verdict)
                )),
                None => output.push_str(&format!(
                    "  -  {:<32} {}\n",
                    truncate(&entry.resume_id, 32),
                    self.colorize(&format!("failed: {}", entry.failure().unwrap_or("unknown")), Color::Red)
                )),
            }
        }

        if stats.scored > 0 {
            output.push_str(&self.format_header("Statistics", 3));
            output.push_str(&format!(
                "Mean {:.1} | Median {:.1} | Min {:.1} | Max {:.1}\n",
                stats.mean.unwrap_or_default(),
                stats.median.unwrap_or_default(),
                stats.min.unwrap_or_default(),
                stats.max.unwrap_or_default()
            ));
            output.push_str(&format!(
                "High: {} | Medium: {} | Low: {}\n",
                stats.verdicts.high, stats.verdicts.medium, stats.verdicts.low
            ));

            if self.detailed {
                let peak = stats.histogram.iter().copied().max().unwrap_or(0).max(1);
                for (bucket, count) in stats.histogram.iter().enumerate() {
                    let bar = "#".repeat(count * HISTOGRAM_WIDTH / peak);
                    output.push_str(&format!("{:>3}-{:<3} {:<30} {}\n", bucket * 10, bucket * 10 + 10, bar, count));
                }
            }
        }

        if !stats.common_missing_skills.is_empty() {
            output.push_str(&self.format_header("Most Common Gaps", 3));
            for gap in &stats.common_missing_skills {
                output.push_str(&format!("  • {} ({})\n", gap.skill, gap.count));
            }
        }

        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Console
    }
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn to_json<T: serde::Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        json.map_err(RelevanceError::Serialization)
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_result(&self, result: &MatchResult) -> Result<String> {
        self.to_json(result)
    }

    fn format_batch(&self, report: &BatchReport) -> Result<String> {
        self.to_json(report)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Json
    }
}

impl MarkdownFormatter {
    pub fn new(include_metadata: bool) -> Self {
        Self { include_metadata }
    }
}

impl OutputFormatter for MarkdownFormatter {
    fn format_result(&self, result: &MatchResult) -> Result<String> {
        let mut output = String::new();

        output.push_str(&format!("# Resume Relevance: {}\n\n", result.role_title));
        if self.include_metadata {
            if let Some(name) = &result.candidate_name {
                output.push_str(&format!("**Candidate:** {}  \n", name));
            }
            output.push_str(&format!(
                "**Analyzed:** {}\n\n",
                result.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }

        output.push_str("## Summary\n\n");
        output.push_str(&format!("- **Score:** {:.1}/100\n", result.score));
        output.push_str(&format!("- **Verdict:** {}\n", result.verdict));
        output.push_str(&format!("- **Confidence:** {:.0}%\n\n", result.confidence * 100.0));

        output.push_str("## Signals\n\n");
        output.push_str("| Signal | Score | Weight |\n|---|---|---|\n");
        for kind in SignalKind::ALL {
            match (result.signal(kind), result.weight(kind)) {
                (Some(signal), Some(weight)) => output.push_str(&format!(
                    "| {} | {:.1} | {:.0}% |\n",
                    kind,
                    signal.score(),
                    weight * 100.0
                )),
                _ => output.push_str(&format!("| {} | n/a | 0% |\n", kind)),
            }
        }
        output.push('\n');

        output.push_str("## Skills\n\n");
        output.push_str(&format!("- **Matched:** {}\n", join_or_none(&result.matched_skills)));
        output.push_str(&format!("- **Missing (must have):** {}\n", join_or_none(&result.missing_must_have)));
        output.push_str(&format!(
            "- **Missing (good to have):** {}\n\n",
            join_or_none(&result.missing_good_to_have)
        ));

        if !result.recommendations.is_empty() {
            output.push_str("## Recommendations\n\n");
            for recommendation in &result.recommendations {
                output.push_str(&format!("- {}\n", recommendation));
            }
            output.push('\n');
        }

        if let Some(rationale) = result.rationale() {
            output.push_str("## Reasoning\n\n");
            output.push_str(&format!("> {}\n", rationale));
        }

        Ok(output)
    }

    fn format_batch(&self, report: &BatchReport) -> Result<String> {
        let mut output = String::new();
        let stats = &report.statistics;

        output.push_str(&format!("# Batch Relevance: {}\n\n", report.role_title));
        if self.include_metadata {
            output.push_str(&format!(
                "**Started:** {}  \n**Finished:** {}\n\n",
                report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
                report.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        if report.cancelled {
            output.push_str("_The run was cancelled; undispatched resumes are listed as failed._\n\n");
        }

        output.push_str("## Ranking\n\n| Rank | Resume | Score | Verdict |\n|---|---|---|---|\n");
        for (rank, entry) in report.ranked().into_iter().enumerate() {
            match entry.result() {
                Some(result) => output.push_str(&format!(
                    "| {} | {} | {:.1} | {} |\n",
                    rank + 1,
                    entry.resume_id,
                    result.score,
                    result.verdict
                )),
                None => output.push_str(&format!(
                    "| - | {} | - | failed: {} |\n",
                    entry.resume_id,
                    entry.failure().unwrap_or("unknown")
                )),
            }
        }
        output.push('\n');

        output.push_str("## Statistics\n\n");
        output.push_str(&format!(
            "- **Resumes:** {} ({} scored, {} failed)\n",
            stats.total, stats.scored, stats.failed
        ));
        if let (Some(mean), Some(median)) = (stats.mean, stats.median) {
            output.push_str(&format!("- **Mean:** {:.1}\n- **Median:** {:.1}\n", mean, median));
        }
        output.push_str(&format!(
            "- **Verdicts:** {} high, {} medium, {} low\n\n",
            stats.verdicts.high, stats.verdicts.medium, stats.verdicts.low
        ));

        if !stats.common_missing_skills.is_empty() {
            output.push_str("## Most Common Gaps\n\n");
            for gap in &stats.common_missing_skills {
                output.push_str(&format!("- {} ({})\n", gap.skill, gap.count));
            }
        }

        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Markdown
    }
}

/// Dispatches to the formatter for the requested format.
pub struct ReportGenerator {
    console_formatter: ConsoleFormatter,
    json_formatter: JsonFormatter,
    markdown_formatter: MarkdownFormatter,
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self {
            console_formatter: ConsoleFormatter::new(true, false),
            json_formatter: JsonFormatter::new(true),
            markdown_formatter: MarkdownFormatter::new(true),
        }
    }

    pub fn with_options(use_colors: bool, detailed: bool, pretty_json: bool, include_metadata: bool) -> Self {
        Self {
            console_formatter: ConsoleFormatter::new(use_colors, detailed),
            json_formatter: JsonFormatter::new(pretty_json),
            markdown_formatter: MarkdownFormatter::new(include_metadata),
        }
    }

    fn formatter(&self, format: &OutputFormat) -> &dyn OutputFormatter {
        match format {
            OutputFormat::Console => &self.console_formatter,
            OutputFormat::Json => &self.json_formatter,
            OutputFormat::Markdown => &self.markdown_formatter,
        }
    }

    pub fn generate_report(&self, result: &MatchResult, format: &OutputFormat) -> Result<String> {
        self.formatter(format).format_result(result)
    }

    pub fn generate_batch_report(&self, report: &BatchReport, format: &OutputFormat) -> Result<String> {
        self.formatter(format).format_batch(report)
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn verdict_color(verdict: Verdict) -> Color {
    match verdict {
        Verdict::High => Color::Green,
        Verdict::Medium => Color::Yellow,
        Verdict::Low => Color::Red,
    }
}

fn signal_note(signal: &MatchSignal) -> String {
    match signal {
        MatchSignal::Semantic(semantic) => format!(" similarity {:.3}", semantic.similarity),
        MatchSignal::Reasoning(reasoning) if reasoning.degraded => " degraded".to_string(),
        MatchSignal::Reasoning(reasoning) if reasoning.cached => " cached".to_string(),
        _ => String::new(),
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

pub fn save_report_to_file(content: &str, file_path: &Path) -> Result<()> {
    use std::fs;
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(file_path, content)?;
    Ok(())
}

pub fn suggest_filename(format: &OutputFormat, resume_name: &str, timestamp: bool) -> String {
    let base_name = Path::new(resume_name)
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();

    let timestamp_suffix = if timestamp {
        format!("_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"))
    } else {
        String::new()
    };

    let extension = match format {
        OutputFormat::Console => "txt",
        OutputFormat::Json => "json",
        OutputFormat::Markdown => "md",
    };
    format!("{}_relevance{}.{}", base_name, timestamp_suffix, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::analyzer::ReasoningStatus;
    use crate::processing::aggregator::{SemanticStatus, SignalWeight};
    use crate::processing::batch::{BatchEntry, BatchStatistics};
    use crate::processing::signals::ReasoningSignal;
    use chrono::Utc;
    use tempfile::tempdir;

    fn sample_result(score: f64) -> MatchResult {
        MatchResult {
            candidate_name: Some("Jane Doe".to_string()),
            role_title: "Data Engineer".to_string(),
            score,
            verdict: Verdict::from_score(score),
            confidence: 0.5,
            missing_must_have: vec!["aws".to_string()],
            missing_good_to_have: vec![],
            matched_skills: vec!["python".to_string(), "sql".to_string()],
            recommendations: vec!["Add evidence of aws experience".to_string()],
            signals: vec![MatchSignal::Reasoning(ReasoningSignal {
                score,
                rationale: "Strong SQL background but no cloud exposure.".to_string(),
                degraded: false,
                cached: false,
            })],
            weights: vec![SignalWeight {
                kind: SignalKind::Reasoning,
                weight: 1.0,
            }],
            semantic_status: SemanticStatus::Unavailable,
            reasoning_status: ReasoningStatus::Fresh,
            analyzed_at: Utc::now(),
        }
    }

    fn sample_batch() -> BatchReport {
        let entries = vec![
            BatchEntry::scored("low.txt".to_string(), sample_result(35.0)),
            BatchEntry::failed("empty.txt".to_string(), "no text"),
            BatchEntry::scored("high.txt".to_string(), sample_result(82.0)),
        ];
        BatchReport {
            role_title: "Data Engineer".to_string(),
            statistics: BatchStatistics::from_entries(&entries, 5),
            entries,
            cancelled: false,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_console_output_without_colors() {
        let formatter = ConsoleFormatter::new(false, true);
        let output = formatter.format_result(&sample_result(66.7)).unwrap();

        assert!(output.contains("Score: 66.7/100 [MEDIUM]"));
        assert!(output.contains("Missing (must have): aws"));
        assert!(output.contains("semantic   -- (unavailable)"));
        assert!(output.contains("no cloud exposure"));
        assert!(!output.contains("\u{1b}["));
    }

    #[test]
    fn test_console_batch_ranks_scored_before_failed() {
        let output = ConsoleFormatter::new(false, false)
            .format_batch(&sample_batch())
            .unwrap();

        let high = output.find("high.txt").unwrap();
        let low = output.find("low.txt").unwrap();
        let failed = output.find("failed: no text").unwrap();
        assert!(high < low && low < failed);
        assert!(output.contains("High: 1 | Medium: 0 | Low: 1"));
        assert!(output.contains("aws (2)"));
    }

    #[test]
    fn test_json_output_is_parseable() {
        let json = JsonFormatter::new(false).format_result(&sample_result(82.0)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["verdict"], "High");
        assert_eq!(value["reasoning_status"], "fresh");

        let batch = JsonFormatter::new(true).format_batch(&sample_batch()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&batch).unwrap();
        assert_eq!(value["statistics"]["failed"], 1);
        assert_eq!(value["entries"][1]["status"], "failed");
    }

    #[test]
    fn test_markdown_output() {
        let generator = ReportGenerator::with_options(false, false, true, false);
        let output = generator
            .generate_report(&sample_result(82.0), &OutputFormat::Markdown)
            .unwrap();
        assert!(output.starts_with("# Resume Relevance: Data Engineer"));
        assert!(output.contains("| reasoning | 82.0 | 100% |"));
        assert!(output.contains("| hard | n/a | 0% |"));

        let batch = generator
            .generate_batch_report(&sample_batch(), &OutputFormat::Markdown)
            .unwrap();
        assert!(batch.contains("| 1 | high.txt | 82.0 | High |"));
    }

    #[test]
    fn test_save_and_suggest_filename() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports").join("out.md");
        save_report_to_file("# report", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# report");

        assert_eq!(
            suggest_filename(&OutputFormat::Json, "resumes/jane.pdf", false),
            "jane_relevance.json"
        );
    }
}
