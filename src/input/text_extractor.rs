//! Text extraction from various file formats

use crate::error::{RelevanceError, Result};
use pulldown_cmark::{html, Parser};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokio::fs;

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

pub trait TextExtractor {
    fn extract(&self, path: &Path) -> impl std::future::Future<Output = Result<String>> + Send;
}

pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).await?;
        let display = path.display().to_string();

        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| RelevanceError::PdfExtraction(format!("PDF worker failed for '{display}': {e}")))?
            .map_err(|e| {
                RelevanceError::PdfExtraction(format!(
                    "Failed to extract text from PDF '{display}': {e}"
                ))
            })
    }
}

pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path).await?)
    }
}

pub struct MarkdownExtractor;

impl TextExtractor for MarkdownExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let markdown_content = fs::read_to_string(path).await?;
        Ok(Self::to_plain_text(&markdown_content))
    }
}

impl MarkdownExtractor {
    /// Render Markdown and strip the markup, one block per line.
    pub fn to_plain_text(markdown: &str) -> String {
        let parser = Parser::new(markdown);
        let mut html_output = String::new();
        html::push_html(&mut html_output, parser);

        let text = html_output
            .replace("<br />", "\n")
            .replace("</li>", "\n")
            .replace("</p>", "\n")
            .replace("&nbsp;", " ")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'");

        HTML_TAG
            .replace_all(&text, "")
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_markdown_to_plain_text() {
        let text = MarkdownExtractor::to_plain_text(
            "# Jane Doe\n\n## Skills\n\n- Python & SQL\n- Docker\n\nBuilt **fast** pipelines.",
        );
        assert_eq!(text, "Jane Doe\nSkills\nPython & SQL\nDocker\nBuilt fast pipelines.");
    }

    #[tokio::test]
    async fn test_plain_text_extraction() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Senior Rust Engineer").unwrap();

        let text = PlainTextExtractor.extract(file.path()).await.unwrap();
        assert_eq!(text.trim(), "Senior Rust Engineer");
    }

    #[tokio::test]
    async fn test_invalid_pdf_is_extraction_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not really a pdf").unwrap();

        let err = PdfExtractor.extract(file.path()).await.unwrap_err();
        assert!(matches!(err, RelevanceError::PdfExtraction(_)));
    }
}
