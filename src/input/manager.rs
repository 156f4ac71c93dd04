//! Input manager for handling different file types

use crate::error::{RelevanceError, Result};
use crate::input::file_detector::FileType;
use crate::input::text_extractor::{MarkdownExtractor, PdfExtractor, PlainTextExtractor, TextExtractor};
use crate::processing::document::ResumeDocument;
use log::{debug, info};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct InputManager {
    cache: HashMap<PathBuf, String>,
    enable_cache: bool,
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            enable_cache: true,
        }
    }

    pub fn with_cache(mut self, enable: bool) -> Self {
        self.enable_cache = enable;
        self
    }

    pub async fn extract_text(&mut self, path: &Path) -> Result<String> {
        if self.enable_cache {
            if let Some(cached_text) = self.cache.get(path) {
                debug!("Using cached text for: {}", path.display());
                return Ok(cached_text.clone());
            }
        }

        if !path.exists() {
            return Err(RelevanceError::InvalidInput(format!(
                "File does not exist: {}",
                path.display()
            )));
        }

        let text = match FileType::from_path(path) {
            FileType::Pdf => {
                info!("Extracting text from PDF: {}", path.display());
                PdfExtractor.extract(path).await?
            }
            FileType::Text => {
                debug!("Reading plain text file: {}", path.display());
                PlainTextExtractor.extract(path).await?
            }
            FileType::Markdown => {
                debug!("Processing markdown file: {}", path.display());
                MarkdownExtractor.extract(path).await?
            }
            FileType::Unknown => {
                return Err(RelevanceError::UnsupportedFormat(format!(
                    "Unsupported file type for: {}",
                    path.display()
                )));
            }
        };

        if self.enable_cache {
            self.cache.insert(path.to_path_buf(), text.clone());
        }

        Ok(text)
    }

    /// Extract and structure a resume file.
    pub async fn load_resume(&mut self, path: &Path, min_chars: usize) -> Result<ResumeDocument> {
        let text = self.extract_text(path).await?;
        Ok(ResumeDocument::from_text(&text, min_chars)?
            .with_file_type(FileType::from_path(path))
            .with_source(path.display().to_string()))
    }

    /// Expand directories into their supported files (non-recursive, sorted);
    /// plain file arguments are kept as given.
    pub fn collect_files(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.is_file() && FileType::from_path(p).is_supported())
                    .collect();
                found.sort();
                debug!("Found {} resumes in {}", found.len(), path.display());
                files.extend(found);
            } else {
                files.push(path.clone());
            }
        }
        Ok(files)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_extract_and_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("resume.md");
        fs::write(&path, "# Jane Doe\n\n## Skills\n\n- Rust\n- Go\n").unwrap();

        let mut manager = InputManager::new();
        let text = manager.extract_text(&path).await.unwrap();
        assert!(text.contains("Skills\nRust\nGo"));
        assert_eq!(manager.cache_size(), 1);

        let document = manager.load_resume(&path, 5).await.unwrap();
        assert_eq!(document.metadata().file_type, Some(FileType::Markdown));
        assert_eq!(document.candidate_name(), Some("Jane Doe"));

        manager.clear_cache();
        assert_eq!(manager.cache_size(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_and_missing_files() {
        let dir = tempdir().unwrap();
        let docx = dir.path().join("resume.docx");
        fs::write(&docx, "binary").unwrap();

        let mut manager = InputManager::new();
        let err = manager.extract_text(&docx).await.unwrap_err();
        assert!(matches!(err, RelevanceError::UnsupportedFormat(_)));

        let err = manager
            .extract_text(&dir.path().join("missing.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelevanceError::InvalidInput(_)));
    }

    #[test]
    fn test_collect_files_expands_directories() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.pdf"), "a").unwrap();
        fs::write(dir.path().join("notes.docx"), "x").unwrap();
        let extra = PathBuf::from("extra.md");

        let files = InputManager::new()
            .collect_files(&[dir.path().to_path_buf(), extra.clone()])
            .unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.txt", "extra.md"]);
    }
}
