//! File type detection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Text,
    Markdown,
    Unknown,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => FileType::Pdf,
            "txt" | "text" => FileType::Text,
            "md" | "markdown" => FileType::Markdown,
            _ => FileType::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(FileType::Unknown)
    }

    pub fn is_supported(self) -> bool {
        self != FileType::Unknown
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileType::Pdf => "pdf",
            FileType::Text => "text",
            FileType::Markdown => "markdown",
            FileType::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_by_extension() {
        assert_eq!(FileType::from_path(Path::new("cv.PDF")), FileType::Pdf);
        assert_eq!(FileType::from_path(Path::new("cv.md")), FileType::Markdown);
        assert_eq!(FileType::from_path(Path::new("cv.txt")), FileType::Text);
        assert_eq!(FileType::from_path(Path::new("cv.docx")), FileType::Unknown);
        assert_eq!(FileType::from_path(Path::new("README")), FileType::Unknown);
        assert!(!FileType::Unknown.is_supported());
    }
}
