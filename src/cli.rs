//! CLI interface for resume relevance scoring

use crate::config::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "resume-relevance")]
#[command(about = "Hybrid resume and job description relevance scoring")]
#[command(long_about = "Score resumes against a job description by combining exact/fuzzy skill matching, embedding similarity and structured LLM reasoning")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score one resume against a job description
    Score {
        /// Path to resume file (PDF, TXT, MD)
        #[arg(short, long)]
        resume: PathBuf,

        /// Path to job description file (TXT, MD, or structured JSON)
        #[arg(short, long)]
        job: PathBuf,

        /// Skip the LLM reasoning signal
        #[arg(long)]
        no_reasoning: bool,

        /// Include fuzzy matches, qualification checks and the rationale
        #[arg(short, long)]
        detailed: bool,

        /// Output format: console, json, markdown
        #[arg(short, long)]
        output: Option<String>,

        /// Save output to file
        #[arg(short, long)]
        save: Option<PathBuf>,
    },

    /// Score and rank many resumes against one job description
    Batch {
        /// Path to job description file (TXT, MD, or structured JSON)
        #[arg(short, long)]
        job: PathBuf,

        /// Resume files or directories containing resumes
        #[arg(short, long, num_args = 1.., required = true)]
        resumes: Vec<PathBuf>,

        /// Maximum number of resumes analyzed at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Skip the LLM reasoning signal
        #[arg(long)]
        no_reasoning: bool,

        /// Include the score histogram
        #[arg(short, long)]
        detailed: bool,

        /// Output format: console, json, markdown
        #[arg(short, long)]
        output: Option<String>,

        /// Save output to file
        #[arg(short, long)]
        save: Option<PathBuf>,
    },

    /// Show the requirements extracted from a job description
    Requirements {
        /// Path to job description file (TXT, MD)
        #[arg(short, long)]
        job: PathBuf,
    },

    /// Show or reset configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,

    /// Print the configuration file location
    Path,
}

/// Parse and validate output format
pub fn parse_output_format(format: &str) -> Result<OutputFormat, String> {
    match format.to_lowercase().as_str() {
        "console" => Ok(OutputFormat::Console),
        "json" => Ok(OutputFormat::Json),
        "markdown" | "md" => Ok(OutputFormat::Markdown),
        _ => Err(format!(
            "Invalid output format: {}. Supported: console, json, markdown",
            format
        )),
    }
}

/// Validate file extension
pub fn validate_file_extension(path: &Path, allowed_extensions: &[&str]) -> Result<(), String> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => {
            if allowed_extensions.contains(&ext.to_lowercase().as_str()) {
                Ok(())
            } else {
                Err(format!(
                    "Unsupported file extension: .{}. Allowed: {}",
                    ext,
                    allowed_extensions.join(", ")
                ))
            }
        }
        None => Err("File has no extension".to_string()),
    }
}
