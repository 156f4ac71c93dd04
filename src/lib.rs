//! Hybrid resume relevance scoring library

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod processing;
pub mod llm;
pub mod output;

pub use error::{Result, RelevanceError};
pub use config::Config;
pub use processing::aggregator::{MatchResult, Verdict};
pub use processing::analyzer::{AnalysisEngine, JobContext};
pub use processing::batch::{BatchReport, BatchRunner, CancellationFlag, ResumeInput};
pub use processing::requirements::JobRequirement;
