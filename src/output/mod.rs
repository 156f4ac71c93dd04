//! Report rendering for the command line

pub mod formatter;

pub use formatter::{ReportGenerator, save_report_to_file, suggest_filename};
