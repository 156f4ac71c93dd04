//! LLM reasoning signal

pub mod client;
pub mod prompts;
pub mod policy;
pub mod rate_limiter;
pub mod analyzer;
