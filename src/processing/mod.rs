//! Text processing, matching and scoring

pub mod normalize;
pub mod text_processor;
pub mod document;
pub mod vocabulary;
pub mod requirements;
pub mod signals;
pub mod hard_matcher;
pub mod embeddings;
pub mod semantic;
pub mod aggregator;
pub mod analyzer;
pub mod batch;
