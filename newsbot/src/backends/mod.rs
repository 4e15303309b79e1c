//! Concrete capability backends.
//!
//! `features` holds the embedding extractor and the centroid classifier used
//! for category questions, `llm` the prompt-based sentiment, entity, topic
//! and summary backends, and `extractive` a summarizer that needs no model.

pub mod extractive;
pub mod features;
pub mod llm;

pub use extractive::ExtractiveSummarizer;
pub use features::{CentroidClassifier, EmbeddingFeatureExtractor};
pub use llm::{LlmEntityExtractor, LlmSentimentAnalyzer, LlmSummarizer, LlmTopicModeler, Topic};
