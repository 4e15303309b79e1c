//! Contracts for the analysis backends the router dispatches to.
//!
//! The router only ever sees these traits. Each backend owns whatever
//! state it needs (a fitted vocabulary, a model handle, an HTTP client) and
//! is responsible for synchronizing it.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Polarity above this is positive, below its negation negative.
pub const NEUTRAL_BAND: f64 = 0.05;

/// Returned by a feature extractor used before it was fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("feature extractor must be fitted before calling transform")]
pub struct UnfittedModelError;

/// One numeric row per input text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<Vec<f32>>,
}

impl FeatureMatrix {
    pub fn new(rows: Vec<Vec<f32>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of the first row, 0 for an empty matrix.
    pub fn dimensions(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }
}

/// Sentiment analysis output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    /// In [-1, 1]
    pub polarity: f64,
}

/// A named entity found in the article, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
}

impl Entity {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Turns texts into a feature matrix.
#[async_trait::async_trait]
pub trait FeatureExtractor: Send + Sync {
    /// Fit on `texts` and return their features.
    async fn fit_transform(&self, texts: &[&str]) -> Result<FeatureMatrix>;

    /// Fails with [`UnfittedModelError`] before the extractor is fitted.
    async fn transform(&self, texts: &[&str]) -> Result<FeatureMatrix>;
}

/// Predicts one category label per feature row.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    async fn predict(&self, features: &FeatureMatrix) -> Result<Vec<String>>;
}

#[async_trait::async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<SentimentScore>;

    fn label_sentiment(&self, polarity: f64) -> String {
        label_polarity(polarity).to_string()
    }
}

#[async_trait::async_trait]
pub trait EntityExtractor: Send + Sync {
    /// May be empty.
    async fn extract(&self, text: &str) -> Result<Vec<Entity>>;
}

/// Topic assignment takes raw text. Backends that work on features extract
/// them on their own.
#[async_trait::async_trait]
pub trait TopicModeler: Send + Sync {
    async fn assign_topic(&self, text: &str) -> Result<usize>;

    async fn get_topic_words(&self, topic_id: usize, n: usize) -> Result<Vec<String>>;
}

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;
}

/// Default polarity-to-label mapping.
pub fn label_polarity(polarity: f64) -> &'static str {
    if polarity > NEUTRAL_BAND {
        "positive"
    } else if polarity < -NEUTRAL_BAND {
        "negative"
    } else {
        "neutral"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_polarity_bands() {
        assert_eq!(label_polarity(0.8), "positive");
        assert_eq!(label_polarity(-0.3), "negative");
        assert_eq!(label_polarity(0.0), "neutral");
        assert_eq!(label_polarity(0.05), "neutral");
        assert_eq!(label_polarity(-0.05), "neutral");
    }

    #[test]
    fn test_feature_matrix_dimensions() {
        assert_eq!(FeatureMatrix::default().dimensions(), 0);
        let m = FeatureMatrix::new(vec![vec![1.0, 2.0, 3.0], vec![0.0, 0.0, 1.0]]);
        assert_eq!(m.len(), 2);
        assert_eq!(m.dimensions(), 3);
    }

    #[test]
    fn test_unfitted_error_survives_anyhow() {
        let err: anyhow::Error = UnfittedModelError.into();
        assert!(err.downcast_ref::<UnfittedModelError>().is_some());
    }
}
