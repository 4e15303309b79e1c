//! Embedding features and the nearest-centroid category backend.

use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::capabilities::{Classifier, FeatureExtractor, FeatureMatrix, UnfittedModelError};
use crate::llm::LlmProvider;

/// Embeds texts through an [`LlmProvider`] and centres them on the mean of
/// the corpus it was fitted on.
pub struct EmbeddingFeatureExtractor {
    provider: Arc<dyn LlmProvider>,
    mean: RwLock<Option<Vec<f32>>>,
}

impl EmbeddingFeatureExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            mean: RwLock::new(None),
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    async fn embed_all(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut rows = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            let row = self
                .provider
                .embed(text)
                .await
                .with_context(|| format!("Failed to embed text #{}", i))?;
            if let Some(first) = rows.first().map(Vec::len) {
                anyhow::ensure!(
                    row.len() == first,
                    "embedding #{} has {} dimensions, expected {}",
                    i,
                    row.len(),
                    first
                );
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait::async_trait]
impl FeatureExtractor for EmbeddingFeatureExtractor {
    async fn fit_transform(&self, texts: &[&str]) -> Result<FeatureMatrix> {
        anyhow::ensure!(!texts.is_empty(), "cannot fit a feature extractor on an empty corpus");

        let rows = self.embed_all(texts).await?;
        let mean = mean_vector(&rows);
        let centred = rows.iter().map(|row| subtract(row, &mean)).collect();

        info!("Feature extractor fitted on {} texts ({} dimensions)", texts.len(), mean.len());
        *self.mean.write().unwrap_or_else(PoisonError::into_inner) = Some(mean);

        Ok(FeatureMatrix::new(centred))
    }

    async fn transform(&self, texts: &[&str]) -> Result<FeatureMatrix> {
        // Clone out so no guard is held across the embedding calls.
        let mean = self
            .mean
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(UnfittedModelError)?;

        let rows = self.embed_all(texts).await?;
        let mut centred = Vec::with_capacity(rows.len());
        for row in &rows {
            anyhow::ensure!(
                row.len() == mean.len(),
                "embedding has {} dimensions but the extractor was fitted on {}",
                row.len(),
                mean.len()
            );
            centred.push(subtract(row, &mean));
        }
        Ok(FeatureMatrix::new(centred))
    }
}

/// Predicts the label whose centroid is most cosine-similar to each row.
#[derive(Debug, Clone)]
pub struct CentroidClassifier {
    centroids: Vec<(String, Vec<f32>)>,
}

impl CentroidClassifier {
    /// One centroid per distinct label, in first-seen order.
    pub fn fit(labels: &[String], features: &FeatureMatrix) -> Result<Self> {
        anyhow::ensure!(
            labels.len() == features.len(),
            "got {} labels for {} feature rows",
            labels.len(),
            features.len()
        );
        anyhow::ensure!(!labels.is_empty(), "cannot fit a classifier without examples");

        let mut grouped: Vec<(String, Vec<Vec<f32>>)> = Vec::new();
        for (label, row) in labels.iter().zip(features.rows()) {
            match grouped.iter_mut().find(|(l, _)| l == label) {
                Some((_, rows)) => rows.push(row.clone()),
                None => grouped.push((label.clone(), vec![row.clone()])),
            }
        }

        let centroids = grouped
            .into_iter()
            .map(|(label, rows)| (label, mean_vector(&rows)))
            .collect();

        Ok(Self { centroids })
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.centroids.iter().map(|(label, _)| label.as_str())
    }

    fn nearest(&self, row: &[f32]) -> Option<&str> {
        let mut best: Option<(&str, f32)> = None;
        for (label, centroid) in &self.centroids {
            let score = cosine_similarity(row, centroid);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((label.as_str(), score));
            }
        }
        best.map(|(label, _)| label)
    }
}

#[async_trait::async_trait]
impl Classifier for CentroidClassifier {
    async fn predict(&self, features: &FeatureMatrix) -> Result<Vec<String>> {
        if let Some((_, centroid)) = self.centroids.first() {
            anyhow::ensure!(
                features.is_empty() || features.dimensions() == centroid.len(),
                "features have {} dimensions but the classifier was fitted on {}",
                features.dimensions(),
                centroid.len()
            );
        }
        let labels = features
            .rows()
            .iter()
            .map(|row| self.nearest(row).map(str::to_string).context("classifier has no centroids"))
            .collect::<Result<Vec<_>>>()?;
        debug!("Predicted labels: {:?}", labels);
        Ok(labels)
    }
}

fn mean_vector(rows: &[Vec<f32>]) -> Vec<f32> {
    let dims = rows.first().map(Vec::len).unwrap_or(0);
    let mut mean = vec![0.0; dims];
    for row in rows {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    let n = rows.len().max(1) as f32;
    mean.iter_mut().for_each(|m| *m /= n);
    mean
}

fn subtract(row: &[f32], mean: &[f32]) -> Vec<f32> {
    row.iter().zip(mean).map(|(v, m)| v - m).collect()
}

/// 0.0 when either vector has zero norm.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
