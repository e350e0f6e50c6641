use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skewer::worker::{BatchTransform, TransformError};

const LABELS: [&str; 4] = ["cat", "dog", "bird", "fish"];

/// One label/score pair of a classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub probability: f32,
}

/// A stand-in classifier: scores each flattened image by bucketing its mean
/// intensity across a fixed label set.
pub struct Model {
    top_k: usize,
}

impl Model {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    fn classify(&self, pixels: &[f32]) -> Vec<Prediction> {
        let mean = pixels.iter().sum::<f32>() / pixels.len() as f32;
        let mut scores: Vec<(usize, f32)> = LABELS
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let center = (i as f32 + 0.5) / LABELS.len() as f32;
                (i, 1.0 / (1.0 + (mean - center).abs() * 10.0))
            })
            .collect();
        let total: f32 = scores.iter().map(|(_, s)| s).sum();
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));

        scores
            .into_iter()
            .take(self.top_k)
            .map(|(i, s)| Prediction {
                label: LABELS[i].to_string(),
                probability: s / total,
            })
            .collect()
    }
}

#[async_trait]
impl BatchTransform<Vec<f32>, Vec<Prediction>> for Model {
    async fn forward(&self, batch: Vec<Vec<f32>>) -> Result<Vec<Vec<Prediction>>, TransformError> {
        if let Some(position) = batch.iter().position(Vec::is_empty) {
            return Err(TransformError::Batch(format!("image {position} has no pixels")));
        }
        Ok(batch.iter().map(|pixels| self.classify(pixels)).collect())
    }
}
