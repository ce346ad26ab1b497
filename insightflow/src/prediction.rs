//! Registry of numeric prediction models.
//!
//! Models map a fixed-length feature vector to a scalar or a class label.
//! They are trained elsewhere and loaded from JSON files. A [`ModelRegistry`]
//! is built once at startup and is read-only afterwards; it is independent
//! of the search pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::PredictionError;

/// The output of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    /// A regression value.
    Scalar(f64),
    /// A class label.
    Label(String),
}

/// A model that can be queried by feature vector.
pub trait Predictor: Send + Sync {
    /// Returns the model identifier.
    fn id(&self) -> &str;

    /// Returns the expected feature vector length.
    fn input_len(&self) -> usize;

    /// Predicts from a feature vector of exactly `input_len()` finite values.
    fn predict(&self, features: &[f64]) -> Result<Prediction, PredictionError>;
}

/// A linear model, optionally turned into a binary classifier through a
/// logistic link.
///
/// With `labels` set, the score `w·x + b` is squashed to a probability and
/// the second label is returned when it reaches 0.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// Model identifier.
    pub id: String,
    /// One weight per feature.
    pub coefficients: Vec<f64>,
    /// Bias term.
    #[serde(default)]
    pub intercept: f64,
    /// Negative and positive class labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<[String; 2]>,
}

impl LinearModel {
    /// Creates a regression model.
    #[must_use]
    pub fn new(id: impl Into<String>, coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            id: id.into(),
            coefficients,
            intercept,
            labels: None,
        }
    }

    /// Turns the model into a binary classifier.
    #[must_use]
    pub fn with_labels(mut self, negative: impl Into<String>, positive: impl Into<String>) -> Self {
        self.labels = Some([negative.into(), positive.into()]);
        self
    }

    /// Loads a model from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, PredictionError> {
        let load_error = |message: String| PredictionError::Load {
            path: path.display().to_string(),
            message,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let model: Self = serde_json::from_str(&raw).map_err(|e| load_error(e.to_string()))?;
        if model.id.trim().is_empty() {
            return Err(load_error("model id must not be empty".into()));
        }
        if model.coefficients.is_empty() {
            return Err(load_error("model has no coefficients".into()));
        }
        if !model.coefficients.iter().chain([&model.intercept]).all(|v| v.is_finite()) {
            return Err(load_error("model weights must be finite".into()));
        }
        Ok(model)
    }

    fn score(&self, features: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept
    }
}

impl Predictor for LinearModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn input_len(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &[f64]) -> Result<Prediction, PredictionError> {
        if features.len() != self.input_len() {
            return Err(PredictionError::malformed(
                &self.id,
                format!("expected {} features, got {}", self.input_len(), features.len()),
            ));
        }
        if let Some(pos) = features.iter().position(|v| !v.is_finite()) {
            return Err(PredictionError::malformed(
                &self.id,
                format!("feature {pos} is not a finite number"),
            ));
        }

        let score = self.score(features);
        Ok(match self.labels {
            Some([ref negative, ref positive]) => {
                let probability = 1.0 / (1.0 + (-score).exp());
                let label = if probability >= 0.5 { positive } else { negative };
                Prediction::Label(label.clone())
            }
            None => Prediction::Scalar(score),
        })
    }
}

/// Collects models before the registry is frozen.
#[derive(Default)]
pub struct ModelRegistryBuilder {
    models: HashMap<String, Arc<dyn Predictor>>,
}

impl std::fmt::Debug for ModelRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&str> = self.models.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("ModelRegistryBuilder").field("models", &ids).finish()
    }
}

impl ModelRegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model under its own id, replacing any earlier model with
    /// the same id.
    #[must_use]
    pub fn register(mut self, model: Arc<dyn Predictor>) -> Self {
        self.models.insert(model.id().to_string(), model);
        self
    }

    /// Loads every `*.json` file in `dir` as a [`LinearModel`].
    pub fn load_dir(mut self, dir: &Path) -> Result<Self, PredictionError> {
        let entries = std::fs::read_dir(dir).map_err(|e| PredictionError::Load {
            path: dir.display().to_string(),
            message: e.to_string(),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let model = LinearModel::from_path(&path)?;
            debug!(model = %model.id, path = %path.display(), "Loaded model");
            self.models.insert(model.id.clone(), Arc::new(model));
        }
        Ok(self)
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> ModelRegistry {
        info!(models = self.models.len(), "Model registry ready");
        ModelRegistry {
            models: self.models,
        }
    }
}

/// Immutable lookup of models by id.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn Predictor>>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.ids())
            .finish()
    }
}

impl ModelRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::new()
    }

    /// Looks up a model.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Predictor>> {
        self.models.get(id).cloned()
    }

    /// Registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.models.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no models are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Runs the model registered under `id`.
    pub fn predict(&self, id: &str, features: &[f64]) -> Result<Prediction, PredictionError> {
        self.models
            .get(id)
            .ok_or_else(|| PredictionError::UnknownModel(id.to_string()))?
            .predict(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_model(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_regression_prediction() {
        let model = LinearModel::new("grid_load", vec![2.0, -1.0], 0.5);
        assert_eq!(model.predict(&[3.0, 1.0]).unwrap(), Prediction::Scalar(5.5));
    }

    #[test]
    fn test_classifier_thresholds_at_half() {
        let model = LinearModel::new("fault", vec![1.0], 0.0).with_labels("normal", "fault");
        assert_eq!(model.predict(&[2.0]).unwrap(), Prediction::Label("fault".into()));
        assert_eq!(model.predict(&[-2.0]).unwrap(), Prediction::Label("normal".into()));
        assert_eq!(model.predict(&[0.0]).unwrap(), Prediction::Label("fault".into()));
    }

    #[test]
    fn test_wrong_length_is_malformed() {
        let model = LinearModel::new("m", vec![1.0, 1.0], 0.0);
        let err = model.predict(&[1.0]).unwrap_err();
        assert_eq!(err, PredictionError::malformed("m", "expected 2 features, got 1"));
    }

    #[test]
    fn test_non_finite_is_malformed() {
        let model = LinearModel::new("m", vec![1.0, 1.0], 0.0);
        let err = model.predict(&[1.0, f64::NAN]).unwrap_err();
        assert!(matches!(err, PredictionError::MalformedInput { .. }));
    }

    #[test]
    fn test_registry_lookup_and_unknown_model() {
        let registry = ModelRegistry::builder()
            .register(Arc::new(LinearModel::new("a", vec![1.0], 0.0)))
            .register(Arc::new(LinearModel::new("b", vec![1.0, 2.0], 1.0)))
            .build();

        assert_eq!(registry.ids(), vec!["a", "b"]);
        assert_eq!(registry.get("b").unwrap().input_len(), 2);
        assert_eq!(registry.predict("b", &[1.0, 1.0]).unwrap(), Prediction::Scalar(4.0));
        assert_eq!(
            registry.predict("missing", &[1.0]).unwrap_err(),
            PredictionError::UnknownModel("missing".into())
        );
    }

    #[test]
    fn test_load_dir_reads_json_models() {
        let dir = tempfile::tempdir().unwrap();
        write_model(
            dir.path(),
            "bess.json",
            r#"{"id": "bess", "coefficients": [0.5, 0.25], "intercept": 1.0}"#,
        );
        write_model(
            dir.path(),
            "fault.json",
            r#"{"id": "fault", "coefficients": [1.0], "labels": ["normal", "fault"]}"#,
        );
        write_model(dir.path(), "README.txt", "not a model");

        let registry = ModelRegistry::builder().load_dir(dir.path()).unwrap().build();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.predict("bess", &[2.0, 4.0]).unwrap(), Prediction::Scalar(3.0));
        assert_eq!(
            registry.predict("fault", &[-3.0]).unwrap(),
            Prediction::Label("normal".into())
        );
    }

    #[test]
    fn test_load_dir_rejects_bad_model() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "broken.json", r#"{"id": "broken", "coefficients": []}"#);

        let err = ModelRegistry::builder().load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, PredictionError::Load { .. }));
        assert!(err.to_string().contains("no coefficients"));
    }

    #[test]
    fn test_missing_dir_is_load_error() {
        let err = ModelRegistry::builder()
            .load_dir(Path::new("/definitely/not/here"))
            .unwrap_err();
        assert!(matches!(err, PredictionError::Load { .. }));
    }

    #[test]
    fn test_builder_debug_lists_model_ids() {
        let builder = ModelRegistry::builder()
            .register(Arc::new(LinearModel::new("b", vec![1.0], 0.0)))
            .register(Arc::new(LinearModel::new("a", vec![1.0], 0.0)));
        assert_eq!(
            format!("{builder:?}"),
            r#"ModelRegistryBuilder { models: ["a", "b"] }"#
        );
    }

    #[test]
    fn test_prediction_serializes_untagged() {
        assert_eq!(serde_json::to_value(Prediction::Scalar(1.5)).unwrap(), serde_json::json!(1.5));
        assert_eq!(
            serde_json::to_value(Prediction::Label("ok".into())).unwrap(),
            serde_json::json!("ok")
        );
    }
}
