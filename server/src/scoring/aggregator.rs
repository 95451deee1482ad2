//! Composite score aggregation.
//!
//! Pure, deterministic reduction of per-model scores into one composite
//! bias score with a confidence value.

use serde::{Deserialize, Serialize};

use crate::db::ModelScore;

/// One configured model and its aggregation weight.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ModelWeight {
    /// Model identifier as sent to the provider.
    pub model_name: String,
    /// Relative weight in the composite mean.
    pub weight: f64,
}

/// Aggregation configuration, re-read at the start of every pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CompositeScoreConfig {
    /// Lower bound of the composite score.
    pub min_score: f64,
    /// Upper bound of the composite score.
    pub max_score: f64,
    /// Composite to fall back to when no configured model contributed.
    /// `None` forbids the fallback and makes that case an error.
    pub default_missing: Option<f64>,
    /// Models the pipeline queries, in order.
    pub models: Vec<ModelWeight>,
}

impl Default for CompositeScoreConfig {
    fn default() -> Self {
        Self {
            min_score: -1.0,
            max_score: 1.0,
            default_missing: None,
            models: vec![
                ModelWeight {
                    model_name: "openai/gpt-4o-mini".to_string(),
                    weight: 1.0,
                },
                ModelWeight {
                    model_name: "anthropic/claude-3-5-haiku".to_string(),
                    weight: 1.0,
                },
                ModelWeight {
                    model_name: "google/gemini-2.0-flash".to_string(),
                    weight: 1.0,
                },
            ],
        }
    }
}

/// Errors loading or validating the aggregation configuration.
#[derive(Debug, thiserror::Error)]
pub enum ScoreConfigError {
    #[error("failed to read score config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse score config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid score config: {0}")]
    Invalid(String),
}

impl CompositeScoreConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn load(path: &str) -> Result<Self, ScoreConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ScoreConfigError> {
        if self.models.is_empty() {
            return Err(ScoreConfigError::Invalid("no models configured".into()));
        }
        if !(self.min_score < self.max_score) {
            return Err(ScoreConfigError::Invalid(
                "min_score must be below max_score".into(),
            ));
        }
        for model in &self.models {
            if model.model_name.is_empty() {
                return Err(ScoreConfigError::Invalid("empty model name".into()));
            }
            if !model.weight.is_finite() || model.weight < 0.0 {
                return Err(ScoreConfigError::Invalid(format!(
                    "model {} has invalid weight {}",
                    model.model_name, model.weight
                )));
            }
        }
        if let Some(default) = self.default_missing {
            if !default.is_finite() || default < self.min_score || default > self.max_score {
                return Err(ScoreConfigError::Invalid(format!(
                    "default_missing {default} outside [{}, {}]",
                    self.min_score, self.max_score
                )));
            }
        }
        Ok(())
    }
}

/// Composite score and its confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate {
    /// Weighted mean of contributing scores, clamped to the configured range.
    pub composite: f64,
    /// Contributed weight over total configured weight, in [0, 1].
    pub confidence: f64,
}

/// Aggregation failure.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("no usable model scores")]
    NoScores,
}

/// Reduce per-model scores to a composite.
///
/// Scores from models outside the configured set are ignored. For each
/// configured model the most recent score contributes with the model's
/// weight; models without a score contribute nothing to composite or
/// confidence. When nothing contributed, `default_missing` is used with
/// zero confidence, or `NoScores` is returned when the fallback is
/// forbidden.
pub fn weighted_composite(
    scores: &[ModelScore],
    config: &CompositeScoreConfig,
) -> Result<Aggregate, AggregateError> {
    let total_weight: f64 = config.models.iter().map(|m| m.weight).sum();

    let mut weighted_sum = 0.0;
    let mut contributed_weight = 0.0;

    for model in &config.models {
        let latest = scores
            .iter()
            .filter(|s| s.model == model.model_name)
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            });

        if let Some(score) = latest {
            weighted_sum += score.score * model.weight;
            contributed_weight += model.weight;
        }
    }

    if contributed_weight <= 0.0 {
        let Some(default) = config.default_missing else {
            return Err(AggregateError::NoScores);
        };
        return Ok(Aggregate {
            composite: default.clamp(config.min_score, config.max_score),
            confidence: 0.0,
        });
    }

    let composite = (weighted_sum / contributed_weight).clamp(config.min_score, config.max_score);
    let confidence = if total_weight > 0.0 {
        (contributed_weight / total_weight).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(Aggregate {
        composite,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn config(models: &[(&str, f64)]) -> CompositeScoreConfig {
        CompositeScoreConfig {
            min_score: -1.0,
            max_score: 1.0,
            default_missing: None,
            models: models
                .iter()
                .map(|(name, weight)| ModelWeight {
                    model_name: (*name).to_string(),
                    weight: *weight,
                })
                .collect(),
        }
    }

    fn score(id: i64, model: &str, value: f64, age_secs: i64) -> ModelScore {
        ModelScore {
            id,
            article_id: 1,
            model: model.to_string(),
            score: value,
            metadata: "{}".to_string(),
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_equal_weights_take_plain_mean() {
        let cfg = config(&[("a", 1.0), ("b", 1.0)]);
        let scores = vec![score(1, "a", -0.5, 0), score(2, "b", 0.5, 0)];

        let agg = weighted_composite(&scores, &cfg).unwrap();
        assert!((agg.composite - 0.0).abs() < 1e-12);
        assert!((agg.confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights_shift_the_mean() {
        let cfg = config(&[("a", 3.0), ("b", 1.0)]);
        let scores = vec![score(1, "a", 1.0, 0), score(2, "b", -1.0, 0)];

        let agg = weighted_composite(&scores, &cfg).unwrap();
        assert!((agg.composite - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_models_are_ignored() {
        let cfg = config(&[("a", 1.0)]);
        let scores = vec![score(1, "a", 0.2, 0), score(2, "intruder", -1.0, 0)];

        let agg = weighted_composite(&scores, &cfg).unwrap();
        assert!((agg.composite - 0.2).abs() < 1e-12);
        assert!((agg.confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_model_lowers_confidence() {
        let cfg = config(&[("a", 1.0), ("b", 1.0), ("c", 2.0)]);
        let scores = vec![score(1, "a", 0.4, 0), score(2, "b", 0.0, 0)];

        let agg = weighted_composite(&scores, &cfg).unwrap();
        // c (weight 2 of 4 total) is absent
        assert!((agg.confidence - 0.5).abs() < 1e-12);
        assert!((agg.composite - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_most_recent_score_wins() {
        let cfg = config(&[("a", 1.0)]);
        let scores = vec![score(1, "a", -0.9, 3600), score(2, "a", 0.3, 0)];

        let agg = weighted_composite(&scores, &cfg).unwrap();
        assert!((agg.composite - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_composite_is_clamped() {
        let mut cfg = config(&[("a", 1.0)]);
        cfg.min_score = -0.5;
        cfg.max_score = 0.5;
        let scores = vec![score(1, "a", 0.9, 0)];

        let agg = weighted_composite(&scores, &cfg).unwrap();
        assert!((agg.composite - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_no_scores_without_default_fails() {
        let cfg = config(&[("a", 1.0)]);
        assert_eq!(
            weighted_composite(&[], &cfg).unwrap_err(),
            AggregateError::NoScores
        );
    }

    #[test]
    fn test_no_scores_with_default_yields_zero_confidence() {
        let mut cfg = config(&[("a", 1.0)]);
        cfg.default_missing = Some(0.1);

        let agg = weighted_composite(&[], &cfg).unwrap();
        assert!((agg.composite - 0.1).abs() < 1e-12);
        assert!((agg.confidence - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let cfg = config(&[("a", 1.3), ("b", 0.7), ("c", 2.1)]);
        let scores = vec![
            score(1, "a", 0.11, 10),
            score(2, "b", -0.42, 5),
            score(3, "c", 0.87, 1),
        ];

        let first = weighted_composite(&scores, &cfg).unwrap();
        let second = weighted_composite(&scores, &cfg).unwrap();
        assert_eq!(first.composite.to_bits(), second.composite.to_bits());
        assert_eq!(first.confidence.to_bits(), second.confidence.to_bits());
    }

    #[test]
    fn test_default_config_validates() {
        CompositeScoreConfig::default().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_models() {
        let cfg = config(&[]);
        assert!(matches!(
            cfg.validate(),
            Err(ScoreConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let cfg = config(&[("a", -1.0)]);
        assert!(matches!(
            cfg.validate(),
            Err(ScoreConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_validate_rejects_default_outside_range() {
        let mut cfg = config(&[("a", 1.0)]);
        cfg.default_missing = Some(2.0);
        assert!(matches!(
            cfg.validate(),
            Err(ScoreConfigError::Invalid(_))
        ));
    }
}
