use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Relative weights of the score components. They need not sum to 1; the
/// combined score is capped at 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub spike_weight: f64,
    pub keyword_weight: f64,
    pub uniqueness_weight: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            spike_weight: 0.4,
            keyword_weight: 0.5,
            uniqueness_weight: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
    pub min_clip_score: f64,
    /// Reserved: minimum keyword density for a category. Not consulted by
    /// the pipeline yet.
    pub keyword_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            min_clip_score: 0.7,
            keyword_threshold: 0.3,
        }
    }
}

/// Combines spike intensity, keyword similarity, and uniqueness into one
/// clip score and gates emission on it.
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Weighted combination in [0, 1]. Only the strongest category
    /// contributes the keyword component; an empty map contributes 0.
    pub fn calculate_score(
        &self,
        spike_score: f64,
        keyword_scores: &HashMap<String, f64>,
        uniqueness_score: f64,
    ) -> f64 {
        let keyword_score = keyword_scores.values().copied().fold(0.0, f64::max);

        let total = self.config.weights.spike_weight * spike_score
            + self.config.weights.keyword_weight * keyword_score
            + self.config.weights.uniqueness_weight * uniqueness_score;

        total.min(1.0)
    }

    pub fn should_trigger_clip(&self, score: f64) -> bool {
        score >= self.config.min_clip_score
    }

    pub fn set_config(&mut self, config: ScoringConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
