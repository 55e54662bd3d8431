//! Blending collaborative and content-based candidate lists

use crate::recommendation::ScoredCandidate;
use cinerec_core::{ItemId, RecommenderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How collaborative and content scores are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HybridStrategy {
    /// Weighted sum over the union of both sides, each side scored for 2·N
    #[default]
    Weighted,
    /// Weighted sum over the union of each side's top N
    Mixed,
    /// Collaborative unless it fell back to cold start, then content
    Switching,
}

impl fmt::Display for HybridStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HybridStrategy::Weighted => write!(f, "weighted"),
            HybridStrategy::Mixed => write!(f, "mixed"),
            HybridStrategy::Switching => write!(f, "switching"),
        }
    }
}

impl FromStr for HybridStrategy {
    type Err = RecommenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weighted" => Ok(HybridStrategy::Weighted),
            "mixed" => Ok(HybridStrategy::Mixed),
            "switching" => Ok(HybridStrategy::Switching),
            other => Err(RecommenderError::invalid_config(
                format!(
                    "Unknown hybrid strategy '{}'. Must be one of: weighted, mixed, switching",
                    other
                ),
                "hybrid_method",
            )),
        }
    }
}

/// Relative weight of each side; normalised before use
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub collaborative: f64,
    pub content: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            collaborative: 0.7,
            content: 0.3,
        }
    }
}

impl HybridWeights {
    pub fn new(collaborative: f64, content: f64) -> Result<Self> {
        let weights = Self {
            collaborative,
            content,
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<()> {
        for (value, key) in [(self.collaborative, "cf_weight"), (self.content, "cb_weight")] {
            if !value.is_finite() || value < 0.0 {
                return Err(RecommenderError::invalid_config(
                    format!("{} must be a non-negative number, got {}", key, value),
                    key,
                ));
            }
        }
        if self.collaborative + self.content <= 0.0 {
            return Err(RecommenderError::invalid_config(
                "cf_weight and cb_weight must not both be zero",
                "cf_weight",
            ));
        }
        Ok(())
    }

    /// Weights rescaled to sum to 1
    pub fn normalized(&self) -> (f64, f64) {
        let total = self.collaborative + self.content;
        (self.collaborative / total, self.content / total)
    }
}

/// Scoring mode of a recommendation request
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ScoringMode {
    #[default]
    Collaborative,
    Hybrid {
        strategy: HybridStrategy,
        weights: HybridWeights,
    },
}

impl ScoringMode {
    pub fn validate(&self) -> Result<()> {
        match self {
            ScoringMode::Collaborative => Ok(()),
            ScoringMode::Hybrid { weights, .. } => weights.validate(),
        }
    }
}

/// Blended candidates plus the cold-start outcome of the blend
#[derive(Debug, Clone, Default)]
pub struct Blend {
    pub candidates: Vec<ScoredCandidate>,
    pub is_cold_start: bool,
}

/// Combine two ranked candidate lists according to `strategy`
///
/// Both inputs must already be sorted best first; `top_n` controls how much
/// of each side the strategy looks at. `collaborative_cold` reports whether
/// the collaborative side is itself a popularity fallback.
pub fn blend(
    strategy: HybridStrategy,
    weights: HybridWeights,
    collaborative: Vec<ScoredCandidate>,
    collaborative_cold: bool,
    content: Vec<ScoredCandidate>,
    top_n: usize,
) -> Blend {
    match strategy {
        HybridStrategy::Switching => {
            if !collaborative_cold && !collaborative.is_empty() {
                Blend {
                    candidates: collaborative,
                    is_cold_start: false,
                }
            } else if !content.is_empty() {
                Blend {
                    candidates: content,
                    is_cold_start: true,
                }
            } else {
                Blend {
                    candidates: collaborative,
                    is_cold_start: true,
                }
            }
        }
        HybridStrategy::Weighted | HybridStrategy::Mixed => {
            let depth = if strategy == HybridStrategy::Weighted {
                top_n.saturating_mul(2)
            } else {
                top_n
            };
            let content_empty = content.is_empty();
            let candidates = weighted_union(
                weights,
                collaborative.into_iter().take(depth),
                content.into_iter().take(depth),
            );
            let is_cold_start = (collaborative_cold && content_empty) || candidates.is_empty();
            Blend {
                candidates,
                is_cold_start,
            }
        }
    }
}

fn weighted_union(
    weights: HybridWeights,
    collaborative: impl Iterator<Item = ScoredCandidate>,
    content: impl Iterator<Item = ScoredCandidate>,
) -> Vec<ScoredCandidate> {
    let (w_cf, w_cb) = weights.normalized();

    // item -> (cf score, cb score, contributors)
    let mut merged: BTreeMap<ItemId, (f64, f64, Vec<_>)> = BTreeMap::new();
    for candidate in collaborative {
        let entry = merged.entry(candidate.item_id).or_default();
        entry.0 = candidate.score;
        entry.2 = candidate.contributors;
    }
    for candidate in content {
        let entry = merged.entry(candidate.item_id).or_default();
        entry.1 = entry.1.max(candidate.score);
    }

    merged
        .into_iter()
        .filter_map(|(item_id, (cf, cb, contributors))| {
            let score = cf * w_cf + cb * w_cb;
            (score > 0.0).then_some(ScoredCandidate {
                item_id,
                score,
                contributors,
            })
        })
        .collect()
}
