//! Per-user metric functions
//!
//! Pure functions over id lists and rating pairs; aggregation across users
//! happens in the evaluator.

use cinerec_core::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// MAE and RMSE pooled over (predicted, actual) pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub count: usize,
}

impl RatingMetrics {
    /// All-zero metrics with `count = 0` when there are no pairs
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        if pairs.is_empty() {
            return Self::default();
        }
        let n = pairs.len() as f64;
        let abs_sum: f64 = pairs.iter().map(|(p, a)| (p - a).abs()).sum();
        let sq_sum: f64 = pairs.iter().map(|(p, a)| (p - a).powi(2)).sum();
        Self {
            mae: abs_sum / n,
            rmse: (sq_sum / n).sqrt(),
            count: pairs.len(),
        }
    }
}

/// Precision, recall, F1 and NDCG at K for one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub ndcg: f64,
    pub hits: usize,
}

impl RankingMetrics {
    /// `None` when the user has no relevant items; such users are left out
    /// of the averages instead of counting as zero.
    pub fn compute(recommended: &[ItemId], relevant: &HashSet<ItemId>, k: usize) -> Option<Self> {
        if relevant.is_empty() {
            return None;
        }

        let top_k = &recommended[..recommended.len().min(k)];
        let hits = top_k.iter().filter(|item| relevant.contains(*item)).count();

        let precision = if top_k.is_empty() {
            0.0
        } else {
            hits as f64 / top_k.len() as f64
        };
        let recall = hits as f64 / relevant.len() as f64;
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Some(Self {
            precision,
            recall,
            f1,
            ndcg: ndcg_at_k(recommended, relevant, k),
            hits,
        })
    }
}

/// Binary-relevance NDCG@K with a log2(rank + 1) discount
pub fn ndcg_at_k(recommended: &[ItemId], relevant: &HashSet<ItemId>, k: usize) -> f64 {
    if relevant.is_empty() || k == 0 {
        return 0.0;
    }

    let dcg: f64 = recommended
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, item)| relevant.contains(*item))
        .map(|(rank, _)| 1.0 / ((rank + 2) as f64).log2())
        .sum();

    let ideal: f64 = (0..relevant.len().min(k))
        .map(|rank| 1.0 / ((rank + 2) as f64).log2())
        .sum();

    if ideal > 0.0 {
        dcg / ideal
    } else {
        0.0
    }
}

/// 1 − |A ∩ B| / |A ∪ B|; two empty sets are at distance 1
pub fn jaccard_distance(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    1.0 - intersection as f64 / union as f64
}

/// Genre diversity of one recommendation list
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiversityMetrics {
    /// Mean pairwise Jaccard distance, 0 for lists shorter than two
    pub intra_list_diversity: f64,
    /// Unique genres in the list over the size of the genre vocabulary
    pub genre_coverage: f64,
    pub unique_genres: usize,
}

impl DiversityMetrics {
    pub fn compute(genres: &[BTreeSet<String>], vocabulary_size: usize) -> Self {
        let unique: BTreeSet<&String> = genres.iter().flatten().collect();
        let unique_genres = unique.len();
        let genre_coverage = if vocabulary_size == 0 {
            0.0
        } else {
            (unique_genres as f64 / vocabulary_size as f64).min(1.0)
        };

        if genres.len() < 2 {
            return Self {
                intra_list_diversity: 0.0,
                genre_coverage,
                unique_genres,
            };
        }

        let mut total = 0.0;
        let mut pairs = 0usize;
        for (i, a) in genres.iter().enumerate() {
            for b in &genres[i + 1..] {
                total += jaccard_distance(a, b);
                pairs += 1;
            }
        }

        Self {
            intra_list_diversity: total / pairs as f64,
            genre_coverage,
            unique_genres,
        }
    }
}

/// Share of the catalog that appeared in at least one list
pub fn catalog_coverage(recommended: &HashSet<ItemId>, catalog_size: usize) -> f64 {
    if catalog_size == 0 {
        return 0.0;
    }
    (recommended.len() as f64 / catalog_size as f64).min(1.0)
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[ItemId]) -> HashSet<ItemId> {
        items.iter().copied().collect()
    }

    fn genres(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|g| g.to_string()).collect()
    }

    #[test]
    fn test_rating_metrics() {
        let metrics = RatingMetrics::from_pairs(&[(4.0, 5.0), (3.0, 3.0), (2.0, 4.0)]);
        assert!((metrics.mae - 1.0).abs() < 1e-12);
        assert!((metrics.rmse - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(metrics.count, 3);

        assert_eq!(RatingMetrics::from_pairs(&[]), RatingMetrics::default());
    }

    #[test]
    fn test_ranking_metrics() {
        let metrics = RankingMetrics::compute(&[1, 2, 3, 4], &set(&[2, 4, 9]), 4).unwrap();
        assert!((metrics.precision - 0.5).abs() < 1e-12);
        assert!((metrics.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.f1 - 4.0 / 7.0).abs() < 1e-12);
        assert_eq!(metrics.hits, 2);
        assert!(metrics.ndcg > 0.0 && metrics.ndcg < 1.0);

        assert!(RankingMetrics::compute(&[1, 2], &HashSet::new(), 2).is_none());

        let empty = RankingMetrics::compute(&[], &set(&[1]), 5).unwrap();
        assert_eq!(empty.precision, 0.0);
        assert_eq!(empty.f1, 0.0);
    }

    #[test]
    fn test_ndcg_perfect_ranking() {
        assert!((ndcg_at_k(&[1, 2, 3], &set(&[1, 2]), 3) - 1.0).abs() < 1e-12);
        assert_eq!(ndcg_at_k(&[3, 4], &set(&[1]), 2), 0.0);
    }

    #[test]
    fn test_jaccard_distance() {
        let a = genres(&["Action", "Drama"]);
        let b = genres(&["Drama", "Comedy"]);
        assert!((jaccard_distance(&a, &b) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(jaccard_distance(&a, &a), 0.0);
        assert_eq!(jaccard_distance(&BTreeSet::new(), &BTreeSet::new()), 1.0);
    }

    #[test]
    fn test_diversity_metrics() {
        let list = vec![genres(&["Action"]), genres(&["Action"]), genres(&["Comedy"])];
        let metrics = DiversityMetrics::compute(&list, 4);
        assert!((metrics.intra_list_diversity - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.genre_coverage - 0.5).abs() < 1e-12);
        assert_eq!(metrics.unique_genres, 2);

        let single = DiversityMetrics::compute(&[genres(&["Action"])], 4);
        assert_eq!(single.intra_list_diversity, 0.0);
    }

    #[test]
    fn test_catalog_coverage() {
        assert!((catalog_coverage(&set(&[1, 2]), 8) - 0.25).abs() < 1e-12);
        assert_eq!(catalog_coverage(&set(&[1]), 0), 0.0);
    }
}
