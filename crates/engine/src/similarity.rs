//! User-user similarity (Pearson correlation) with a per-run memo cache
//!
//! A pair's correlation is computed over the items both users rated. Pairs
//! with fewer than `min_common_items` co-rated items, or with zero variance
//! on either side, have no similarity at all; that is different from a
//! measured correlation of zero and is modelled as `None`.

use crate::matrix::RatingMatrix;
use cinerec_core::{ItemId, UserId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Order-independent key for a pair of users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserPair {
    low: UserId,
    high: UserId,
}

impl UserPair {
    pub fn new(a: UserId, b: UserId) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn low(&self) -> UserId {
        self.low
    }

    pub fn high(&self) -> UserId {
        self.high
    }
}

/// Raw outcome of correlating two users, independent of any threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairStatistics {
    /// Number of items rated by both users
    pub common_items: usize,
    /// `None` when fewer than two co-rated items or zero variance
    pub correlation: Option<f64>,
}

impl PairStatistics {
    /// Correlation if the pair clears the co-rated item threshold
    pub fn correlation_at(&self, min_common_items: usize) -> Option<f64> {
        if self.common_items < min_common_items {
            return None;
        }
        self.correlation
    }
}

/// A defined similarity between two users
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub user_a: UserId,
    pub user_b: UserId,
    pub correlation: f64,
    pub common_items: usize,
}

/// Pearson correlation over the co-rated items of two rating vectors
///
/// r = Σ(x−x̄)(y−ȳ) / √(Σ(x−x̄)² · Σ(y−ȳ)²), means taken over the intersection.
pub fn pearson(a: &HashMap<ItemId, f64>, b: &HashMap<ItemId, f64>) -> PairStatistics {
    let (small, large, swapped) = if a.len() <= b.len() {
        (a, b, false)
    } else {
        (b, a, true)
    };

    // Item order keeps the sums reproducible across runs
    let mut co_rated: Vec<(ItemId, f64, f64)> = small
        .iter()
        .filter_map(|(&item, &x)| {
            large
                .get(&item)
                .map(|&y| if swapped { (item, y, x) } else { (item, x, y) })
        })
        .collect();
    co_rated.sort_unstable_by_key(|&(item, _, _)| item);
    let pairs: Vec<(f64, f64)> = co_rated.into_iter().map(|(_, x, y)| (x, y)).collect();

    let common_items = pairs.len();
    if common_items < 2 {
        return PairStatistics {
            common_items,
            correlation: None,
        };
    }

    let n = common_items as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        numerator += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let correlation = if var_x == 0.0 || var_y == 0.0 {
        None
    } else {
        let r = numerator / (var_x * var_y).sqrt();
        // Rounding can push |r| a hair past 1
        r.is_finite().then(|| r.clamp(-1.0, 1.0))
    };

    PairStatistics {
        common_items,
        correlation,
    }
}

/// Append-only memo of pair statistics for the lifetime of one run
///
/// Each entry is computed at most once; concurrent requests for the same
/// pair wait on the shard lock and then read the stored value.
#[derive(Debug, Default)]
pub struct SimilarityCache {
    entries: DashMap<UserPair, PairStatistics>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SimilarityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pair: UserPair) -> Option<PairStatistics> {
        self.entries.get(&pair).map(|entry| *entry)
    }

    /// Return the cached statistics for `pair`, computing them on first use
    pub fn get_or_compute(
        &self,
        pair: UserPair,
        compute: impl FnOnce() -> PairStatistics,
    ) -> PairStatistics {
        if let Some(found) = self.get(pair) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return found;
        }

        let mut computed = false;
        let stats = *self.entries.entry(pair).or_insert_with(|| {
            computed = true;
            compute()
        });

        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// On-demand similarity over a rating matrix, memoized in a shared cache
#[derive(Debug, Clone, Copy)]
pub struct SimilarityEngine<'a> {
    matrix: &'a RatingMatrix,
    cache: &'a SimilarityCache,
}

impl<'a> SimilarityEngine<'a> {
    pub fn new(matrix: &'a RatingMatrix, cache: &'a SimilarityCache) -> Self {
        Self { matrix, cache }
    }

    pub fn matrix(&self) -> &'a RatingMatrix {
        self.matrix
    }

    /// Threshold-free statistics for a pair, `None` for self-pairs or unknown users
    pub fn statistics(&self, a: UserId, b: UserId) -> Option<PairStatistics> {
        if a == b {
            return None;
        }
        let ratings_a = self.matrix.user_ratings(a)?;
        let ratings_b = self.matrix.user_ratings(b)?;

        Some(
            self.cache
                .get_or_compute(UserPair::new(a, b), || pearson(ratings_a, ratings_b)),
        )
    }

    /// Pearson correlation in [-1, 1], or `None` when undefined for this pair
    pub fn similarity(&self, a: UserId, b: UserId, min_common_items: usize) -> Option<f64> {
        self.statistics(a, b)?.correlation_at(min_common_items)
    }

    pub fn score(&self, a: UserId, b: UserId, min_common_items: usize) -> Option<SimilarityScore> {
        let stats = self.statistics(a, b)?;
        let correlation = stats.correlation_at(min_common_items)?;
        Some(SimilarityScore {
            user_a: a,
            user_b: b,
            correlation,
            common_items: stats.common_items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinerec_core::Rating;

    fn ratings(values: &[(ItemId, f64)]) -> HashMap<ItemId, f64> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_user_pair_is_order_independent() {
        assert_eq!(UserPair::new(7, 3), UserPair::new(3, 7));
        assert_eq!(UserPair::new(7, 3).low(), 3);
        assert_eq!(UserPair::new(7, 3).high(), 7);
    }

    #[test]
    fn test_pearson_perfect_positive() {
        let a = ratings(&[(1, 5.0), (2, 4.0), (3, 3.0)]);
        let b = ratings(&[(1, 4.0), (2, 3.0), (3, 2.0)]);
        let stats = pearson(&a, &b);
        assert_eq!(stats.common_items, 3);
        assert!((stats.correlation.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_negative() {
        let a = ratings(&[(1, 5.0), (2, 4.0), (3, 3.0)]);
        let b = ratings(&[(1, 1.0), (2, 2.0), (3, 3.0)]);
        let r = pearson(&a, &b).correlation.unwrap();
        assert!(r < 0.0 && r >= -1.0);
        assert!((r + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_cancelling_deviations_is_zero() {
        let a = ratings(&[(1, 5.0), (2, 4.0), (3, 3.0)]);
        let b = ratings(&[(1, 1.0), (2, 5.0), (3, 1.0)]);
        let r = pearson(&a, &b).correlation.unwrap();
        assert!(r.abs() < 1e-12);
    }

    #[test]
    fn test_pearson_zero_variance_is_undefined() {
        let a = ratings(&[(1, 3.0), (2, 3.0), (3, 3.0)]);
        let b = ratings(&[(1, 1.0), (2, 4.0), (3, 5.0)]);
        let stats = pearson(&a, &b);
        assert_eq!(stats.common_items, 3);
        assert!(stats.correlation.is_none());
    }

    #[test]
    fn test_pearson_ignores_non_shared_items() {
        let a = ratings(&[(1, 5.0), (2, 1.0), (9, 2.0)]);
        let b = ratings(&[(1, 4.0), (2, 2.0), (8, 5.0)]);
        let stats = pearson(&a, &b);
        assert_eq!(stats.common_items, 2);
        assert!((stats.correlation.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_applied_at_lookup() {
        let stats = PairStatistics {
            common_items: 3,
            correlation: Some(0.5),
        };
        assert_eq!(stats.correlation_at(3), Some(0.5));
        assert_eq!(stats.correlation_at(4), None);
    }

    #[test]
    fn test_engine_caches_symmetric_pairs() {
        let matrix = RatingMatrix::from_ratings(&[
            Rating::new(1, 1, 5.0),
            Rating::new(1, 2, 3.0),
            Rating::new(1, 3, 1.0),
            Rating::new(2, 1, 4.0),
            Rating::new(2, 2, 3.0),
            Rating::new(2, 3, 2.0),
        ]);
        let cache = SimilarityCache::new();
        let engine = SimilarityEngine::new(&matrix, &cache);

        let forward = engine.similarity(1, 2, 3);
        let backward = engine.similarity(2, 1, 3);
        assert_eq!(forward, backward);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);

        assert!(engine.similarity(1, 1, 1).is_none());
        assert!(engine.similarity(1, 99, 1).is_none());
        assert!(engine.similarity(1, 2, 4).is_none());
    }
}
