//! Genre-profile content scoring
//!
//! A user's profile is built from the items they liked; each unrated item is
//! scored by cosine similarity between its one-hot genre vector and that
//! profile, then scaled onto the rating scale so it can be blended with
//! collaborative predictions.

use crate::matrix::RatingMatrix;
use crate::recommendation::ScoredCandidate;
use cinerec_core::{Catalog, ItemId, UserId};
use std::collections::{BTreeMap, BTreeSet};

/// Ratings at or above this count as "liked" when building a profile
pub const DEFAULT_LIKED_THRESHOLD: f64 = 3.5;

/// Multiplier taking a [0, 1] cosine onto the 0-5 rating scale
pub const CONTENT_SCORE_SCALE: f64 = 5.0;

/// Normalised genre preferences; weights sum to 1 when non-empty
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenreProfile {
    weights: BTreeMap<String, f64>,
}

impl GenreProfile {
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weight(&self, genre: &str) -> f64 {
        self.weights.get(genre).copied().unwrap_or(0.0)
    }

    pub fn genres(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.weights.iter()
    }

    /// Cosine similarity in [0, 1] between the profile and an item's genres
    pub fn similarity(&self, genres: &BTreeSet<String>) -> f64 {
        if genres.is_empty() || self.weights.is_empty() {
            return 0.0;
        }

        let dot: f64 = genres.iter().map(|g| self.weight(g)).sum();
        let item_norm = (genres.len() as f64).sqrt();
        let profile_norm = self.weights.values().map(|w| w * w).sum::<f64>().sqrt();

        if profile_norm == 0.0 {
            return 0.0;
        }
        dot / (item_norm * profile_norm)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ContentScorer<'a> {
    matrix: &'a RatingMatrix,
    catalog: &'a Catalog,
    liked_threshold: f64,
}

impl<'a> ContentScorer<'a> {
    pub fn new(matrix: &'a RatingMatrix, catalog: &'a Catalog) -> Self {
        Self {
            matrix,
            catalog,
            liked_threshold: DEFAULT_LIKED_THRESHOLD,
        }
    }

    pub fn with_liked_threshold(mut self, threshold: f64) -> Self {
        self.liked_threshold = threshold;
        self
    }

    /// Genre profile from the user's liked items
    ///
    /// Each liked item adds `rating - threshold + 1` to every one of its
    /// genres, so an item rated exactly at the threshold weighs 1.
    pub fn profile(&self, user_id: UserId) -> GenreProfile {
        let Some(ratings) = self.matrix.user_ratings(user_id) else {
            return GenreProfile::default();
        };

        let mut weights: BTreeMap<String, f64> = BTreeMap::new();
        let mut total = 0.0;
        let mut rated: Vec<(ItemId, f64)> = ratings.iter().map(|(&i, &r)| (i, r)).collect();
        rated.sort_unstable_by_key(|&(item_id, _)| item_id);
        for (item_id, rating) in rated {
            if rating < self.liked_threshold {
                continue;
            }
            let Some(item) = self.catalog.get(item_id) else {
                continue;
            };
            let weight = rating - self.liked_threshold + 1.0;
            for genre in &item.genres {
                *weights.entry(genre.clone()).or_insert(0.0) += weight;
                total += weight;
            }
        }

        if total > 0.0 {
            for value in weights.values_mut() {
                *value /= total;
            }
        } else {
            weights.clear();
        }
        GenreProfile { weights }
    }

    /// Content scores for `candidates`, dropping items with no genre overlap
    pub fn score(&self, user_id: UserId, candidates: &[ItemId]) -> Vec<ScoredCandidate> {
        let profile = self.profile(user_id);
        if profile.is_empty() {
            return Vec::new();
        }

        candidates
            .iter()
            .filter_map(|&item_id| {
                let item = self.catalog.get(item_id)?;
                let similarity = profile.similarity(&item.genres);
                (similarity > 0.0).then(|| ScoredCandidate {
                    item_id,
                    score: similarity * CONTENT_SCORE_SCALE,
                    contributors: Vec::new(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinerec_core::{ItemMetadata, Rating};

    fn fixture() -> (RatingMatrix, Catalog) {
        let matrix = RatingMatrix::from_ratings(&[
            Rating::new(1, 1, 5.0),
            Rating::new(1, 2, 3.5),
            Rating::new(1, 3, 1.0),
            Rating::new(2, 4, 4.0),
            Rating::new(2, 5, 4.0),
        ]);
        let catalog = vec![
            ItemMetadata::from_raw(1, "Alien (1979)", "Horror|Sci-Fi"),
            ItemMetadata::from_raw(2, "Heat (1995)", "Action"),
            ItemMetadata::from_raw(3, "Notting Hill (1999)", "Romance"),
            ItemMetadata::from_raw(4, "Aliens (1986)", "Action|Sci-Fi"),
            ItemMetadata::from_raw(5, "Amelie (2001)", "Romance|Comedy"),
        ]
        .into_iter()
        .collect();
        (matrix, catalog)
    }

    #[test]
    fn test_profile_weights_liked_items() {
        let (matrix, catalog) = fixture();
        let profile = ContentScorer::new(&matrix, &catalog).profile(1);

        // Alien weighs 2.5 on two genres, Heat weighs 1.0 on one
        let total = 2.5 * 2.0 + 1.0;
        assert!((profile.weight("Horror") - 2.5 / total).abs() < 1e-12);
        assert!((profile.weight("Action") - 1.0 / total).abs() < 1e-12);
        assert_eq!(profile.weight("Romance"), 0.0);

        let sum: f64 = profile.genres().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_score_ranks_overlapping_genres() {
        let (matrix, catalog) = fixture();
        let scored = ContentScorer::new(&matrix, &catalog).score(1, &[4, 5]);

        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].item_id, 4);
        assert!(scored[0].score > 0.0 && scored[0].score <= CONTENT_SCORE_SCALE);
    }

    #[test]
    fn test_no_liked_items_means_no_scores() {
        let (matrix, catalog) = fixture();
        let scorer = ContentScorer::new(&matrix, &catalog).with_liked_threshold(5.5);
        assert!(scorer.profile(1).is_empty());
        assert!(scorer.score(1, &[4, 5]).is_empty());
        assert!(scorer.score(99, &[4]).is_empty());
    }

    #[test]
    fn test_similarity_bounds() {
        let (matrix, catalog) = fixture();
        let profile = ContentScorer::new(&matrix, &catalog).profile(2);
        let genres: BTreeSet<String> = ["Action", "Sci-Fi", "Romance", "Comedy"]
            .iter()
            .map(|g| g.to_string())
            .collect();
        let s = profile.similarity(&genres);
        assert!((s - 1.0).abs() < 1e-12);
    }
}
