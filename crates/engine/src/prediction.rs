//! Similarity-weighted rating prediction

use crate::matrix::RatingMatrix;
use crate::neighborhood::NeighborSet;
use cinerec_core::{ItemId, UserId};
use serde::{Deserialize, Serialize};

/// A predicted rating and the neighbours it was built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Raw weighted average, not clamped to the rating scale
    pub rating: f64,
    /// Contributing neighbours by descending similarity, truncated for display
    pub contributors: Vec<UserId>,
    /// Number of neighbours whose rating went into `rating`
    pub support: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RatingPredictor<'a> {
    matrix: &'a RatingMatrix,
    contributor_limit: usize,
}

impl<'a> RatingPredictor<'a> {
    pub fn new(matrix: &'a RatingMatrix, contributor_limit: usize) -> Self {
        Self {
            matrix,
            contributor_limit,
        }
    }

    /// Predict a rating for `item_id` from the neighbours that rated it
    ///
    /// predicted = Σ(simᵢ · ratingᵢ) / Σ|simᵢ|
    ///
    /// Returns `None` when no neighbour rated the item.
    pub fn predict(&self, item_id: ItemId, neighbors: &NeighborSet) -> Option<Prediction> {
        let raters = self.matrix.item_raters(item_id)?;

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        let mut contributors = Vec::new();
        let mut support = 0;

        // NeighborSet is already sorted by descending similarity
        for neighbor in neighbors.iter() {
            let Some(&rating) = raters.get(&neighbor.user_id) else {
                continue;
            };
            weighted_sum += neighbor.similarity * rating;
            weight_total += neighbor.similarity.abs();
            support += 1;
            if contributors.len() < self.contributor_limit {
                contributors.push(neighbor.user_id);
            }
        }

        if support == 0 || weight_total == 0.0 {
            return None;
        }

        let rating = weighted_sum / weight_total;
        rating.is_finite().then_some(Prediction {
            rating,
            contributors,
            support,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighborhood::Neighbor;
    use cinerec_core::Rating;

    fn matrix() -> RatingMatrix {
        RatingMatrix::from_ratings(&[
            Rating::new(2, 10, 4.0),
            Rating::new(3, 10, 2.0),
            Rating::new(4, 10, 5.0),
            Rating::new(2, 20, 3.0),
        ])
    }

    fn neighbors() -> NeighborSet {
        NeighborSet::from_candidates(
            vec![
                Neighbor { user_id: 2, similarity: 0.75 },
                Neighbor { user_id: 3, similarity: 0.25 },
            ],
            10,
        )
    }

    #[test]
    fn test_weighted_average() {
        let matrix = matrix();
        let predictor = RatingPredictor::new(&matrix, 10);

        let prediction = predictor.predict(10, &neighbors()).unwrap();
        let expected = (0.75 * 4.0 + 0.25 * 2.0) / (0.75 + 0.25);
        assert!((prediction.rating - expected).abs() < 1e-12);
        assert_eq!(prediction.contributors, vec![2, 3]);
        assert_eq!(prediction.support, 2);
    }

    #[test]
    fn test_only_raters_contribute() {
        let matrix = matrix();
        let predictor = RatingPredictor::new(&matrix, 10);

        let prediction = predictor.predict(20, &neighbors()).unwrap();
        assert!((prediction.rating - 3.0).abs() < 1e-12);
        assert_eq!(prediction.contributors, vec![2]);
    }

    #[test]
    fn test_undefined_without_raters() {
        let matrix = matrix();
        let predictor = RatingPredictor::new(&matrix, 10);
        assert!(predictor.predict(99, &neighbors()).is_none());
        assert!(predictor.predict(10, &NeighborSet::empty()).is_none());
    }

    #[test]
    fn test_contributor_limit_is_display_only() {
        let matrix = matrix();
        let predictor = RatingPredictor::new(&matrix, 1);

        let prediction = predictor.predict(10, &neighbors()).unwrap();
        assert_eq!(prediction.contributors, vec![2]);
        assert_eq!(prediction.support, 2);
        assert!((prediction.rating - 3.5).abs() < 1e-12);
    }
}
