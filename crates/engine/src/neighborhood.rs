//! Neighbour selection for a target user

use crate::similarity::SimilarityEngine;
use cinerec_core::{RecommenderError, Result, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// A positively correlated user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub user_id: UserId,
    pub similarity: f64,
}

/// Neighbours sorted by similarity descending, ties by ascending user id
///
/// Every similarity is strictly positive and the set never exceeds K.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborSet {
    neighbors: Vec<Neighbor>,
}

impl NeighborSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Filter, sort and truncate raw candidates into a valid neighbour set
    pub fn from_candidates(candidates: impl IntoIterator<Item = Neighbor>, k: usize) -> Self {
        let mut neighbors: Vec<Neighbor> = candidates
            .into_iter()
            .filter(|n| n.similarity.is_finite() && n.similarity > 0.0)
            .collect();
        neighbors.sort_by(compare_neighbors);
        neighbors.truncate(k);
        Self { neighbors }
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.iter()
    }

    pub fn as_slice(&self) -> &[Neighbor] {
        &self.neighbors
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        self.neighbors.iter().map(|n| n.user_id).collect()
    }
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then(a.user_id.cmp(&b.user_id))
}

/// Ranks other users by similarity and keeps the top K positive ones
#[derive(Debug, Clone, Copy)]
pub struct NeighborhoodSelector<'a> {
    similarity: SimilarityEngine<'a>,
}

impl<'a> NeighborhoodSelector<'a> {
    pub fn new(similarity: SimilarityEngine<'a>) -> Self {
        Self { similarity }
    }

    /// Top-`k` positively correlated neighbours of `target`
    ///
    /// Only users sharing at least one rated item are examined; every other
    /// user's similarity is undefined. An empty result is the cold-start
    /// signal, not an error.
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when `k == 0`.
    pub fn neighbors(&self, target: UserId, k: usize, min_common_items: usize) -> Result<NeighborSet> {
        if k == 0 {
            return Err(RecommenderError::invalid_config(
                "top_k_neighbors must be greater than 0",
                "CINEREC_TOP_K_NEIGHBORS",
            ));
        }

        let matrix = self.similarity.matrix();
        let co_raters = matrix.co_raters(target);
        let candidates = co_raters.iter().filter_map(|&other| {
            self.similarity
                .similarity(target, other, min_common_items)
                .map(|similarity| Neighbor {
                    user_id: other,
                    similarity,
                })
        });

        let set = NeighborSet::from_candidates(candidates, k);
        debug!(
            user_id = target,
            examined = co_raters.len(),
            neighbors = set.len(),
            "Selected neighbours"
        );
        Ok(set)
    }
}
