//! Candidate universes: which items get scored for a user
//!
//! Prediction and similarity never change between universes; only the set of
//! items put in front of them does.

use crate::matrix::RatingMatrix;
use crate::popularity::PopularityIndex;
use cinerec_core::{ItemId, UserId};
use std::collections::{BTreeSet, HashMap};

pub trait CandidateUniverse: Send + Sync {
    /// Items eligible for `user_id`, ascending, none of them rated by the user
    fn candidates(
        &self,
        user_id: UserId,
        matrix: &RatingMatrix,
        popularity: &PopularityIndex,
    ) -> Vec<ItemId>;

    fn name(&self) -> &'static str;
}

/// Every rated item the user has not rated yet
#[derive(Debug, Clone, Copy, Default)]
pub struct FullUniverse;

impl CandidateUniverse for FullUniverse {
    fn candidates(
        &self,
        user_id: UserId,
        matrix: &RatingMatrix,
        _popularity: &PopularityIndex,
    ) -> Vec<ItemId> {
        matrix
            .items()
            .into_iter()
            .filter(|item| !matrix.has_rated(user_id, *item))
            .collect()
    }

    fn name(&self) -> &'static str {
        "full"
    }
}

/// A user's held-out items plus the most popular items they have not rated
#[derive(Debug, Clone, Default)]
pub struct TestPlusPopular {
    held_out: HashMap<UserId, Vec<ItemId>>,
    supplement: usize,
}

impl TestPlusPopular {
    pub fn new(held_out: HashMap<UserId, Vec<ItemId>>, supplement: usize) -> Self {
        Self {
            held_out,
            supplement,
        }
    }

    pub fn supplement(&self) -> usize {
        self.supplement
    }
}

impl CandidateUniverse for TestPlusPopular {
    fn candidates(
        &self,
        user_id: UserId,
        matrix: &RatingMatrix,
        popularity: &PopularityIndex,
    ) -> Vec<ItemId> {
        let mut items: BTreeSet<ItemId> = self
            .held_out
            .get(&user_id)
            .map(|items| items.iter().copied().collect())
            .unwrap_or_default();

        items.extend(popularity.top_unrated(|item| matrix.has_rated(user_id, item), self.supplement));
        items.retain(|item| !matrix.has_rated(user_id, *item));
        items.into_iter().collect()
    }

    fn name(&self) -> &'static str {
        "test_plus_popular"
    }
}
