//! Seeded per-user train/test split

use cinerec_core::{ItemId, Rating, RecommenderError, Result, UserId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Train and test partitions of the ratings of qualifying users
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationSplit {
    pub train: Vec<Rating>,
    pub test: Vec<Rating>,
    /// Users that met the minimum-ratings threshold, ascending
    pub users: Vec<UserId>,
    /// Users dropped for having too few ratings
    pub excluded_users: usize,
}

impl EvaluationSplit {
    /// Partition every user's ratings independently
    ///
    /// Each user's ratings are put in item order, shuffled with an RNG seeded
    /// from `seed + user_id`, and the first `max(1, floor(n · test_ratio))`
    /// go to test, capped so at least one rating stays in train. The outcome
    /// for a user does not depend on any other user in the input.
    pub fn new(
        ratings: &[Rating],
        test_ratio: f64,
        min_ratings_per_user: usize,
        seed: u64,
    ) -> Result<Self> {
        if !(test_ratio > 0.0 && test_ratio < 1.0) {
            return Err(RecommenderError::invalid_config(
                format!("test_ratio must be between 0 and 1 (exclusive), got {}", test_ratio),
                "CINEREC_TEST_RATIO",
            ));
        }

        let mut by_user: BTreeMap<UserId, Vec<Rating>> = BTreeMap::new();
        for rating in ratings {
            by_user.entry(rating.user_id).or_default().push(*rating);
        }

        let mut split = EvaluationSplit::default();
        for (user_id, mut user_ratings) in by_user {
            if user_ratings.len() < min_ratings_per_user.max(2) {
                split.excluded_users += 1;
                continue;
            }

            user_ratings.sort_by_key(|r| r.item_id);
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(u64::from(user_id)));
            user_ratings.shuffle(&mut rng);

            let n = user_ratings.len();
            let n_test = ((n as f64 * test_ratio).floor() as usize).clamp(1, n - 1);

            let train_part = user_ratings.split_off(n_test);
            split.test.extend(user_ratings);
            split.train.extend(train_part);
            split.users.push(user_id);
        }

        info!(
            users = split.users.len(),
            excluded = split.excluded_users,
            train = split.train.len(),
            test = split.test.len(),
            "Split ratings into train/test"
        );
        Ok(split)
    }

    /// Held-out items per user, in split order
    pub fn test_items(&self) -> HashMap<UserId, Vec<ItemId>> {
        let mut items: HashMap<UserId, Vec<ItemId>> = HashMap::new();
        for rating in &self.test {
            items.entry(rating.user_id).or_default().push(rating.item_id);
        }
        items
    }

    /// Held-out ratings per user
    pub fn test_by_user(&self) -> HashMap<UserId, Vec<Rating>> {
        let mut by_user: HashMap<UserId, Vec<Rating>> = HashMap::new();
        for rating in &self.test {
            by_user.entry(rating.user_id).or_default().push(*rating);
        }
        by_user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ratings() -> Vec<Rating> {
        let mut ratings = Vec::new();
        for user in 1..=4u32 {
            for item in 1..=(user * 3) {
                ratings.push(Rating::new(user, item, f64::from((item % 5) + 1)));
            }
        }
        ratings
    }

    #[test]
    fn test_split_is_disjoint_and_complete() {
        let input = ratings();
        let split = EvaluationSplit::new(&input, 0.2, 5, 42).unwrap();

        // User 1 has only 3 ratings
        assert_eq!(split.users, vec![2, 3, 4]);
        assert_eq!(split.excluded_users, 1);

        for &user in &split.users {
            let train: HashSet<ItemId> = split
                .train
                .iter()
                .filter(|r| r.user_id == user)
                .map(|r| r.item_id)
                .collect();
            let test: HashSet<ItemId> = split
                .test
                .iter()
                .filter(|r| r.user_id == user)
                .map(|r| r.item_id)
                .collect();
            let all: HashSet<ItemId> = input
                .iter()
                .filter(|r| r.user_id == user)
                .map(|r| r.item_id)
                .collect();

            assert!(train.is_disjoint(&test));
            assert!(!test.is_empty());
            assert!(!train.is_empty());
            assert_eq!(&train | &test, all);
        }
    }

    #[test]
    fn test_split_sizes() {
        let split = EvaluationSplit::new(&ratings(), 0.2, 5, 42).unwrap();
        let test_items = split.test_items();
        // 6 ratings -> 1, 9 -> 1, 12 -> 2
        assert_eq!(test_items[&2].len(), 1);
        assert_eq!(test_items[&3].len(), 1);
        assert_eq!(test_items[&4].len(), 2);
    }

    #[test]
    fn test_split_is_deterministic_per_user() {
        let full = EvaluationSplit::new(&ratings(), 0.3, 5, 7).unwrap();
        let only_four: Vec<Rating> = ratings().into_iter().filter(|r| r.user_id == 4).collect();
        let alone = EvaluationSplit::new(&only_four, 0.3, 5, 7).unwrap();

        assert_eq!(full.test_items()[&4], alone.test_items()[&4]);
        assert_eq!(full, EvaluationSplit::new(&ratings(), 0.3, 5, 7).unwrap());
    }

    #[test]
    fn test_invalid_ratio() {
        assert!(EvaluationSplit::new(&ratings(), 1.0, 5, 42)
            .unwrap_err()
            .is_invalid_configuration());
    }
}
