//! Sparse user-item rating matrix
//!
//! Stored as two mappings-of-mappings so both "what did this user rate" and
//! "who rated this item" are direct lookups. Unrated pairs have no entry.

use cinerec_core::{ItemId, Rating, UserId};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct RatingMatrix {
    by_user: HashMap<UserId, HashMap<ItemId, f64>>,
    by_item: HashMap<ItemId, HashMap<UserId, f64>>,
    num_ratings: usize,
}

impl RatingMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pivot a rating list into the matrix; a repeated pair keeps the last value
    pub fn from_ratings(ratings: &[Rating]) -> Self {
        let mut matrix = Self::new();
        for rating in ratings {
            matrix.insert(rating.user_id, rating.item_id, rating.value);
        }
        matrix
    }

    pub fn insert(&mut self, user_id: UserId, item_id: ItemId, value: f64) {
        let previous = self
            .by_user
            .entry(user_id)
            .or_default()
            .insert(item_id, value);
        self.by_item
            .entry(item_id)
            .or_default()
            .insert(user_id, value);

        if previous.is_none() {
            self.num_ratings += 1;
        }
    }

    /// Make a user known without any ratings; such a user is always cold start
    pub fn register_user(&mut self, user_id: UserId) {
        self.by_user.entry(user_id).or_default();
    }

    pub fn rating(&self, user_id: UserId, item_id: ItemId) -> Option<f64> {
        self.by_user.get(&user_id)?.get(&item_id).copied()
    }

    pub fn user_ratings(&self, user_id: UserId) -> Option<&HashMap<ItemId, f64>> {
        self.by_user.get(&user_id)
    }

    pub fn item_raters(&self, item_id: ItemId) -> Option<&HashMap<UserId, f64>> {
        self.by_item.get(&item_id)
    }

    pub fn contains_user(&self, user_id: UserId) -> bool {
        self.by_user.contains_key(&user_id)
    }

    pub fn contains_item(&self, item_id: ItemId) -> bool {
        self.by_item.contains_key(&item_id)
    }

    pub fn has_rated(&self, user_id: UserId, item_id: ItemId) -> bool {
        self.rating(user_id, item_id).is_some()
    }

    /// All known users, ascending
    pub fn users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.by_user.keys().copied().collect();
        users.sort_unstable();
        users
    }

    /// All items with at least one rating, ascending
    pub fn items(&self) -> Vec<ItemId> {
        let mut items: Vec<ItemId> = self.by_item.keys().copied().collect();
        items.sort_unstable();
        items
    }

    pub fn num_users(&self) -> usize {
        self.by_user.len()
    }

    pub fn num_items(&self) -> usize {
        self.by_item.len()
    }

    pub fn num_ratings(&self) -> usize {
        self.num_ratings
    }

    pub fn is_empty(&self) -> bool {
        self.num_ratings == 0
    }

    /// Mean over every stored rating, `None` for an empty matrix
    pub fn global_mean(&self) -> Option<f64> {
        if self.num_ratings == 0 {
            return None;
        }
        let total: f64 = self
            .users()
            .into_iter()
            .filter_map(|user_id| self.by_user.get(&user_id))
            .map(ordered_sum)
            .sum();
        Some(total / self.num_ratings as f64)
    }

    /// Users who rated at least one item in common with `user_id`, ascending
    pub fn co_raters(&self, user_id: UserId) -> Vec<UserId> {
        let Some(ratings) = self.by_user.get(&user_id) else {
            return Vec::new();
        };

        let mut others: Vec<UserId> = ratings
            .keys()
            .filter_map(|item| self.by_item.get(item))
            .flat_map(|raters| raters.keys().copied())
            .filter(|other| *other != user_id)
            .collect();
        others.sort_unstable();
        others.dedup();
        others
    }
}

/// Sum of the values in ascending key order, independent of hash iteration order
pub(crate) fn ordered_sum<K: Ord + Copy>(values: &HashMap<K, f64>) -> f64 {
    let mut entries: Vec<(K, f64)> = values.iter().map(|(&k, &v)| (k, v)).collect();
    entries.sort_unstable_by_key(|&(k, _)| k);
    entries.into_iter().map(|(_, v)| v).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RatingMatrix {
        RatingMatrix::from_ratings(&[
            Rating::new(1, 10, 4.0),
            Rating::new(1, 20, 3.0),
            Rating::new(2, 10, 5.0),
            Rating::new(3, 30, 1.0),
        ])
    }

    #[test]
    fn test_lookup_both_directions() {
        let matrix = sample();
        assert_eq!(matrix.rating(1, 10), Some(4.0));
        assert_eq!(matrix.rating(1, 30), None);
        assert_eq!(matrix.item_raters(10).map(|r| r.len()), Some(2));
        assert_eq!(matrix.users(), vec![1, 2, 3]);
        assert_eq!(matrix.items(), vec![10, 20, 30]);
        assert_eq!(matrix.num_ratings(), 4);
    }

    #[test]
    fn test_duplicate_pair_keeps_last_value() {
        let matrix = RatingMatrix::from_ratings(&[Rating::new(1, 10, 2.0), Rating::new(1, 10, 4.5)]);
        assert_eq!(matrix.rating(1, 10), Some(4.5));
        assert_eq!(matrix.num_ratings(), 1);
        assert_eq!(matrix.item_raters(10).unwrap().get(&1), Some(&4.5));
    }

    #[test]
    fn test_co_raters() {
        let matrix = sample();
        assert_eq!(matrix.co_raters(1), vec![2]);
        assert!(matrix.co_raters(3).is_empty());
        assert!(matrix.co_raters(99).is_empty());
    }

    #[test]
    fn test_registered_user_without_ratings() {
        let mut matrix = sample();
        matrix.register_user(4);
        matrix.register_user(1);

        assert!(matrix.contains_user(4));
        assert!(matrix.user_ratings(4).unwrap().is_empty());
        assert!(matrix.co_raters(4).is_empty());
        assert_eq!(matrix.num_ratings(), 4);
        assert_eq!(matrix.rating(1, 10), Some(4.0));
    }

    #[test]
    fn test_global_mean() {
        assert_eq!(sample().global_mean(), Some(13.0 / 4.0));
        assert_eq!(RatingMatrix::new().global_mean(), None);
    }
}
