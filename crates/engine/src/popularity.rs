//! Non-personalised popularity ranking
//!
//! Used as the cold-start fallback, as the fast-mode evaluation supplement,
//! and for plain "top items" listings. Low-volume items are pulled towards
//! the global mean so a single 5-star rating cannot top the list:
//!
//! score = (count · mean + damping · global_mean) / (count + damping)

use crate::matrix::{ordered_sum, RatingMatrix};
use cinerec_core::{Catalog, ItemId, RecommenderError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Rating statistics of one item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopularItem {
    pub item_id: ItemId,
    pub mean_rating: f64,
    pub rating_count: usize,
    pub score: f64,
}

/// Sort key for global listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopularitySort {
    /// Damped mean rating
    #[default]
    Score,
    /// Number of ratings
    Count,
}

impl fmt::Display for PopularitySort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopularitySort::Score => write!(f, "score"),
            PopularitySort::Count => write!(f, "count"),
        }
    }
}

impl FromStr for PopularitySort {
    type Err = RecommenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "score" | "average" => Ok(PopularitySort::Score),
            "count" => Ok(PopularitySort::Count),
            other => Err(RecommenderError::invalid_config(
                format!("Unknown sort order '{}'. Must be one of: score, count", other),
                "sort_by",
            )),
        }
    }
}

/// Filters for a global popularity listing
#[derive(Debug, Clone, Default)]
pub struct PopularityQuery {
    pub genre: Option<String>,
    pub min_ratings: usize,
    pub sort_by: PopularitySort,
    pub limit: usize,
}

/// Item statistics computed once from a rating matrix
#[derive(Debug, Clone, Default)]
pub struct PopularityIndex {
    stats: HashMap<ItemId, PopularItem>,
    /// Every item ordered by score desc, count desc, id asc
    ranking: Vec<ItemId>,
    damping: f64,
}

impl PopularityIndex {
    /// Build the index, rejecting a negative or non-finite damping factor
    pub fn build(matrix: &RatingMatrix, damping: f64) -> Result<Self> {
        if !damping.is_finite() || damping < 0.0 {
            return Err(RecommenderError::invalid_config(
                format!("popularity_damping must be a non-negative number, got {}", damping),
                "CINEREC_POPULARITY_DAMPING",
            ));
        }

        let global_mean = matrix.global_mean().unwrap_or(0.0);
        let stats: HashMap<ItemId, PopularItem> = matrix
            .items()
            .into_iter()
            .filter_map(|item_id| {
                let raters = matrix.item_raters(item_id)?;
                let count = raters.len();
                if count == 0 {
                    return None;
                }
                let mean = ordered_sum(raters) / count as f64;
                let n = count as f64;
                let score = (n * mean + damping * global_mean) / (n + damping);
                Some((
                    item_id,
                    PopularItem {
                        item_id,
                        mean_rating: mean,
                        rating_count: count,
                        score,
                    },
                ))
            })
            .collect();

        let mut ranked: Vec<&PopularItem> = stats.values().collect();
        ranked.sort_by(|a, b| compare_by_score(a, b));
        let ranking = ranked.into_iter().map(|p| p.item_id).collect();

        Ok(Self {
            stats,
            ranking,
            damping,
        })
    }

    pub fn damping(&self) -> f64 {
        self.damping
    }

    pub fn len(&self) -> usize {
        self.ranking.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }

    pub fn get(&self, item_id: ItemId) -> Option<&PopularItem> {
        self.stats.get(&item_id)
    }

    /// Damped score of an item, `None` if nobody rated it
    pub fn score(&self, item_id: ItemId) -> Option<f64> {
        self.stats.get(&item_id).map(|p| p.score)
    }

    /// The `limit` most popular items for which `exclude` returns false
    pub fn top_unrated(&self, exclude: impl Fn(ItemId) -> bool, limit: usize) -> Vec<ItemId> {
        self.ranking
            .iter()
            .copied()
            .filter(|item| !exclude(*item))
            .take(limit)
            .collect()
    }

    /// Rank an arbitrary candidate list by popularity, dropping unrated items
    pub fn rank_candidates(&self, candidates: impl IntoIterator<Item = ItemId>) -> Vec<PopularItem> {
        let mut scored: Vec<PopularItem> = candidates
            .into_iter()
            .filter_map(|item| self.stats.get(&item).copied())
            .collect();
        scored.sort_by(compare_by_score);
        scored
    }

    /// Global listing, optionally restricted to one genre
    pub fn ranked(&self, catalog: &Catalog, query: &PopularityQuery) -> Vec<PopularItem> {
        let mut items: Vec<PopularItem> = self
            .stats
            .values()
            .filter(|p| p.rating_count >= query.min_ratings)
            .filter(|p| match &query.genre {
                Some(genre) => catalog
                    .get(p.item_id)
                    .map(|meta| meta.has_genre(genre))
                    .unwrap_or(false),
                None => true,
            })
            .copied()
            .collect();

        match query.sort_by {
            PopularitySort::Score => items.sort_by(compare_by_score),
            PopularitySort::Count => items.sort_by(compare_by_count),
        }
        items.truncate(query.limit);
        items
    }
}

fn compare_by_score(a: &PopularItem, b: &PopularItem) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then(b.rating_count.cmp(&a.rating_count))
        .then(a.item_id.cmp(&b.item_id))
}

fn compare_by_count(a: &PopularItem, b: &PopularItem) -> Ordering {
    b.rating_count
        .cmp(&a.rating_count)
        .then(b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
        .then(a.item_id.cmp(&b.item_id))
}
