//! Recommendation assembly with cold-start fallback
//!
//! Steps of a request:
//! 1. Reject unknown users and invalid sizes
//! 2. Pick candidates from the universe, excluding items the user rated
//! 3. Select neighbours; an empty set switches to the popularity fallback
//! 4. Score candidates (neighbour-weighted prediction, optionally blended
//!    with content scores)
//! 5. Apply the genre filter
//! 6. Sort by score desc, item id asc, and truncate to N
//! 7. Attach item metadata

use crate::content::{ContentScorer, DEFAULT_LIKED_THRESHOLD};
use crate::hybrid::{blend, ScoringMode};
use crate::matrix::RatingMatrix;
use crate::neighborhood::{NeighborSet, NeighborhoodSelector};
use crate::popularity::PopularityIndex;
use crate::prediction::{Prediction, RatingPredictor};
use crate::similarity::{SimilarityCache, SimilarityEngine};
use crate::universe::{CandidateUniverse, FullUniverse};
use cinerec_core::{Catalog, EngineConfig, ItemId, RecommenderError, Result, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Parameters of a single recommendation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub user_id: UserId,
    pub top_n: usize,
    /// Keep only items carrying this genre (case-insensitive)
    pub genre: Option<String>,
    pub min_common_items: usize,
    pub top_k_neighbors: usize,
    pub mode: ScoringMode,
}

impl RecommendRequest {
    pub fn new(user_id: UserId, config: &EngineConfig) -> Self {
        Self {
            user_id,
            top_n: config.top_n,
            genre: None,
            min_common_items: config.min_common_items,
            top_k_neighbors: config.top_k_neighbors,
            mode: ScoringMode::Collaborative,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Blank genres are treated as no filter
    pub fn with_genre(mut self, genre: Option<impl Into<String>>) -> Self {
        self.genre = genre
            .map(Into::into)
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());
        self
    }

    pub fn with_mode(mut self, mode: ScoringMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(RecommenderError::invalid_config(
                "top_n must be greater than 0",
                "CINEREC_TOP_N",
            ));
        }
        if self.top_k_neighbors == 0 {
            return Err(RecommenderError::invalid_config(
                "top_k_neighbors must be greater than 0",
                "CINEREC_TOP_K_NEIGHBORS",
            ));
        }
        self.mode.validate()
    }
}

/// One recommended item with its metadata attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub title: String,
    /// Neighbour-weighted prediction, or the popularity score on cold start
    pub predicted_rating: f64,
    pub genres: BTreeSet<String>,
    pub release_year: Option<u16>,
    pub contributing_neighbors: Vec<UserId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationList {
    pub user_id: UserId,
    pub items: Vec<Recommendation>,
    pub is_cold_start: bool,
}

impl RecommendationList {
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|r| r.item_id).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// An item with a score, before metadata is attached
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub item_id: ItemId,
    pub score: f64,
    pub contributors: Vec<UserId>,
}

fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then(a.item_id.cmp(&b.item_id))
}

/// Sort best first: score descending, item id ascending
pub fn rank_candidates(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(compare_candidates);
}

/// Read-only view over one run's data, sharing a similarity cache
#[derive(Debug, Clone, Copy)]
pub struct RecommendationOrchestrator<'a> {
    matrix: &'a RatingMatrix,
    catalog: &'a Catalog,
    cache: &'a SimilarityCache,
    popularity: &'a PopularityIndex,
    contributor_limit: usize,
    liked_threshold: f64,
}

impl<'a> RecommendationOrchestrator<'a> {
    pub fn new(
        matrix: &'a RatingMatrix,
        catalog: &'a Catalog,
        cache: &'a SimilarityCache,
        popularity: &'a PopularityIndex,
    ) -> Self {
        Self {
            matrix,
            catalog,
            cache,
            popularity,
            contributor_limit: EngineConfig::default().contributor_limit,
            liked_threshold: DEFAULT_LIKED_THRESHOLD,
        }
    }

    pub fn with_contributor_limit(mut self, limit: usize) -> Self {
        self.contributor_limit = limit;
        self
    }

    pub fn with_liked_threshold(mut self, threshold: f64) -> Self {
        self.liked_threshold = threshold;
        self
    }

    pub fn matrix(&self) -> &'a RatingMatrix {
        self.matrix
    }

    pub fn similarity(&self) -> SimilarityEngine<'a> {
        SimilarityEngine::new(self.matrix, self.cache)
    }

    pub fn predictor(&self) -> RatingPredictor<'a> {
        RatingPredictor::new(self.matrix, self.contributor_limit)
    }

    pub fn neighbors(&self, user_id: UserId, k: usize, min_common_items: usize) -> Result<NeighborSet> {
        NeighborhoodSelector::new(self.similarity()).neighbors(user_id, k, min_common_items)
    }

    /// Predicted rating for one item from the user's neighbourhood
    pub fn predict(
        &self,
        user_id: UserId,
        item_id: ItemId,
        k: usize,
        min_common_items: usize,
    ) -> Result<Option<Prediction>> {
        self.ensure_user(user_id)?;
        self.ensure_item(item_id)?;
        let neighbors = self.neighbors(user_id, k, min_common_items)?;
        Ok(self.predictor().predict(item_id, &neighbors))
    }

    /// Top-N recommendations over every item the user has not rated
    pub fn recommend(&self, request: &RecommendRequest) -> Result<RecommendationList> {
        self.recommend_within(request, &FullUniverse)
    }

    /// Top-N recommendations restricted to `universe`
    #[instrument(skip(self, request, universe), fields(user_id = request.user_id, universe = universe.name()))]
    pub fn recommend_within(
        &self,
        request: &RecommendRequest,
        universe: &dyn CandidateUniverse,
    ) -> Result<RecommendationList> {
        // Step 1: Validate
        request.validate()?;
        self.ensure_user(request.user_id)?;
        let neighbors = self.neighbors(
            request.user_id,
            request.top_k_neighbors,
            request.min_common_items,
        )?;
        self.assemble(request, universe, &neighbors)
    }

    /// Like `recommend_within`, reusing a neighbourhood already selected for
    /// `request.user_id` with the request's `top_k_neighbors` and `min_common_items`
    pub fn recommend_with_neighbors(
        &self,
        request: &RecommendRequest,
        universe: &dyn CandidateUniverse,
        neighbors: &NeighborSet,
    ) -> Result<RecommendationList> {
        request.validate()?;
        self.ensure_user(request.user_id)?;
        self.assemble(request, universe, neighbors)
    }

    fn assemble(
        &self,
        request: &RecommendRequest,
        universe: &dyn CandidateUniverse,
        neighbors: &NeighborSet,
    ) -> Result<RecommendationList> {
        // Step 2: Candidates, never anything the user already rated
        let candidates: Vec<ItemId> = universe
            .candidates(request.user_id, self.matrix, self.popularity)
            .into_iter()
            .filter(|item| !self.matrix.has_rated(request.user_id, *item))
            .collect();

        // Step 3 + 4: Score
        let (mut scored, is_cold_start) = match request.mode {
            ScoringMode::Collaborative => {
                let (scored, cold) = self.collaborative(neighbors, &candidates);
                (self.filter_genre(scored, request.genre.as_deref()), cold)
            }
            ScoringMode::Hybrid { strategy, weights } => {
                let (mut cf, cf_cold) = self.collaborative(neighbors, &candidates);
                cf = self.filter_genre(cf, request.genre.as_deref());
                rank_candidates(&mut cf);

                let content = ContentScorer::new(self.matrix, self.catalog)
                    .with_liked_threshold(self.liked_threshold)
                    .score(request.user_id, &candidates);
                let mut cb = self.filter_genre(content, request.genre.as_deref());
                rank_candidates(&mut cb);

                let blended = blend(strategy, weights, cf, cf_cold, cb, request.top_n);
                (blended.candidates, blended.is_cold_start)
            }
        };

        // Step 6: Order and truncate
        rank_candidates(&mut scored);
        scored.truncate(request.top_n);

        // Step 7: Attach metadata
        let items: Vec<Recommendation> = scored
            .into_iter()
            .map(|candidate| self.attach_metadata(candidate))
            .collect();

        debug!(
            user_id = request.user_id,
            candidates = candidates.len(),
            returned = items.len(),
            is_cold_start,
            "Generated recommendations"
        );

        Ok(RecommendationList {
            user_id: request.user_id,
            items,
            is_cold_start,
        })
    }

    fn ensure_user(&self, user_id: UserId) -> Result<()> {
        if self.matrix.contains_user(user_id) {
            Ok(())
        } else {
            Err(RecommenderError::not_found_user(user_id))
        }
    }

    /// Known items are rated by someone or listed in the catalog
    fn ensure_item(&self, item_id: ItemId) -> Result<()> {
        if self.matrix.contains_item(item_id) || self.catalog.get(item_id).is_some() {
            Ok(())
        } else {
            Err(RecommenderError::not_found_item(item_id))
        }
    }

    /// Neighbour-weighted scores, or popularity scores when there are no neighbours
    fn collaborative(
        &self,
        neighbors: &NeighborSet,
        candidates: &[ItemId],
    ) -> (Vec<ScoredCandidate>, bool) {
        if neighbors.is_empty() {
            // Step 3b: Cold start
            let fallback = self
                .popularity
                .rank_candidates(candidates.iter().copied())
                .into_iter()
                .map(|popular| ScoredCandidate {
                    item_id: popular.item_id,
                    score: popular.score,
                    contributors: Vec::new(),
                })
                .collect();
            return (fallback, true);
        }

        let predictor = self.predictor();
        let scored = candidates
            .iter()
            .filter_map(|&item_id| {
                predictor.predict(item_id, neighbors).map(|p| ScoredCandidate {
                    item_id,
                    score: p.rating,
                    contributors: p.contributors,
                })
            })
            .collect();
        (scored, false)
    }

    // Step 5: Genre filter, applied only to already scored candidates
    fn filter_genre(&self, scored: Vec<ScoredCandidate>, genre: Option<&str>) -> Vec<ScoredCandidate> {
        let Some(genre) = genre else {
            return scored;
        };
        scored
            .into_iter()
            .filter(|candidate| {
                self.catalog
                    .get(candidate.item_id)
                    .map(|item| item.has_genre(genre))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn attach_metadata(&self, candidate: ScoredCandidate) -> Recommendation {
        let (title, genres, release_year) = match self.catalog.get(candidate.item_id) {
            Some(item) => (item.title.clone(), item.genres.clone(), item.release_year),
            None => (String::new(), BTreeSet::new(), None),
        };
        Recommendation {
            item_id: candidate.item_id,
            title,
            predicted_rating: candidate.score,
            genres,
            release_year,
            contributing_neighbors: candidate.contributors,
        }
    }
}
