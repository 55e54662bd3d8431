//! CineRec user-based collaborative filtering engine
//!
//! Finds users with correlated rating histories, predicts ratings from their
//! opinions, assembles top-N lists with a popularity fallback for cold-start
//! users, and measures the result offline.

pub mod content;
pub mod evaluation;
pub mod hybrid;
pub mod matrix;
pub mod neighborhood;
pub mod popularity;
pub mod prediction;
pub mod recommendation;
pub mod similarity;
pub mod universe;

// Re-export key types
pub use content::{ContentScorer, GenreProfile};
pub use evaluation::{AggregatedMetrics, EvaluationReport, EvaluationSplit, Evaluator, MetricRow};
pub use hybrid::{HybridStrategy, HybridWeights, ScoringMode};
pub use matrix::RatingMatrix;
pub use neighborhood::{Neighbor, NeighborSet, NeighborhoodSelector};
pub use popularity::{PopularItem, PopularityIndex, PopularityQuery, PopularitySort};
pub use prediction::{Prediction, RatingPredictor};
pub use recommendation::{
    RecommendRequest, Recommendation, RecommendationList, RecommendationOrchestrator,
};
pub use similarity::{PairStatistics, SimilarityCache, SimilarityEngine, SimilarityScore, UserPair};
pub use universe::{CandidateUniverse, FullUniverse, TestPlusPopular};

use cinerec_core::{Catalog, ConfigLoader, Dataset, EngineConfig, Result, UserId};
use tracing::info;

/// Owns one run's data and similarity cache
///
/// The matrix and catalog are read-only for the lifetime of the value; the
/// cache only grows.
#[derive(Debug)]
pub struct Recommender {
    config: EngineConfig,
    matrix: RatingMatrix,
    catalog: Catalog,
    popularity: PopularityIndex,
    cache: SimilarityCache,
}

impl Recommender {
    pub fn new(dataset: Dataset, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let matrix = RatingMatrix::from_ratings(&dataset.ratings);
        let popularity = PopularityIndex::build(&matrix, config.popularity_damping)?;

        info!(
            users = matrix.num_users(),
            items = matrix.num_items(),
            ratings = matrix.num_ratings(),
            catalog = dataset.catalog.len(),
            "Built rating matrix"
        );

        Ok(Self {
            config,
            matrix,
            catalog: dataset.catalog,
            popularity,
            cache: SimilarityCache::new(),
        })
    }

    pub fn with_default_config(dataset: Dataset) -> Result<Self> {
        Self::new(dataset, EngineConfig::default())
    }

    /// Make a user with no ratings known, so requests for it fall back to
    /// popularity instead of failing with `NotFound`
    pub fn register_user(&mut self, user_id: UserId) {
        self.matrix.register_user(user_id);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn matrix(&self) -> &RatingMatrix {
        &self.matrix
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn popularity(&self) -> &PopularityIndex {
        &self.popularity
    }

    pub fn cache(&self) -> &SimilarityCache {
        &self.cache
    }

    pub fn orchestrator(&self) -> RecommendationOrchestrator<'_> {
        RecommendationOrchestrator::new(&self.matrix, &self.catalog, &self.cache, &self.popularity)
            .with_contributor_limit(self.config.contributor_limit)
    }

    /// Request pre-filled from the engine configuration
    pub fn request(&self, user_id: UserId) -> RecommendRequest {
        RecommendRequest::new(user_id, &self.config)
    }

    pub fn recommend(&self, request: &RecommendRequest) -> Result<RecommendationList> {
        self.orchestrator().recommend(request)
    }

    /// Pearson similarity under the configured co-rated item threshold
    pub fn similarity(&self, a: UserId, b: UserId) -> Option<f64> {
        SimilarityEngine::new(&self.matrix, &self.cache).similarity(
            a,
            b,
            self.config.min_common_items,
        )
    }

    pub fn popular(&self, query: &PopularityQuery) -> Vec<PopularItem> {
        self.popularity.ranked(&self.catalog, query)
    }
}
