//! Offline evaluation harness
//!
//! One run moves through: load → split → per-user predict and score →
//! aggregate → report. Standard and fast mode share every step; they differ
//! only in the candidate universe handed to the orchestrator.

pub mod metrics;
pub mod report;
pub mod split;

pub use metrics::{DiversityMetrics, RankingMetrics, RatingMetrics};
pub use report::{
    AggregatedMetrics, DatasetInfo, DiversitySummary, EvaluationReport, MetricRow, RankingSummary,
};
pub use split::EvaluationSplit;

use crate::matrix::RatingMatrix;
use crate::popularity::PopularityIndex;
use crate::recommendation::{RecommendRequest, RecommendationOrchestrator};
use crate::similarity::SimilarityCache;
use crate::universe::{CandidateUniverse, FullUniverse, TestPlusPopular};
use chrono::Utc;
use cinerec_core::{
    Catalog, ConfigLoader, Dataset, EngineConfig, EvaluationConfig, EvaluationMode, ItemId, Rating,
    Result, UserId,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Minimum interval between progress log lines
const PROGRESS_INTERVAL_SECS: u64 = 5;

/// What one user contributed to the run
#[derive(Debug, Clone, Default)]
struct UserOutcome {
    rating_pairs: Vec<(f64, f64)>,
    ranking: Option<RankingMetrics>,
    diversity: Option<DiversityMetrics>,
    recommended: Vec<ItemId>,
    is_cold_start: bool,
}

/// Read-only state shared by every per-user task of one run
struct RunContext<'a> {
    orchestrator: RecommendationOrchestrator<'a>,
    universe: &'a dyn CandidateUniverse,
    test_by_user: &'a HashMap<UserId, Vec<Rating>>,
    engine: EngineConfig,
    vocabulary_size: usize,
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    config: EvaluationConfig,
}

impl Evaluator {
    /// # Errors
    ///
    /// `InvalidConfiguration` if the configuration fails validation.
    pub fn new(config: EvaluationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn split(&self, ratings: &[Rating]) -> Result<EvaluationSplit> {
        EvaluationSplit::new(
            ratings,
            self.config.test_ratio,
            self.config.min_ratings_per_user,
            self.config.random_seed,
        )
    }

    /// Users to evaluate: a seeded sample when `sample_users` is set, ascending
    pub fn select_users(&self, split: &EvaluationSplit) -> Vec<UserId> {
        let mut users = split.users.clone();
        if let Some(sample) = self.config.sample_users {
            if sample < users.len() {
                let mut rng = StdRng::seed_from_u64(self.config.random_seed);
                users = users.choose_multiple(&mut rng, sample).copied().collect();
                users.sort_unstable();
            }
        }
        users
    }

    /// Candidate universe for the configured mode
    pub fn universe(&self, split: &EvaluationSplit) -> Box<dyn CandidateUniverse> {
        match self.config.mode {
            EvaluationMode::Standard => Box::new(FullUniverse),
            EvaluationMode::Fast => Box::new(TestPlusPopular::new(
                split.test_items(),
                self.config.fast_supplement,
            )),
        }
    }

    /// Split `dataset` and evaluate the result
    #[instrument(skip(self, dataset), fields(mode = %self.config.mode, ratings = dataset.ratings.len()))]
    pub fn run(&self, dataset: &Dataset) -> Result<EvaluationReport> {
        let split = self.split(&dataset.ratings)?;
        self.evaluate(&split, &dataset.catalog)
    }

    /// Evaluate an existing split against `catalog`
    pub fn evaluate(&self, split: &EvaluationSplit, catalog: &Catalog) -> Result<EvaluationReport> {
        let started = Instant::now();

        // Train ratings alone populate the matrix
        let matrix = RatingMatrix::from_ratings(&split.train);
        let popularity = PopularityIndex::build(&matrix, self.config.popularity_damping)?;
        let cache = SimilarityCache::new();
        let universe = self.universe(split);
        let test_by_user = split.test_by_user();

        let context = RunContext {
            orchestrator: RecommendationOrchestrator::new(&matrix, catalog, &cache, &popularity),
            universe: universe.as_ref(),
            test_by_user: &test_by_user,
            engine: self.config.engine_config(),
            vocabulary_size: catalog.genre_vocabulary().len(),
        };

        let users = self.select_users(split);
        info!(
            users = users.len(),
            mode = %self.config.mode,
            universe = universe.name(),
            train = split.train.len(),
            test = split.test.len(),
            "Evaluating users"
        );

        let done = AtomicUsize::new(0);
        let last_progress = AtomicU64::new(0);
        let total = users.len();

        // Collected in user order so the reduction below is reproducible
        let outcomes: Vec<(UserId, Result<UserOutcome>)> = users
            .par_iter()
            .map(|&user_id| {
                let outcome = self.evaluate_user(&context, user_id);
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                report_progress(started, &last_progress, finished, total);
                (user_id, outcome)
            })
            .collect();

        let mut dataset = DatasetInfo {
            train_ratings: split.train.len(),
            test_ratings: split.test.len(),
            total_users: total,
            excluded_users: split.excluded_users,
            catalog_size: catalog.len(),
            rated_items: matrix.num_items(),
            ..DatasetInfo::default()
        };
        let metrics = self.aggregate(outcomes, &mut dataset);

        let elapsed = started.elapsed().as_secs_f64();
        info!(
            evaluated = dataset.evaluated_users,
            failed = dataset.failed_users,
            similarity_pairs = cache.len(),
            cache_hits = cache.hits(),
            elapsed_secs = elapsed,
            "Evaluation complete"
        );

        Ok(EvaluationReport {
            config: self.config.clone(),
            dataset,
            metrics,
            evaluation_time_seconds: elapsed,
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    fn evaluate_user(&self, context: &RunContext<'_>, user_id: UserId) -> Result<UserOutcome> {
        let engine = &context.engine;
        let test = context
            .test_by_user
            .get(&user_id)
            .map(Vec::as_slice)
            .unwrap_or_default();

        // Rating accuracy over the held-out items
        let neighbors =
            context
                .orchestrator
                .neighbors(user_id, engine.top_k_neighbors, engine.min_common_items)?;
        let predictor = context.orchestrator.predictor();
        let rating_pairs: Vec<(f64, f64)> = test
            .iter()
            .filter_map(|rating| {
                predictor
                    .predict(rating.item_id, &neighbors)
                    .map(|p| (p.rating, rating.value))
            })
            .collect();

        // Ranking quality over the candidate universe
        let request = RecommendRequest::new(user_id, engine);
        let list = context
            .orchestrator
            .recommend_with_neighbors(&request, context.universe, &neighbors)?;
        let recommended = list.item_ids();

        let relevant: HashSet<ItemId> = test
            .iter()
            .filter(|rating| rating.value >= self.config.relevance_threshold)
            .map(|rating| rating.item_id)
            .collect();
        let ranking = RankingMetrics::compute(&recommended, &relevant, engine.top_n);

        let diversity = (self.config.compute_diversity && !list.is_empty()).then(|| {
            let genres: Vec<BTreeSet<String>> =
                list.items.iter().map(|item| item.genres.clone()).collect();
            DiversityMetrics::compute(&genres, context.vocabulary_size)
        });

        debug!(
            user_id,
            predicted = rating_pairs.len(),
            recommended = recommended.len(),
            is_cold_start = list.is_cold_start,
            "Evaluated user"
        );

        Ok(UserOutcome {
            rating_pairs,
            ranking,
            diversity,
            recommended,
            is_cold_start: list.is_cold_start,
        })
    }

    fn aggregate(
        &self,
        outcomes: Vec<(UserId, Result<UserOutcome>)>,
        dataset: &mut DatasetInfo,
    ) -> AggregatedMetrics {
        let mut pairs = Vec::new();
        let mut precision = Vec::new();
        let mut recall = Vec::new();
        let mut f1 = Vec::new();
        let mut ndcg = Vec::new();
        let mut intra_list = Vec::new();
        let mut genre_coverage = Vec::new();
        let mut unique_genres = Vec::new();
        let mut recommended: HashSet<ItemId> = HashSet::new();
        let mut cold_starts = 0usize;

        for (user_id, outcome) in outcomes {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(user_id, error = %e, "Skipping user after evaluation failure");
                    dataset.failed_users += 1;
                    continue;
                }
            };

            dataset.evaluated_users += 1;
            pairs.extend(outcome.rating_pairs);
            if let Some(ranking) = outcome.ranking {
                precision.push(ranking.precision);
                recall.push(ranking.recall);
                f1.push(ranking.f1);
                ndcg.push(ranking.ndcg);
            }
            if let Some(diversity) = outcome.diversity {
                intra_list.push(diversity.intra_list_diversity);
                genre_coverage.push(diversity.genre_coverage);
                unique_genres.push(diversity.unique_genres as f64);
            }
            recommended.extend(outcome.recommended);
            if outcome.is_cold_start {
                cold_starts += 1;
            }
        }

        let diversity = self.config.compute_diversity.then(|| DiversitySummary {
            avg_intra_list_diversity: metrics::mean(&intra_list),
            avg_genre_coverage: metrics::mean(&genre_coverage),
            avg_unique_genres: metrics::mean(&unique_genres),
            users: intra_list.len(),
        });

        let cold_start_rate = if dataset.evaluated_users == 0 {
            0.0
        } else {
            cold_starts as f64 / dataset.evaluated_users as f64
        };

        AggregatedMetrics {
            rating: RatingMetrics::from_pairs(&pairs),
            ranking: RankingSummary {
                k: self.config.top_n,
                precision: metrics::mean(&precision),
                recall: metrics::mean(&recall),
                f1: metrics::mean(&f1),
                ndcg: metrics::mean(&ndcg),
                users: precision.len(),
            },
            diversity,
            catalog_coverage: metrics::catalog_coverage(&recommended, dataset.rated_items),
            cold_start_rate,
        }
    }
}

/// Log progress at most once per interval across all worker threads
fn report_progress(started: Instant, last: &AtomicU64, finished: usize, total: usize) {
    let elapsed = started.elapsed();
    let now = elapsed.as_secs();
    let previous = last.load(Ordering::Relaxed);
    if now < previous + PROGRESS_INTERVAL_SECS {
        return;
    }
    if last
        .compare_exchange(previous, now, Ordering::Relaxed, Ordering::Relaxed)
        .is_err()
    {
        return;
    }

    let secs = elapsed.as_secs_f64();
    let rate = finished as f64 / secs.max(f64::EPSILON);
    let remaining = (total - finished) as f64 / rate.max(f64::EPSILON);
    info!(
        "Progress: {}/{} users ({:.1}s elapsed, ~{:.1}s remaining)",
        finished, total, secs, remaining
    );
}
