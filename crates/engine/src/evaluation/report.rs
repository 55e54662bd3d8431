//! The canonical evaluation record
//!
//! Every on-disk rendering (JSON, CSV, log, text) is derived from this one
//! value.

use super::metrics::RatingMetrics;
use cinerec_core::EvaluationConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingSummary {
    pub k: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub ndcg: f64,
    /// Users with at least one relevant test item
    pub users: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiversitySummary {
    pub avg_intra_list_diversity: f64,
    pub avg_genre_coverage: f64,
    pub avg_unique_genres: f64,
    /// Users with a non-empty recommendation list
    pub users: usize,
}

/// Whole-run metrics, identical across runs with the same inputs and seed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub rating: RatingMetrics,
    pub ranking: RankingSummary,
    /// `None` when diversity computation was switched off
    pub diversity: Option<DiversitySummary>,
    pub catalog_coverage: f64,
    pub cold_start_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub train_ratings: usize,
    pub test_ratings: usize,
    /// Users considered for evaluation after sampling
    pub total_users: usize,
    /// Users whose evaluation completed
    pub evaluated_users: usize,
    pub failed_users: usize,
    pub excluded_users: usize,
    /// Items in the metadata catalog
    pub catalog_size: usize,
    /// Items with at least one train rating; the catalog coverage denominator
    pub rated_items: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub config: EvaluationConfig,
    pub dataset: DatasetInfo,
    pub metrics: AggregatedMetrics,
    pub evaluation_time_seconds: f64,
    /// RFC 3339 completion time
    pub timestamp: String,
}

/// One `(category, metric, value)` line of the flat metrics table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub category: String,
    pub metric: String,
    pub value: f64,
}

impl MetricRow {
    fn new(category: &str, metric: impl Into<String>, value: f64) -> Self {
        Self {
            category: category.to_string(),
            metric: metric.into(),
            value,
        }
    }
}

impl EvaluationReport {
    /// Flatten the metrics for spreadsheet tools
    pub fn metric_rows(&self) -> Vec<MetricRow> {
        let m = &self.metrics;
        let k = m.ranking.k;
        let d = &self.dataset;

        let mut rows = vec![
            MetricRow::new("dataset_info", "train_ratings", d.train_ratings as f64),
            MetricRow::new("dataset_info", "test_ratings", d.test_ratings as f64),
            MetricRow::new("dataset_info", "total_users", d.total_users as f64),
            MetricRow::new("dataset_info", "evaluated_users", d.evaluated_users as f64),
            MetricRow::new("dataset_info", "failed_users", d.failed_users as f64),
            MetricRow::new("dataset_info", "catalog_size", d.catalog_size as f64),
            MetricRow::new("dataset_info", "rated_items", d.rated_items as f64),
            MetricRow::new("rating_metrics", "mae", m.rating.mae),
            MetricRow::new("rating_metrics", "rmse", m.rating.rmse),
            MetricRow::new("rating_metrics", "count", m.rating.count as f64),
            MetricRow::new("ranking_metrics", format!("precision@{k}"), m.ranking.precision),
            MetricRow::new("ranking_metrics", format!("recall@{k}"), m.ranking.recall),
            MetricRow::new("ranking_metrics", format!("f1@{k}"), m.ranking.f1),
            MetricRow::new("ranking_metrics", format!("ndcg@{k}"), m.ranking.ndcg),
        ];

        if let Some(diversity) = &m.diversity {
            rows.extend([
                MetricRow::new(
                    "diversity_metrics",
                    "avg_intra_list_diversity",
                    diversity.avg_intra_list_diversity,
                ),
                MetricRow::new("diversity_metrics", "avg_genre_coverage", diversity.avg_genre_coverage),
                MetricRow::new("diversity_metrics", "avg_unique_genres", diversity.avg_unique_genres),
            ]);
        }

        rows.push(MetricRow::new("coverage", "catalog_coverage", m.catalog_coverage));
        rows.push(MetricRow::new("cold_start", "cold_start_rate", m.cold_start_rate));
        rows.push(MetricRow::new(
            "timing",
            "evaluation_time_seconds",
            self.evaluation_time_seconds,
        ));
        rows
    }
}
