//! Configuration loading and validation
//!
//! Every setting can come from a `CINEREC_`-prefixed environment variable
//! (optionally via a `.env` file) and falls back to a documented default.
//! Override hierarchy: defaults < .env < environment < explicit CLI flags.
//!
//! # Example
//!
//! ```no_run
//! use cinerec_core::config::{load_dotenv, ConfigLoader, EvaluationConfig};
//!
//! # fn example() -> cinerec_core::Result<()> {
//! load_dotenv();
//!
//! let config = EvaluationConfig::from_env()?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{RecommenderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration loader trait
///
/// Provides standardized methods for loading and validating configuration from
/// environment variables.
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an `InvalidConfiguration` error if a variable is set but cannot
    /// be parsed.
    fn from_env() -> Result<Self>;

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an `InvalidConfiguration` error naming the first offending key.
    fn validate(&self) -> Result<()>;
}

/// Input table locations and the dataset size caps applied while loading
///
/// # Environment Variables
///
/// - `CINEREC_RATINGS_PATH` (optional): ratings CSV (default: `dataset/ratings.csv`)
/// - `CINEREC_MOVIES_PATH` (optional): movies CSV (default: `dataset/movies.csv`)
/// - `CINEREC_MAX_USERS` (optional): keep only the N most active users
/// - `CINEREC_MAX_ITEMS` (optional): keep only the N most rated items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub ratings_path: String,
    pub movies_path: String,
    pub max_users: Option<usize>,
    pub max_items: Option<usize>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ratings_path: "dataset/ratings.csv".to_string(),
            movies_path: "dataset/movies.csv".to_string(),
            max_users: None,
            max_items: None,
        }
    }
}

impl ConfigLoader for DataConfig {
    fn from_env() -> Result<Self> {
        let defaults = DataConfig::default();
        Ok(Self {
            ratings_path: std::env::var("CINEREC_RATINGS_PATH").unwrap_or(defaults.ratings_path),
            movies_path: std::env::var("CINEREC_MOVIES_PATH").unwrap_or(defaults.movies_path),
            max_users: parse_optional_env_var("CINEREC_MAX_USERS")?,
            max_items: parse_optional_env_var("CINEREC_MAX_ITEMS")?,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.ratings_path.trim().is_empty() {
            return Err(RecommenderError::invalid_config(
                "ratings_path must not be empty",
                "CINEREC_RATINGS_PATH",
            ));
        }
        if self.movies_path.trim().is_empty() {
            return Err(RecommenderError::invalid_config(
                "movies_path must not be empty",
                "CINEREC_MOVIES_PATH",
            ));
        }
        validate_cap(self.max_users, "max_users", "CINEREC_MAX_USERS")?;
        validate_cap(self.max_items, "max_items", "CINEREC_MAX_ITEMS")
    }
}

/// Parameters of a single recommendation request
///
/// # Environment Variables
///
/// - `CINEREC_MIN_COMMON_ITEMS` (default: 5)
/// - `CINEREC_TOP_K_NEIGHBORS` (default: 50)
/// - `CINEREC_TOP_N` (default: 10)
/// - `CINEREC_POPULARITY_DAMPING` (default: 5.0)
/// - `CINEREC_CONTRIBUTOR_LIMIT` (default: 10)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum co-rated items before a similarity is defined
    pub min_common_items: usize,
    /// Neighbour set size K
    pub top_k_neighbors: usize,
    /// Length of the returned recommendation list
    pub top_n: usize,
    /// Pseudo-count pulling low-volume item means towards the global mean
    pub popularity_damping: f64,
    /// How many contributing neighbour ids are attached to a recommendation
    pub contributor_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_common_items: 5,
            top_k_neighbors: 50,
            top_n: 10,
            popularity_damping: 5.0,
            contributor_limit: 10,
        }
    }
}

impl ConfigLoader for EngineConfig {
    fn from_env() -> Result<Self> {
        let defaults = EngineConfig::default();
        Ok(Self {
            min_common_items: parse_env_var("CINEREC_MIN_COMMON_ITEMS", defaults.min_common_items)?,
            top_k_neighbors: parse_env_var("CINEREC_TOP_K_NEIGHBORS", defaults.top_k_neighbors)?,
            top_n: parse_env_var("CINEREC_TOP_N", defaults.top_n)?,
            popularity_damping: parse_env_var(
                "CINEREC_POPULARITY_DAMPING",
                defaults.popularity_damping,
            )?,
            contributor_limit: parse_env_var(
                "CINEREC_CONTRIBUTOR_LIMIT",
                defaults.contributor_limit,
            )?,
        })
    }

    fn validate(&self) -> Result<()> {
        validate_top_n(self.top_n)?;
        validate_top_k(self.top_k_neighbors)?;
        validate_damping(self.popularity_damping)
    }
}

/// Which candidate universe the ranking metrics are computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    /// Every item the user has not rated in train
    Standard,
    /// The user's test items plus a bounded popularity supplement
    Fast,
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationMode::Standard => write!(f, "standard"),
            EvaluationMode::Fast => write!(f, "fast"),
        }
    }
}

impl FromStr for EvaluationMode {
    type Err = RecommenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(EvaluationMode::Standard),
            "fast" => Ok(EvaluationMode::Fast),
            other => Err(RecommenderError::invalid_config(
                format!("Unknown evaluation mode '{}'. Must be one of: standard, fast", other),
                "CINEREC_EVAL_MODE",
            )),
        }
    }
}

/// Configuration of one offline evaluation run
///
/// # Environment Variables
///
/// - `CINEREC_TEST_RATIO` (default: 0.2)
/// - `CINEREC_SAMPLE_USERS` (optional)
/// - `CINEREC_TOP_N` (default: 10)
/// - `CINEREC_MIN_RATINGS_PER_USER` (default: 5)
/// - `CINEREC_MIN_COMMON_ITEMS` (default: 5)
/// - `CINEREC_TOP_K_NEIGHBORS` (default: 50)
/// - `CINEREC_RELEVANCE_THRESHOLD` (default: 3.5)
/// - `CINEREC_MAX_USERS` / `CINEREC_MAX_ITEMS` (optional)
/// - `CINEREC_RANDOM_SEED` (default: 42)
/// - `CINEREC_EVAL_MODE` (default: `fast`)
/// - `CINEREC_FAST_SUPPLEMENT` (default: 20)
/// - `CINEREC_COMPUTE_DIVERSITY` (default: true)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub test_ratio: f64,
    pub sample_users: Option<usize>,
    pub top_n: usize,
    pub min_ratings_per_user: usize,
    pub min_common_items: usize,
    pub top_k_neighbors: usize,
    pub relevance_threshold: f64,
    pub max_users: Option<usize>,
    pub max_items: Option<usize>,
    pub random_seed: u64,
    pub mode: EvaluationMode,
    /// Popular items added to each user's universe in fast mode
    pub fast_supplement: usize,
    pub compute_diversity: bool,
    pub popularity_damping: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            sample_users: None,
            top_n: 10,
            min_ratings_per_user: 5,
            min_common_items: 5,
            top_k_neighbors: 50,
            relevance_threshold: 3.5,
            max_users: None,
            max_items: None,
            random_seed: 42,
            mode: EvaluationMode::Fast,
            fast_supplement: 20,
            compute_diversity: true,
            popularity_damping: EngineConfig::default().popularity_damping,
        }
    }
}

impl EvaluationConfig {
    /// Engine parameters used for every request issued during the run
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            min_common_items: self.min_common_items,
            top_k_neighbors: self.top_k_neighbors,
            top_n: self.top_n,
            popularity_damping: self.popularity_damping,
            ..EngineConfig::default()
        }
    }
}

impl ConfigLoader for EvaluationConfig {
    fn from_env() -> Result<Self> {
        let defaults = EvaluationConfig::default();

        let mode = match std::env::var("CINEREC_EVAL_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.mode,
        };

        Ok(Self {
            test_ratio: parse_env_var("CINEREC_TEST_RATIO", defaults.test_ratio)?,
            sample_users: parse_optional_env_var("CINEREC_SAMPLE_USERS")?,
            top_n: parse_env_var("CINEREC_TOP_N", defaults.top_n)?,
            min_ratings_per_user: parse_env_var(
                "CINEREC_MIN_RATINGS_PER_USER",
                defaults.min_ratings_per_user,
            )?,
            min_common_items: parse_env_var("CINEREC_MIN_COMMON_ITEMS", defaults.min_common_items)?,
            top_k_neighbors: parse_env_var("CINEREC_TOP_K_NEIGHBORS", defaults.top_k_neighbors)?,
            relevance_threshold: parse_env_var(
                "CINEREC_RELEVANCE_THRESHOLD",
                defaults.relevance_threshold,
            )?,
            max_users: parse_optional_env_var("CINEREC_MAX_USERS")?,
            max_items: parse_optional_env_var("CINEREC_MAX_ITEMS")?,
            random_seed: parse_env_var("CINEREC_RANDOM_SEED", defaults.random_seed)?,
            mode,
            fast_supplement: parse_env_var("CINEREC_FAST_SUPPLEMENT", defaults.fast_supplement)?,
            compute_diversity: parse_env_var(
                "CINEREC_COMPUTE_DIVERSITY",
                defaults.compute_diversity,
            )?,
            popularity_damping: parse_env_var(
                "CINEREC_POPULARITY_DAMPING",
                defaults.popularity_damping,
            )?,
        })
    }

    fn validate(&self) -> Result<()> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(RecommenderError::invalid_config(
                format!("test_ratio must be between 0 and 1 (exclusive), got {}", self.test_ratio),
                "CINEREC_TEST_RATIO",
            ));
        }

        validate_top_n(self.top_n)?;
        validate_top_k(self.top_k_neighbors)?;
        validate_damping(self.popularity_damping)?;

        if self.min_ratings_per_user == 0 {
            return Err(RecommenderError::invalid_config(
                "min_ratings_per_user must be greater than 0",
                "CINEREC_MIN_RATINGS_PER_USER",
            ));
        }

        if !self.relevance_threshold.is_finite() {
            return Err(RecommenderError::invalid_config(
                "relevance_threshold must be a finite number",
                "CINEREC_RELEVANCE_THRESHOLD",
            ));
        }

        if self.sample_users == Some(0) {
            return Err(RecommenderError::invalid_config(
                "sample_users must be greater than 0 when set",
                "CINEREC_SAMPLE_USERS",
            ));
        }

        validate_cap(self.max_users, "max_users", "CINEREC_MAX_USERS")?;
        validate_cap(self.max_items, "max_items", "CINEREC_MAX_ITEMS")
    }
}

fn validate_top_n(top_n: usize) -> Result<()> {
    if top_n == 0 {
        return Err(RecommenderError::invalid_config(
            "top_n must be greater than 0",
            "CINEREC_TOP_N",
        ));
    }
    Ok(())
}

fn validate_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(RecommenderError::invalid_config(
            "top_k_neighbors must be greater than 0",
            "CINEREC_TOP_K_NEIGHBORS",
        ));
    }
    Ok(())
}

fn validate_damping(damping: f64) -> Result<()> {
    if !damping.is_finite() || damping < 0.0 {
        return Err(RecommenderError::invalid_config(
            format!("popularity_damping must be a non-negative number, got {}", damping),
            "CINEREC_POPULARITY_DAMPING",
        ));
    }
    Ok(())
}

fn validate_cap(cap: Option<usize>, name: &str, key: &str) -> Result<()> {
    if cap == Some(0) {
        return Err(RecommenderError::invalid_config(
            format!("{} must be greater than 0 when set", name),
            key,
        ));
    }
    Ok(())
}

/// Parse an environment variable, falling back to `default` when unset
///
/// # Errors
///
/// Returns an `InvalidConfiguration` error if the value cannot be parsed
pub fn parse_env_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    parse_optional_env_var(key).map(|value| value.unwrap_or(default))
}

/// Parse an environment variable that has no default
pub fn parse_optional_env_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map(Some).map_err(|e| {
            RecommenderError::invalid_config(format!("Failed to parse {}: {}", key, e), key)
        }),
        _ => Ok(None),
    }
}

/// Load .env file if present
///
/// Does not fail when the file is missing.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
}
