//! # CineRec Core
//!
//! Shared building blocks for the CineRec recommender workspace.
//!
//! ## Modules
//!
//! - `models`: Typed rating and item metadata records
//! - `error`: Error taxonomy shared by all crates
//! - `config`: Environment-driven configuration loading and validation
//! - `loader`: CSV loading boundary with schema validation and dataset caps
//! - `observability`: Structured logging initialisation

pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod observability;

pub use config::{
    load_dotenv, ConfigLoader, DataConfig, EngineConfig, EvaluationConfig, EvaluationMode,
};
pub use error::{RecommenderError, Result};
pub use loader::{apply_filter, load_dataset, load_movies, load_ratings, DatasetFilter};
pub use models::{Catalog, Dataset, ItemId, ItemMetadata, Rating, UserId};
pub use observability::{init_logging, LogConfig, LogFormat};
