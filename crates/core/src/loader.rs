//! CSV loading boundary
//!
//! Turns the MovieLens-style `ratings.csv` and `movies.csv` tables into typed
//! records. Schema checks happen here so the engine can rely on every
//! rating being finite and every (user, item) pair appearing once.

use crate::config::DataConfig;
use crate::error::{RecommenderError, Result};
use crate::models::{Catalog, Dataset, ItemId, ItemMetadata, Rating, UserId};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, instrument, warn};

#[derive(Debug, Deserialize)]
struct RatingRecord {
    #[serde(rename = "userId")]
    user_id: UserId,
    #[serde(rename = "movieId")]
    item_id: ItemId,
    rating: f64,
}

#[derive(Debug, Deserialize)]
struct MovieRecord {
    #[serde(rename = "movieId")]
    item_id: ItemId,
    title: String,
    #[serde(default)]
    genres: String,
}

/// Dataset size caps applied after loading
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetFilter {
    /// Keep only the N most active users
    pub max_users: Option<usize>,
    /// Keep only the N most rated items
    pub max_items: Option<usize>,
    /// User kept regardless of the activity cap
    pub include_user: Option<UserId>,
}

impl DatasetFilter {
    pub fn from_config(config: &DataConfig, include_user: Option<UserId>) -> Self {
        Self {
            max_users: config.max_users,
            max_items: config.max_items,
            include_user,
        }
    }
}

/// Load and validate a ratings table
///
/// Extra columns such as `timestamp` are ignored. When a (user, item) pair
/// appears more than once the last row wins.
pub fn load_ratings<P: AsRef<Path>>(path: P) -> Result<Vec<Rating>> {
    let path = path.as_ref();
    let file = open(path)?;
    read_ratings(file, &path.display().to_string())
}

/// Parse ratings from any reader; `source_name` is used in error messages
pub fn read_ratings<R: Read>(reader: R, source_name: &str) -> Result<Vec<Rating>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut ratings: Vec<Rating> = Vec::new();
    let mut positions: HashMap<(UserId, ItemId), usize> = HashMap::new();
    let mut duplicates = 0usize;

    for (index, record) in csv_reader.deserialize::<RatingRecord>().enumerate() {
        let line = index as u64 + 2;
        let record = record.map_err(|e| RecommenderError::DataValidation {
            source_name: source_name.to_string(),
            line,
            message: e.to_string(),
        })?;

        if !record.rating.is_finite() || record.rating <= 0.0 {
            return Err(RecommenderError::DataValidation {
                source_name: source_name.to_string(),
                line,
                message: format!("rating must be a positive finite number, got {}", record.rating),
            });
        }

        let rating = Rating::new(record.user_id, record.item_id, record.rating);
        match positions.get(&(rating.user_id, rating.item_id)) {
            Some(&existing) => {
                ratings[existing] = rating;
                duplicates += 1;
            }
            None => {
                positions.insert((rating.user_id, rating.item_id), ratings.len());
                ratings.push(rating);
            }
        }
    }

    if duplicates > 0 {
        warn!(
            source = source_name,
            duplicates, "Duplicate (user, item) ratings found, keeping the last occurrence"
        );
    }

    Ok(ratings)
}

/// Load and validate an item metadata table
pub fn load_movies<P: AsRef<Path>>(path: P) -> Result<Catalog> {
    let path = path.as_ref();
    let file = open(path)?;
    read_movies(file, &path.display().to_string())
}

/// Parse item metadata from any reader
pub fn read_movies<R: Read>(reader: R, source_name: &str) -> Result<Catalog> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut catalog = Catalog::new();

    for (index, record) in csv_reader.deserialize::<MovieRecord>().enumerate() {
        let record = record.map_err(|e| RecommenderError::DataValidation {
            source_name: source_name.to_string(),
            line: index as u64 + 2,
            message: e.to_string(),
        })?;
        catalog.insert(ItemMetadata::from_raw(
            record.item_id,
            &record.title,
            &record.genres,
        ));
    }

    Ok(catalog)
}

/// Apply the activity caps to a loaded dataset
///
/// Users are ranked by rating count (ties by ascending id) and the top
/// `max_users` kept, plus `include_user` when given. Items are then ranked the
/// same way over the remaining ratings. The catalog is restricted to the kept
/// items only when `max_items` is set.
pub fn apply_filter(dataset: Dataset, filter: &DatasetFilter) -> Dataset {
    let Dataset {
        mut ratings,
        mut catalog,
    } = dataset;

    if let Some(max_users) = filter.max_users {
        let mut keep = most_frequent(ratings.iter().map(|r| r.user_id), max_users);
        if let Some(user) = filter.include_user {
            keep.insert(user);
        }
        ratings.retain(|r| keep.contains(&r.user_id));
        info!(
            users = keep.len(),
            ratings = ratings.len(),
            "Filtered to most active users"
        );
    }

    if let Some(max_items) = filter.max_items {
        let keep = most_frequent(ratings.iter().map(|r| r.item_id), max_items);
        ratings.retain(|r| keep.contains(&r.item_id));
        catalog.retain(|id| keep.contains(&id));
        info!(
            items = keep.len(),
            ratings = ratings.len(),
            "Filtered to most rated items"
        );
    }

    Dataset { ratings, catalog }
}

/// Load both tables and apply the configured caps
#[instrument(skip(config), fields(ratings = %config.ratings_path, movies = %config.movies_path))]
pub fn load_dataset(config: &DataConfig, include_user: Option<UserId>) -> Result<Dataset> {
    let ratings = load_ratings(&config.ratings_path)?;
    let catalog = load_movies(&config.movies_path)?;
    info!(
        ratings = ratings.len(),
        items = catalog.len(),
        "Loaded rating and item tables"
    );

    let dataset = apply_filter(
        Dataset { ratings, catalog },
        &DatasetFilter::from_config(config, include_user),
    );
    info!(
        ratings = dataset.ratings.len(),
        items = dataset.catalog.len(),
        "Final dataset"
    );
    Ok(dataset)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| RecommenderError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn most_frequent(ids: impl Iterator<Item = u32>, limit: usize) -> HashSet<u32> {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for id in ids {
        *counts.entry(id).or_insert(0) += 1;
    }

    let mut ranked: Vec<(u32, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(id, _)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATINGS: &str = "userId,movieId,rating,timestamp\n\
        1,10,4.0,964982703\n\
        1,20,3.5,964981247\n\
        2,10,5.0,964982224\n\
        3,30,2.0,964983815\n\
        1,10,4.5,964982931\n";

    #[test]
    fn test_read_ratings_keeps_last_duplicate() {
        let ratings = read_ratings(RATINGS.as_bytes(), "ratings.csv").unwrap();
        assert_eq!(ratings.len(), 4);

        let first = ratings
            .iter()
            .find(|r| r.user_id == 1 && r.item_id == 10)
            .unwrap();
        assert_eq!(first.value, 4.5);
    }

    #[test]
    fn test_read_ratings_rejects_non_finite() {
        let data = "userId,movieId,rating\n1,10,NaN\n";
        let err = read_ratings(data.as_bytes(), "ratings.csv").unwrap_err();
        match err {
            RecommenderError::DataValidation { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_read_ratings_rejects_missing_column() {
        let data = "userId,rating\n1,4.0\n";
        assert!(read_ratings(data.as_bytes(), "ratings.csv").is_err());
    }

    #[test]
    fn test_read_movies() {
        let data = "movieId,title,genres\n\
            1,Toy Story (1995),Adventure|Animation|Children|Comedy|Fantasy\n\
            2,\"American President, The (1995)\",Comedy|Drama|Romance\n\
            3,Unknown,(no genres listed)\n";
        let catalog = read_movies(data.as_bytes(), "movies.csv").unwrap();
        assert_eq!(catalog.len(), 3);

        let president = catalog.get(2).unwrap();
        assert_eq!(president.title, "American President, The (1995)");
        assert_eq!(president.release_year, Some(1995));
        assert!(president.has_genre("romance"));
        assert!(catalog.get(3).unwrap().genres.is_empty());
    }

    #[test]
    fn test_apply_filter_honours_include_user() {
        let ratings = vec![
            Rating::new(1, 10, 4.0),
            Rating::new(1, 20, 4.0),
            Rating::new(1, 30, 4.0),
            Rating::new(2, 10, 3.0),
            Rating::new(2, 20, 3.0),
            Rating::new(3, 10, 5.0),
        ];
        let filter = DatasetFilter {
            max_users: Some(1),
            max_items: None,
            include_user: Some(3),
        };

        let dataset = apply_filter(
            Dataset {
                ratings,
                catalog: Catalog::new(),
            },
            &filter,
        );

        let users: HashSet<UserId> = dataset.ratings.iter().map(|r| r.user_id).collect();
        assert!(users.contains(&1));
        assert!(users.contains(&3));
        assert!(!users.contains(&2));
    }

    #[test]
    fn test_apply_filter_max_items_restricts_catalog() {
        let ratings = vec![
            Rating::new(1, 10, 4.0),
            Rating::new(2, 10, 4.0),
            Rating::new(1, 20, 4.0),
            Rating::new(3, 30, 4.0),
        ];
        let catalog: Catalog = [10, 20, 30]
            .iter()
            .map(|id| ItemMetadata::from_raw(*id, "Item (2000)", "Drama"))
            .collect();

        let dataset = apply_filter(
            Dataset { ratings, catalog },
            &DatasetFilter {
                max_items: Some(2),
                ..DatasetFilter::default()
            },
        );

        // 10 has two ratings; 20 beats 30 on the id tie-break
        assert!(dataset.catalog.contains(10));
        assert!(dataset.catalog.contains(20));
        assert!(!dataset.catalog.contains(30));
        assert_eq!(dataset.ratings.len(), 3);
    }
}
