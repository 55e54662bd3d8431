//! Typed records for ratings and item metadata

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub type UserId = u32;
pub type ItemId = u32;

/// Genre string MovieLens uses for items without any genre
pub const NO_GENRES_LISTED: &str = "(no genres listed)";

/// A single explicit rating, immutable once loaded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub value: f64,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, value: f64) -> Self {
        Self {
            user_id,
            item_id,
            value,
        }
    }
}

/// Read-only reference data for an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub item_id: ItemId,
    pub title: String,
    pub genres: BTreeSet<String>,
    pub release_year: Option<u16>,
}

impl ItemMetadata {
    /// Build metadata from the raw MovieLens columns
    pub fn from_raw(item_id: ItemId, title: &str, genres: &str) -> Self {
        let title = title.trim();
        Self {
            item_id,
            title: title.to_string(),
            genres: parse_genres(genres),
            release_year: parse_release_year(title),
        }
    }

    /// Case-insensitive membership test against the genre set
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g.eq_ignore_ascii_case(genre))
    }

    /// Genres joined back into the pipe-delimited form
    pub fn genre_string(&self) -> String {
        self.genres.iter().cloned().collect::<Vec<_>>().join("|")
    }
}

/// Split a pipe-delimited genre string into a set
///
/// ```
/// use cinerec_core::models::parse_genres;
///
/// let genres = parse_genres("Adventure|Animation| Children ");
/// assert_eq!(genres.len(), 3);
/// assert!(parse_genres("(no genres listed)").is_empty());
/// ```
pub fn parse_genres(raw: &str) -> BTreeSet<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|g| !g.is_empty() && *g != NO_GENRES_LISTED)
        .map(str::to_string)
        .collect()
}

/// Extract a trailing `(YYYY)` year from a title such as `Heat (1995)`
pub fn parse_release_year(title: &str) -> Option<u16> {
    let title = title.trim_end();
    let inner = title.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    let year = &inner[open + 1..];
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    year.parse().ok()
}

/// Item metadata keyed by id
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: HashMap<ItemId, ItemMetadata>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: ItemMetadata) {
        self.items.insert(item.item_id, item);
    }

    pub fn get(&self, item_id: ItemId) -> Option<&ItemMetadata> {
        self.items.get(&item_id)
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.items.contains_key(&item_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemMetadata> {
        self.items.values()
    }

    /// Genres of an item, empty when the item is unknown
    pub fn genres_of(&self, item_id: ItemId) -> BTreeSet<String> {
        self.items
            .get(&item_id)
            .map(|item| item.genres.clone())
            .unwrap_or_default()
    }

    /// Every genre that appears anywhere in the catalog
    pub fn genre_vocabulary(&self) -> BTreeSet<String> {
        self.items
            .values()
            .flat_map(|item| item.genres.iter().cloned())
            .collect()
    }

    /// Drop every item not accepted by `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(ItemId) -> bool) {
        self.items.retain(|id, _| keep(*id));
    }
}

impl FromIterator<ItemMetadata> for Catalog {
    fn from_iter<T: IntoIterator<Item = ItemMetadata>>(iter: T) -> Self {
        let mut catalog = Catalog::new();
        for item in iter {
            catalog.insert(item);
        }
        catalog
    }
}

/// Ratings plus catalog, fully materialized before any engine call
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub ratings: Vec<Rating>,
    pub catalog: Catalog,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_genres_trims_and_skips_placeholder() {
        let genres = parse_genres("Action| Sci-Fi ||Thriller");
        let expected: Vec<&str> = vec!["Action", "Sci-Fi", "Thriller"];
        assert_eq!(genres.iter().map(String::as_str).collect::<Vec<_>>(), expected);

        assert!(parse_genres(NO_GENRES_LISTED).is_empty());
        assert!(parse_genres("").is_empty());
    }

    #[test]
    fn test_parse_release_year() {
        assert_eq!(parse_release_year("Toy Story (1995)"), Some(1995));
        assert_eq!(parse_release_year("City of Lost Children, The (Cité des enfants perdus, La) (1995) "), Some(1995));
        assert_eq!(parse_release_year("Babylon 5"), None);
        assert_eq!(parse_release_year("Movie (abcd)"), None);
    }

    #[test]
    fn test_has_genre_is_case_insensitive() {
        let item = ItemMetadata::from_raw(1, "Heat (1995)", "Action|Crime|Thriller");
        assert!(item.has_genre("action"));
        assert!(item.has_genre("CRIME"));
        assert!(!item.has_genre("Act"));
        assert_eq!(item.release_year, Some(1995));
        assert_eq!(item.genre_string(), "Action|Crime|Thriller");
    }

    #[test]
    fn test_catalog_genre_vocabulary() {
        let catalog: Catalog = vec![
            ItemMetadata::from_raw(1, "A (2000)", "Action|Drama"),
            ItemMetadata::from_raw(2, "B (2001)", "Drama|Comedy"),
            ItemMetadata::from_raw(3, "C (2002)", NO_GENRES_LISTED),
        ]
        .into_iter()
        .collect();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.genre_vocabulary().len(), 3);
        assert!(catalog.genres_of(3).is_empty());
        assert!(catalog.genres_of(99).is_empty());
    }
}
