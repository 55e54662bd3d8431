//! Integration tests for the collaborative filtering pipeline
//!
//! Exercises similarity, neighbour selection, prediction and recommendation
//! assembly through the public `Recommender` facade.

use anyhow::Result;
use cinerec_core::{Dataset, EngineConfig, ItemId, ItemMetadata, Rating, UserId};
use cinerec_engine::{
    HybridStrategy, HybridWeights, PopularityQuery, PopularitySort, Recommender, ScoringMode,
};
use std::collections::HashSet;

const ITEM_A: ItemId = 1;
const ITEM_B: ItemId = 2;
const ITEM_C: ItemId = 3;
const ITEM_D: ItemId = 4;

fn dataset() -> Dataset {
    let mut ratings = vec![
        // Users 1-3 on items A-C
        Rating::new(1, ITEM_A, 5.0),
        Rating::new(1, ITEM_B, 4.0),
        Rating::new(1, ITEM_C, 3.0),
        Rating::new(2, ITEM_A, 4.0),
        Rating::new(2, ITEM_B, 3.0),
        Rating::new(2, ITEM_C, 2.0),
        Rating::new(3, ITEM_A, 1.0),
        Rating::new(3, ITEM_B, 5.0),
        Rating::new(3, ITEM_C, 1.0),
        // Items user 1 has not seen
        Rating::new(2, ITEM_D, 5.0),
        Rating::new(2, 5, 4.0),
        Rating::new(2, 6, 2.0),
        Rating::new(3, ITEM_D, 2.0),
        Rating::new(3, 7, 5.0),
    ];

    // Users 5-7 only rate items 5-9 and give popularity something to rank
    for user in 5..=7u32 {
        for item in 5..=9u32 {
            ratings.push(Rating::new(user, item, f64::from((user + item) % 5 + 1)));
        }
    }

    let catalog = vec![
        ItemMetadata::from_raw(ITEM_A, "Alpha (1990)", "Action|Drama"),
        ItemMetadata::from_raw(ITEM_B, "Bravo (1991)", "Comedy"),
        ItemMetadata::from_raw(ITEM_C, "Charlie (1992)", "Drama"),
        ItemMetadata::from_raw(ITEM_D, "Delta (1993)", "Action|Thriller"),
        ItemMetadata::from_raw(5, "Echo (1994)", "Drama|Romance"),
        ItemMetadata::from_raw(6, "Foxtrot (1995)", "Comedy|Romance"),
        ItemMetadata::from_raw(7, "Golf (1996)", "Drama"),
        ItemMetadata::from_raw(8, "Hotel (1997)", "Horror"),
        ItemMetadata::from_raw(9, "India (1998)", "Documentary"),
    ]
    .into_iter()
    .collect();

    Dataset { ratings, catalog }
}

fn recommender() -> Result<Recommender> {
    let config = EngineConfig {
        min_common_items: 3,
        ..EngineConfig::default()
    };
    Ok(Recommender::new(dataset(), config)?)
}

fn rated_by(recommender: &Recommender, user_id: UserId) -> HashSet<ItemId> {
    recommender
        .matrix()
        .user_ratings(user_id)
        .map(|ratings| ratings.keys().copied().collect())
        .unwrap_or_default()
}

#[test]
fn test_proportional_ratings_correlate_perfectly() -> Result<()> {
    let recommender = recommender()?;

    let similarity = recommender.similarity(1, 2).expect("defined similarity");
    assert!((similarity - 1.0).abs() < 1e-9);

    // Opposing pattern: the deviations cancel out to exactly zero here
    let opposing = recommender.similarity(1, 3).expect("defined similarity");
    assert!(opposing <= 0.0);

    let neighbors = recommender.orchestrator().neighbors(1, 50, 3)?;
    assert_eq!(neighbors.user_ids(), vec![2]);
    Ok(())
}

#[test]
fn test_similarity_symmetry_and_bounds() -> Result<()> {
    let recommender = recommender()?;
    let users = recommender.matrix().users();

    for &a in &users {
        for &b in &users {
            let forward = recommender.similarity(a, b);
            let backward = recommender.similarity(b, a);
            assert_eq!(forward, backward, "asymmetric similarity for ({a}, {b})");
            if let Some(r) = forward {
                assert!((-1.0..=1.0).contains(&r));
            }
        }
    }
    Ok(())
}

#[test]
fn test_insufficient_overlap_is_undefined() -> Result<()> {
    let recommender = recommender()?;
    // Users 2 and 5 share items 5 and 6 only
    assert!(recommender.similarity(2, 5).is_none());
    // Users 1 and 5 share nothing
    assert!(recommender.similarity(1, 5).is_none());
    Ok(())
}

#[test]
fn test_user_without_ratings_gets_cold_start() -> Result<()> {
    let mut recommender = recommender()?;
    recommender.register_user(4);

    let list = recommender.recommend(&recommender.request(4).with_top_n(5))?;
    assert!(list.is_cold_start);
    assert_eq!(list.len(), 5);

    for item in &list.items {
        let popularity = recommender.popularity().score(item.item_id);
        assert_eq!(Some(item.predicted_rating), popularity);
        assert!(item.contributing_neighbors.is_empty());
    }
    Ok(())
}

#[test]
fn test_rated_items_never_recommended() -> Result<()> {
    let recommender = recommender()?;

    for user_id in recommender.matrix().users() {
        let list = recommender.recommend(&recommender.request(user_id))?;
        let rated = rated_by(&recommender, user_id);
        for item in list.item_ids() {
            assert!(!rated.contains(&item), "user {user_id} got rated item {item}");
        }
    }

    let list = recommender.recommend(&recommender.request(1).with_top_n(10))?;
    assert!(!list.item_ids().contains(&ITEM_A));
    Ok(())
}

#[test]
fn test_recommendations_use_neighbour_ratings() -> Result<()> {
    let recommender = recommender()?;
    let list = recommender.recommend(&recommender.request(1))?;

    assert!(!list.is_cold_start);
    // Only user 2 is a neighbour, so predictions are user 2's ratings
    assert_eq!(list.item_ids(), vec![ITEM_D, 5, 6]);
    assert!((list.items[0].predicted_rating - 5.0).abs() < 1e-9);
    assert_eq!(list.items[0].contributing_neighbors, vec![2]);
    assert_eq!(list.items[0].title, "Delta (1993)");
    assert_eq!(list.items[0].release_year, Some(1993));
    Ok(())
}

#[test]
fn test_recommendation_ordering() -> Result<()> {
    let mut recommender = recommender()?;
    recommender.register_user(4);

    for user_id in [1, 4, 5] {
        let list = recommender.recommend(&recommender.request(user_id))?;
        for pair in list.items.windows(2) {
            let ordered = pair[0].predicted_rating > pair[1].predicted_rating
                || (pair[0].predicted_rating == pair[1].predicted_rating
                    && pair[0].item_id < pair[1].item_id);
            assert!(ordered, "user {user_id}: {:?} before {:?}", pair[0], pair[1]);
        }
    }
    Ok(())
}

#[test]
fn test_genre_filter_narrows_unfiltered_list() -> Result<()> {
    let mut recommender = recommender()?;
    recommender.register_user(4);

    for user_id in [1, 4] {
        let unfiltered = recommender.recommend(&recommender.request(user_id).with_top_n(100))?;
        let filtered = recommender.recommend(
            &recommender
                .request(user_id)
                .with_top_n(100)
                .with_genre(Some("drama")),
        )?;

        let all: HashSet<ItemId> = unfiltered.item_ids().into_iter().collect();
        for item in &filtered.items {
            assert!(item.genres.iter().any(|g| g.eq_ignore_ascii_case("drama")));
            assert!(all.contains(&item.item_id));
        }
    }
    Ok(())
}

#[test]
fn test_unknown_user_and_bad_sizes() -> Result<()> {
    let recommender = recommender()?;

    let err = recommender
        .recommend(&recommender.request(404))
        .expect_err("unknown user");
    assert!(err.is_not_found());

    let err = recommender
        .recommend(&recommender.request(1).with_top_n(0))
        .expect_err("zero top_n");
    assert!(err.is_invalid_configuration());

    let err = recommender
        .orchestrator()
        .neighbors(1, 0, 3)
        .expect_err("zero k");
    assert!(err.is_invalid_configuration());
    Ok(())
}

#[test]
fn test_hybrid_modes_respect_exclusion() -> Result<()> {
    let recommender = recommender()?;
    let rated = rated_by(&recommender, 1);

    for strategy in [
        HybridStrategy::Weighted,
        HybridStrategy::Mixed,
        HybridStrategy::Switching,
    ] {
        let mode = ScoringMode::Hybrid {
            strategy,
            weights: HybridWeights::new(0.7, 0.3)?,
        };
        let list = recommender.recommend(&recommender.request(1).with_mode(mode))?;
        assert!(!list.is_empty(), "{strategy} returned nothing");
        assert!(list.item_ids().iter().all(|item| !rated.contains(item)));
    }
    Ok(())
}

#[test]
fn test_popular_listing() -> Result<()> {
    let recommender = recommender()?;
    let top = recommender.popular(&PopularityQuery {
        genre: Some("Romance".to_string()),
        min_ratings: 2,
        sort_by: PopularitySort::Count,
        limit: 10,
    });

    let ids: Vec<ItemId> = top.iter().map(|p| p.item_id).collect();
    // Same count; item 6 has the higher mean
    assert_eq!(ids, vec![6, 5]);
    assert!(top.iter().all(|p| p.rating_count >= 2));
    Ok(())
}

#[test]
fn test_similarity_cache_is_shared() -> Result<()> {
    let recommender = recommender()?;
    recommender.recommend(&recommender.request(1))?;
    let computed = recommender.cache().len();

    recommender.recommend(&recommender.request(1))?;
    assert_eq!(recommender.cache().len(), computed);
    assert!(recommender.cache().hits() > 0);
    Ok(())
}
