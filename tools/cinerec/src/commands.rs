use crate::report;
use crate::{EvaluateArgs, PopularArgs, RecommendArgs};
use anyhow::{Context, Result};
use cinerec_core::{
    load_dataset, ConfigLoader, DataConfig, EngineConfig, EvaluationConfig, EvaluationMode,
    UserId,
};
use cinerec_engine::{
    EvaluationReport, Evaluator, HybridStrategy, HybridWeights, PopularityQuery, Recommendation,
    Recommender, ScoringMode,
};
use colored::Colorize;
use tracing::info;

/// Dataset flags shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct DataOptions {
    pub ratings_path: Option<String>,
    pub movies_path: Option<String>,
    pub max_users: Option<usize>,
    pub max_items: Option<usize>,
}

impl DataOptions {
    fn data_config(&self) -> Result<DataConfig> {
        let mut config = DataConfig::from_env()?;
        if let Some(path) = &self.ratings_path {
            config.ratings_path = path.clone();
        }
        if let Some(path) = &self.movies_path {
            config.movies_path = path.clone();
        }
        config.max_users = self.max_users.or(config.max_users);
        config.max_items = self.max_items.or(config.max_items);
        config.validate()?;
        Ok(config)
    }
}

pub fn evaluate(data: &DataOptions, args: &EvaluateArgs) -> Result<()> {
    let config = evaluation_config(data, args)?;
    let evaluator = Evaluator::new(config.clone())?;

    let mut data_config = data.data_config()?;
    data_config.max_users = config.max_users;
    data_config.max_items = config.max_items;

    println!("{}", "Running evaluation...".cyan().bold());
    println!(
        "  {} {}  {} {}  {} {}",
        "mode:".white(),
        config.mode,
        "test ratio:".white(),
        config.test_ratio,
        "seed:".white(),
        config.random_seed
    );

    let dataset = load_dataset(&data_config, None)
        .with_context(|| format!("Failed to load dataset from {}", data_config.ratings_path))?;
    let report = evaluator.run(&dataset)?;

    print_summary(&report);

    let saved = report::save_results(&report, &args.output_dir)?;
    println!("\n{}", "Results saved to:".green().bold());
    for (format, path) in saved.entries() {
        println!("  {} {}", format!("{format}:").cyan(), path.display());
    }
    Ok(())
}

/// Defaults < environment < command-line flags
fn evaluation_config(data: &DataOptions, args: &EvaluateArgs) -> Result<EvaluationConfig> {
    let mut config = EvaluationConfig::from_env()?;

    if let Some(ratio) = args.test_ratio {
        config.test_ratio = ratio;
    }
    if let Some(sample) = args.sample_users {
        config.sample_users = Some(sample);
    }
    if let Some(top_n) = args.top_n {
        config.top_n = top_n;
    }
    if let Some(min) = args.min_ratings_per_user {
        config.min_ratings_per_user = min;
    }
    if let Some(min) = args.min_common_items {
        config.min_common_items = min;
    }
    if let Some(k) = args.top_k_neighbors {
        config.top_k_neighbors = k;
    }
    if let Some(threshold) = args.relevance_threshold {
        config.relevance_threshold = threshold;
    }
    if let Some(seed) = args.random_seed {
        config.random_seed = seed;
    }
    if let Some(supplement) = args.fast_supplement {
        config.fast_supplement = supplement;
    }
    if args.standard_mode {
        config.mode = EvaluationMode::Standard;
    }
    if args.skip_diversity {
        config.compute_diversity = false;
    }
    config.max_users = data.max_users.or(config.max_users);
    config.max_items = data.max_items.or(config.max_items);

    config.validate()?;
    Ok(config)
}

fn print_summary(report: &EvaluationReport) {
    let m = &report.metrics;
    let d = &report.dataset;
    let k = m.ranking.k;

    println!("\n{}", "Evaluation complete".green().bold());
    println!(
        "  {} {} evaluated, {} failed, {} excluded",
        "Users:".white(),
        d.evaluated_users,
        d.failed_users,
        d.excluded_users
    );
    println!(
        "  {} MAE {:.4}  RMSE {:.4}  ({} predictions)",
        "Rating:".white(),
        m.rating.mae,
        m.rating.rmse,
        m.rating.count
    );
    println!(
        "  {} P@{k} {:.4}  R@{k} {:.4}  F1@{k} {:.4}  NDCG@{k} {:.4}",
        "Ranking:".white(),
        m.ranking.precision,
        m.ranking.recall,
        m.ranking.f1,
        m.ranking.ndcg
    );
    if let Some(diversity) = &m.diversity {
        println!(
            "  {} intra-list {:.4}  genre coverage {:.4}  unique genres {:.2}",
            "Diversity:".white(),
            diversity.avg_intra_list_diversity,
            diversity.avg_genre_coverage,
            diversity.avg_unique_genres
        );
    }
    println!(
        "  {} catalog {:.4}  cold start rate {:.4}",
        "Coverage:".white(),
        m.catalog_coverage,
        m.cold_start_rate
    );
    println!(
        "  {} {:.2} seconds",
        "Time:".white(),
        report.evaluation_time_seconds
    );
}

pub fn recommend(data: &DataOptions, args: &RecommendArgs) -> Result<()> {
    let mut engine = EngineConfig::from_env()?;
    if let Some(min) = args.min_common_items {
        engine.min_common_items = min;
    }
    if let Some(k) = args.top_k_neighbors {
        engine.top_k_neighbors = k;
    }
    if let Some(top_n) = args.top_n {
        engine.top_n = top_n;
    }

    let mode = match &args.hybrid {
        None => ScoringMode::Collaborative,
        Some(strategy) => ScoringMode::Hybrid {
            strategy: strategy.parse::<HybridStrategy>()?,
            weights: HybridWeights::new(args.cf_weight, args.cb_weight)?,
        },
    };

    let recommender = load_recommender(data, engine, Some(args.user))?;
    let request = recommender
        .request(args.user)
        .with_genre(args.genre.as_deref())
        .with_mode(mode);
    let list = recommender.recommend(&request)?;

    info!(
        user_id = args.user,
        items = list.len(),
        is_cold_start = list.is_cold_start,
        "Recommendations ready"
    );

    println!(
        "\n{} {}",
        "Recommendations for user".cyan().bold(),
        args.user.to_string().white().bold()
    );
    if list.is_cold_start {
        println!(
            "{}",
            "Not enough similar users; showing popular movies instead".yellow()
        );
    }
    if list.is_empty() {
        println!("{}", "No recommendations available.".yellow());
        return Ok(());
    }

    println!();
    for (rank, item) in list.items.iter().enumerate() {
        print_recommendation(rank + 1, item);
    }
    Ok(())
}

fn print_recommendation(rank: usize, item: &Recommendation) {
    let title = if item.title.is_empty() {
        format!("Movie {}", item.item_id)
    } else {
        item.title.clone()
    };
    println!(
        "{:>3}. {} {}",
        rank,
        title.white().bold(),
        format!("({:.2})", item.predicted_rating).green()
    );

    let genres: Vec<&str> = item.genres.iter().map(String::as_str).collect();
    if !genres.is_empty() {
        println!("     {} {}", "Genres:".cyan(), genres.join(", "));
    }
    if !item.contributing_neighbors.is_empty() {
        let neighbors: Vec<String> = item
            .contributing_neighbors
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("     {} {}", "Neighbours:".cyan(), neighbors.join(", "));
    }
}

pub fn popular(data: &DataOptions, args: &PopularArgs) -> Result<()> {
    let engine = EngineConfig::from_env()?;
    let recommender = load_recommender(data, engine, None)?;

    let query = PopularityQuery {
        genre: args.genre.clone().filter(|g| !g.trim().is_empty()),
        min_ratings: args.min_ratings,
        sort_by: args.sort_by.parse()?,
        limit: args.top_n,
    };
    let top = recommender.popular(&query);

    let heading = match &query.genre {
        Some(genre) => format!("Top {} {} movies", args.top_n, genre),
        None => format!("Top {} movies", args.top_n),
    };
    println!("\n{} {}\n", heading.cyan().bold(), format!("(by {})", query.sort_by).white());

    if top.is_empty() {
        println!("{}", "No movies match.".yellow());
        return Ok(());
    }

    for (rank, item) in top.iter().enumerate() {
        let title = recommender
            .catalog()
            .get(item.item_id)
            .map(|meta| meta.title.clone())
            .unwrap_or_else(|| format!("Movie {}", item.item_id));
        println!(
            "{:>3}. {} {} {}",
            rank + 1,
            title.white().bold(),
            format!("(score {:.2}, mean {:.2})", item.score, item.mean_rating).green(),
            format!("{} ratings", item.rating_count).white()
        );
    }
    Ok(())
}

fn load_recommender(
    data: &DataOptions,
    engine: EngineConfig,
    include_user: Option<UserId>,
) -> Result<Recommender> {
    let data_config = data.data_config()?;
    let dataset = load_dataset(&data_config, include_user)
        .with_context(|| format!("Failed to load dataset from {}", data_config.ratings_path))?;
    Ok(Recommender::new(dataset, engine)?)
}
