use anyhow::{Context, Result};
use cinerec_core::{init_logging, load_dotenv, ConfigLoader, LogConfig, LogFormat};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod report;

#[derive(Parser)]
#[command(name = "cinerec")]
#[command(about = "User-based collaborative filtering recommender for MovieLens-style data", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, env = "CINEREC_RATINGS_PATH", help = "Ratings CSV (userId,movieId,rating)")]
    ratings_path: Option<String>,

    #[arg(long, global = true, env = "CINEREC_MOVIES_PATH", help = "Movies CSV (movieId,title,genres)")]
    movies_path: Option<String>,

    #[arg(long, global = true, help = "Keep only the N most active users")]
    max_users: Option<usize>,

    #[arg(long, global = true, help = "Keep only the N most rated items")]
    max_items: Option<usize>,

    #[arg(long, global = true, help = "Log level (trace, debug, info, warn, error)")]
    log_level: Option<String>,

    #[arg(long, global = true, help = "Log format (pretty, json)")]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run an offline evaluation and save the results")]
    Evaluate(EvaluateArgs),

    #[command(about = "Recommend unseen movies for a user")]
    Recommend(RecommendArgs),

    #[command(about = "List the most popular movies")]
    Popular(PopularArgs),
}

#[derive(Args, Debug, Default)]
pub struct EvaluateArgs {
    #[arg(long, help = "Fraction of each user's ratings held out for testing")]
    pub test_ratio: Option<f64>,

    #[arg(long, help = "Evaluate a seeded sample of N users")]
    pub sample_users: Option<usize>,

    #[arg(long, help = "Recommendation list length")]
    pub top_n: Option<usize>,

    #[arg(long, help = "Users with fewer ratings are excluded")]
    pub min_ratings_per_user: Option<usize>,

    #[arg(long, help = "Co-rated items required for a similarity")]
    pub min_common_items: Option<usize>,

    #[arg(long, help = "Neighbour set size")]
    pub top_k_neighbors: Option<usize>,

    #[arg(long, help = "Minimum held-out rating counted as relevant")]
    pub relevance_threshold: Option<f64>,

    #[arg(long, help = "Seed for splitting and sampling")]
    pub random_seed: Option<u64>,

    #[arg(long, help = "Score every unrated item instead of test items plus popular ones")]
    pub standard_mode: bool,

    #[arg(long, help = "Popular items added to each user's candidates in fast mode")]
    pub fast_supplement: Option<usize>,

    #[arg(long, help = "Skip diversity metrics")]
    pub skip_diversity: bool,

    #[arg(long, default_value = "evaluation_results", help = "Directory for the result files")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct RecommendArgs {
    #[arg(short, long, help = "User id")]
    pub user: u32,

    #[arg(short = 'n', long, help = "Number of recommendations")]
    pub top_n: Option<usize>,

    #[arg(short, long, help = "Only recommend movies of this genre")]
    pub genre: Option<String>,

    #[arg(long, help = "Co-rated items required for a similarity")]
    pub min_common_items: Option<usize>,

    #[arg(long, help = "Neighbour set size")]
    pub top_k_neighbors: Option<usize>,

    #[arg(long, value_name = "STRATEGY", help = "Blend with content scores: weighted, mixed or switching")]
    pub hybrid: Option<String>,

    #[arg(long, default_value = "0.7", help = "Collaborative weight in hybrid mode")]
    pub cf_weight: f64,

    #[arg(long, default_value = "0.3", help = "Content weight in hybrid mode")]
    pub cb_weight: f64,
}

#[derive(Args, Debug)]
pub struct PopularArgs {
    #[arg(short, long, help = "Only list movies of this genre")]
    pub genre: Option<String>,

    #[arg(short = 'n', long, default_value = "10", help = "Number of movies")]
    pub top_n: usize,

    #[arg(long, default_value = "1", help = "Ignore movies with fewer ratings")]
    pub min_ratings: usize,

    #[arg(long, default_value = "score", help = "Sort by score or count")]
    pub sort_by: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    load_dotenv();

    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    if let Some(level) = cli.log_level.clone() {
        log_config.level = level;
    }
    if let Some(format) = &cli.log_format {
        log_config.format = format.parse::<LogFormat>()?;
    }
    log_config.validate()?;
    init_logging(&log_config).context("Failed to initialize logging")?;

    let data = commands::DataOptions {
        ratings_path: cli.ratings_path,
        movies_path: cli.movies_path,
        max_users: cli.max_users,
        max_items: cli.max_items,
    };

    match cli.command {
        Commands::Evaluate(args) => commands::evaluate(&data, &args),
        Commands::Recommend(args) => commands::recommend(&data, &args),
        Commands::Popular(args) => commands::popular(&data, &args),
    }
}
