use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobstore::{
    load_config, run_search, unique_keywords, ConsolidationStore, FileProvider, FilterSet,
    LoadState, SearchParams, Summary,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jobstore")]
#[command(about = "Consolidate job search results into a single de-duplicated JSON store")]
struct Cli {
    /// Path to the consolidated store (overrides config)
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty store if none exists
    Init,

    /// Record one search and its job results
    Record {
        /// Search keywords
        #[arg(short, long)]
        keywords: String,

        /// Searched location
        #[arg(short, long, default_value = "")]
        location: String,

        /// Number of results requested
        #[arg(long, default_value = "10")]
        limit: u32,

        /// Experience levels (1=Internship .. 6=Executive)
        #[arg(long)]
        experience: Vec<String>,

        /// Job types (F, C, P, T, I, V, O)
        #[arg(long = "job-type")]
        job_type: Vec<String>,

        /// Workplace types (1=On-site, 2=Remote, 3=Hybrid)
        #[arg(long)]
        remote: Vec<String>,

        /// Only jobs posted within this many seconds
        #[arg(long = "time-posted")]
        time_posted: Option<u64>,

        /// Maximum distance in miles
        #[arg(long)]
        distance: Option<u32>,

        /// JSON file with the job payloads returned by the search
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Merge another store file into this one
    Merge {
        /// Store file to merge in (its jobs win on collision)
        secondary: PathBuf,

        /// Delete the secondary file after a successful merge
        #[arg(long)]
        remove_secondary: bool,
    },

    /// Show store statistics
    Stats,

    /// List unique searched keywords
    Keywords,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = cli.store {
        config.store_path = path;
    }
    let store = ConsolidationStore::open(config);

    match cli.command {
        Commands::Init => {
            if store.init()? {
                println!("Store created at {}", store.path().display());
            } else {
                println!("Store already exists at {}", store.path().display());
            }
        }

        Commands::Record {
            keywords,
            location,
            limit,
            experience,
            job_type,
            remote,
            time_posted,
            distance,
            input,
        } => {
            let params = SearchParams::new(keywords, location, limit).with_filters(FilterSet {
                experience,
                job_type,
                remote,
                listed_at: time_posted,
                distance,
            });
            let provider = FileProvider::new(input);
            let outcome = run_search(&provider, &store, &params)
                .with_context(|| format!("Failed to record search '{}'", params.keywords))?;

            match &outcome.load_state {
                LoadState::Created => println!("Created new store at {}", store.path().display()),
                LoadState::Reset => println!("Existing store was corrupt and has been replaced"),
                LoadState::BackedUp(backup) => {
                    println!("Existing store was corrupt; moved to {}", backup.display())
                }
                LoadState::Existing => {}
            }
            println!("  Jobs found:     {}", outcome.jobs_found);
            println!("  Jobs added:     {}", outcome.jobs_added);
            println!("  Duplicates:     {}", outcome.duplicates);
            if outcome.jobs_updated > 0 {
                println!("  Jobs updated:   {}", outcome.jobs_updated);
            }
            println!("  Total searches: {}", outcome.total_searches);
            println!("  Total jobs:     {}", outcome.total_jobs);
        }

        Commands::Merge {
            secondary,
            remove_secondary,
        } => {
            let outcome = store
                .merge_file(&secondary, remove_secondary)
                .with_context(|| format!("Failed to merge {}", secondary.display()))?;

            println!(
                "Before: {} searches / {} jobs (store), {} searches / {} jobs ({})",
                outcome.primary_searches,
                outcome.primary_jobs,
                outcome.secondary_searches,
                outcome.secondary_jobs,
                secondary.display()
            );
            println!("  Total searches:     {}", outcome.total_searches);
            println!("  Total unique jobs:  {}", outcome.total_jobs);
            println!("  Duplicates avoided: {}", outcome.duplicates);
            if outcome.secondary_removed {
                println!("Removed {}", secondary.display());
            }
        }

        Commands::Stats => {
            let doc = store
                .load()
                .with_context(|| format!("Failed to read store: {}", store.path().display()))?;
            let summary = Summary::from_store(&doc);

            println!("Store: {}", store.path().display());
            println!("Created: {}", summary.creation_date);
            println!("Updated: {}", summary.last_updated);
            println!("Version: {}", summary.export_version);
            println!("Searches: {}", summary.total_searches);
            println!("Unique jobs: {}", summary.total_jobs);
            if let Some(avg) = summary.average_jobs_per_search() {
                println!("Jobs per search: {:.1}", avg);
            }
            if let Some(rate) = summary.uniqueness_rate {
                println!(
                    "Uniqueness: {:.1}% ({}/{}), {} duplicates avoided",
                    rate, summary.total_jobs, summary.jobs_found, summary.duplicates_avoided
                );
            }
            print_top("Top companies", &summary.top_companies);
            print_top("Top keywords", &summary.top_keywords);
            print_top("Top locations", &summary.top_locations);
        }

        Commands::Keywords => {
            let doc = store
                .load()
                .with_context(|| format!("Failed to read store: {}", store.path().display()))?;
            for keyword in unique_keywords(&doc) {
                println!("{}", keyword);
            }
        }
    }

    Ok(())
}

fn print_top(title: &str, entries: &[(String, usize)]) {
    if entries.is_empty() {
        return;
    }
    println!("\n{}:", title);
    for (name, count) in entries {
        println!("  {:<40} {:>5}", truncate(name, 38), count);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
