use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use findpapers::config::{default_config_path, load_config, Config, LoggingConfig};
use findpapers::models::{DateMergePolicy, Search, SearchParams};
use findpapers::runner::{run_search, RunOptions, RunReport};
use findpapers::sources::BackendRegistry;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// findpapers - Search several academic databases at once and merge the results
#[derive(Parser, Debug)]
#[command(name = "findpapers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search academic databases and merge the results into one deduplicated list", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the enabled databases
    #[command(alias = "s")]
    Search {
        /// Boolean query, e.g. 'privacy AND "machine learning"'
        query: String,

        /// Only papers published on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<NaiveDate>,

        /// Only papers published on or before this date (YYYY-MM-DD)
        #[arg(long)]
        until: Option<NaiveDate>,

        /// Subject area to restrict the search to (repeatable)
        #[arg(long = "area", short = 'a')]
        areas: Vec<String>,

        /// Maximum number of distinct papers
        #[arg(long, short)]
        limit: Option<usize>,

        /// Maximum number of papers contributed by each database
        #[arg(long)]
        limit_per_database: Option<usize>,

        /// Database to search (repeatable, default: all enabled)
        #[arg(long = "source", short = 's')]
        sources: Vec<String>,

        /// Stop requesting pages after this many seconds
        #[arg(long)]
        time_budget: Option<u64>,

        /// Maximum pages per database
        #[arg(long)]
        max_pages: Option<usize>,

        /// How conflicting publication dates are merged: earliest, latest, first-seen
        #[arg(long)]
        date_policy: Option<DateMergePolicy>,

        /// Search databases one after another
        #[arg(long)]
        sequential: bool,

        /// Skip fetching paper landing pages
        #[arg(long)]
        no_details: bool,

        /// Write the results to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List the available databases
    Sources,

    /// Write a configuration file with the default settings
    InitConfig {
        /// Destination (default: the per-user configuration path)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// What `search` prints
#[derive(Serialize)]
struct SearchOutput<'a> {
    search: &'a Search,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a RunReport>,
    interrupted: bool,
}

fn init_tracing(verbose: u8, quiet: bool, logging: &LoggingConfig) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => logging.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };
    let directive = if level.contains('=') {
        level
    } else {
        format!("findpapers={}", level)
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.is_json() {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(cli.verbose, cli.quiet, &config.logging);

    match cli.command {
        Commands::Search {
            query,
            since,
            until,
            areas,
            limit,
            limit_per_database,
            sources,
            time_budget,
            max_pages,
            date_policy,
            sequential,
            no_details,
            output,
        } => {
            let mut params = SearchParams::new(query)
                .date_merge_policy(date_policy.unwrap_or(config.search.date_merge_policy));
            params.since = since;
            params.until = until;
            params.limit = limit;
            params.limit_per_database = limit_per_database;
            params.areas = areas.into_iter().collect();
            let mut search = Search::new(params)?;

            let registry = BackendRegistry::from_config(&config)?;
            let backends = if sources.is_empty() {
                registry.select_from_config(&config.sources)
            } else {
                for id in &sources {
                    registry.get_required(id)?;
                }
                registry.select(Some(sources.as_slice()), &[])
            };
            if backends.is_empty() {
                bail!("No sources selected, check [sources] in the configuration");
            }

            let mut options = RunOptions::from(&config.search);
            if let Some(secs) = time_budget {
                options.time_budget = Some(Duration::from_secs(secs));
            }
            if let Some(pages) = max_pages {
                options.max_pages = pages;
            }
            options.concurrent &= !sequential;
            options.fetch_details &= !no_details;

            let report = tokio::select! {
                report = run_search(&mut search, &backends, &options) => Some(report),
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("Interrupted, keeping the papers collected so far");
                    None
                }
            };

            let output_json = serde_json::to_string_pretty(&SearchOutput {
                search: &search,
                report: report.as_ref(),
                interrupted: report.is_none(),
            })?;

            match output {
                Some(path) => {
                    std::fs::write(&path, output_json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Saved {} papers to {}", search.len(), path.display());
                }
                None => println!("{}", output_json),
            }
        }

        Commands::Sources => {
            let registry = BackendRegistry::from_config(&config)?;
            let selected: Vec<String> = registry
                .select_from_config(&config.sources)
                .iter()
                .map(|backend| backend.id().to_string())
                .collect();

            for backend in registry.all() {
                let status = if selected.iter().any(|id| id == backend.id()) {
                    "enabled"
                } else {
                    "disabled"
                };
                println!(
                    "{:<8} {:<8} {:<9} {:?}",
                    backend.id(),
                    backend.name(),
                    status,
                    backend.capabilities()
                );
            }
        }

        Commands::InitConfig { path, force } => {
            let path = path
                .or_else(default_config_path)
                .unwrap_or_else(|| PathBuf::from("findpapers.toml"));
            if path.exists() && !force {
                bail!("{} already exists, pass --force to overwrite", path.display());
            }

            let mut template = Config::default();
            template.api_keys.scopus = None;
            template.save(&path)?;
            eprintln!("Wrote {}", path.display());
        }
    }

    Ok(())
}
