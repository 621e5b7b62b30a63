use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use gistscout::{
    EncodingMode, ErrorKind, MatchRecord, MemoryCache, SearchConfig, SearchOptions,
    SearchOrchestrator, SearchOutcome, SearchStats,
};
use serde::Serialize;
use std::{num::NonZeroUsize, path::PathBuf, process::ExitCode, sync::Arc};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
struct CliSearchConfig {
    /// Account whose public gists are searched
    #[arg(short = 'u', long = "user")]
    username: String,

    /// Regular expression to search for
    #[arg(short = 'p', long)]
    pattern: String,

    /// Configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of simultaneous content fetches
    #[arg(short = 'j', long)]
    concurrency: Option<NonZeroUsize>,

    /// Declared size in bytes at or above which files are streamed
    #[arg(long)]
    streaming_threshold: Option<u64>,

    /// Stop after listing this many pages
    #[arg(long)]
    max_pages: Option<u32>,

    /// Give up on the whole search after this long (e.g. 30s, 2m)
    #[arg(long)]
    deadline: Option<humantime::Duration>,

    /// How to handle invalid UTF-8 sequences (failfast|lossy)
    #[arg(long)]
    encoding: Option<String>,

    /// Cache fetched file bodies in memory
    #[arg(long)]
    cache: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    /// Print search statistics to stderr
    #[arg(short, long)]
    stats: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a user's gists for a pattern
    Search(Box<CliSearchConfig>),
}

#[derive(Serialize)]
struct JsonError<'a> {
    kind: ErrorKind,
    message: &'a str,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum JsonResponse<'a> {
    Success {
        username: &'a str,
        pattern: &'a str,
        matches: &'a [MatchRecord],
    },
    Failed {
        username: &'a str,
        pattern: &'a str,
        error: JsonError<'a>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Search(args) => {
            let config = build_config(&args)?;
            init_tracing(&config.log_level);
            debug!("Using configuration: {:?}", config);

            let mut orchestrator = SearchOrchestrator::github(config.clone())?;
            if args.cache || config.cache.enabled {
                orchestrator =
                    orchestrator.with_cache(Arc::new(MemoryCache::from_config(&config.cache)));
            }

            let options = SearchOptions {
                concurrency_limit: args.concurrency,
                streaming_threshold_bytes: args.streaming_threshold,
            };
            let outcome = orchestrator
                .search_with_options(&args.username, &args.pattern, options)
                .await;

            if args.json {
                print_json(args.username.trim(), &args.pattern, &outcome)?;
            } else {
                print_outcome(&outcome);
            }
            if args.stats {
                print_stats(&orchestrator.metrics().get_stats());
            }

            Ok(if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn build_config(args: &CliSearchConfig) -> anyhow::Result<SearchConfig> {
    let mut config = SearchConfig::load_from(args.config.as_deref())
        .context("failed to load configuration")?;

    if let Some(max_pages) = args.max_pages {
        config.max_pages = Some(max_pages);
    }
    if let Some(deadline) = args.deadline {
        config.deadline = Some(deadline.into());
    }
    if let Some(encoding) = &args.encoding {
        config.encoding_mode = match encoding.to_lowercase().as_str() {
            "failfast" => EncodingMode::FailFast,
            "lossy" => EncodingMode::Lossy,
            other => anyhow::bail!("unknown encoding mode {other:?} (expected failfast or lossy)"),
        };
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_outcome(outcome: &SearchOutcome) {
    match outcome {
        SearchOutcome::Success { matches } => {
            for m in matches {
                println!(
                    "{} {} {}",
                    m.snippet_url.blue(),
                    m.filename.green(),
                    m.raw_location
                );
            }
            println!("\nFound {} matching gists", matches.len());
        }
        SearchOutcome::Failure { kind, message } => {
            eprintln!("{} {} ({})", "error:".red().bold(), message, kind);
        }
    }
}

fn print_json(username: &str, pattern: &str, outcome: &SearchOutcome) -> anyhow::Result<()> {
    let response = match outcome {
        SearchOutcome::Success { matches } => JsonResponse::Success {
            username,
            pattern,
            matches,
        },
        SearchOutcome::Failure { kind, message } => JsonResponse::Failed {
            username,
            pattern,
            error: JsonError {
                kind: *kind,
                message,
            },
        },
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn print_stats(stats: &SearchStats) {
    eprintln!(
        "Pages listed: {}, gists evaluated: {}",
        stats.pages_listed, stats.snippets_evaluated
    );
    eprintln!(
        "Fetches: {} whole, {} streamed, {} bytes read",
        stats.whole_body_fetches, stats.streamed_fetches, stats.bytes_read
    );
    eprintln!(
        "Soft failures: {}, files skipped: {}, cache hits/misses: {}/{}, peak in flight: {}",
        stats.soft_failures,
        stats.files_skipped,
        stats.cache_hits,
        stats.cache_misses,
        stats.peak_in_flight
    );
}
