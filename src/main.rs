//! kb-crawler main entry point
//!
//! This is the command-line interface for crawling websites into knowledge bases.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kb_crawler::config::{load_config_with_hash, Config};
use kb_crawler::crawler::{crawl_and_store, crawl_next, recrawl_knowledgebase, IngestReport};
use kb_crawler::storage::{DocumentStore, DocumentType, SqliteStorage};
use kb_crawler::{CrawlRequest, WebCrawler};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// kb-crawler: incremental website ingestion for knowledge bases
///
/// Crawls a website for pages not yet stored in a knowledge base, preferring
/// sitemap URLs by priority and falling back to link discovery, and stores the
/// extracted page text.
#[derive(Parser, Debug)]
#[command(name = "kb-crawler")]
#[command(version)]
#[command(about = "Incremental website crawler for knowledge bases", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a website into a knowledge base
    Crawl {
        /// Root URL of the site
        #[arg(long)]
        url: String,

        /// Knowledge base identifier
        #[arg(long)]
        kb: String,

        /// Maximum number of new pages (defaults to crawler.max-pages)
        #[arg(long)]
        max_pages: Option<usize>,

        /// Depth recorded with the crawl (defaults to crawler.max-depth)
        #[arg(long)]
        max_depth: Option<u32>,
    },

    /// Crawl the next batch of pages from a knowledge base's recorded source
    CrawlNext {
        /// Knowledge base identifier
        #[arg(long)]
        kb: String,

        /// Maximum number of new pages (defaults to crawler.max-pages)
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Refresh every page already stored in a knowledge base
    Recrawl {
        /// Knowledge base identifier
        #[arg(long)]
        kb: String,
    },

    /// List knowledge bases and their crawled pages
    List,

    /// Validate the configuration and show it without crawling
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    // A missing .env file is fine; the key may come from the real environment
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e).with_context(|| format!("loading {}", cli.config.display()));
        }
    };

    match cli.command {
        Command::Check => handle_check(&config),
        Command::List => handle_list(&config),
        Command::Crawl {
            url,
            kb,
            max_pages,
            max_depth,
        } => {
            let mut request = CrawlRequest::new(&url, &kb, &config.crawler);
            if let Some(n) = max_pages {
                request.max_pages = n;
            }
            if let Some(d) = max_depth {
                request.max_depth = d;
            }
            let (crawler, mut storage) = open(config)?;
            let report = crawl_and_store(&crawler, &mut storage, &request)
                .await
                .with_context(|| format!("crawling {} into {}", url, kb))?;
            print_report("Crawled", &kb, &report);
            Ok(())
        }
        Command::CrawlNext { kb, max_pages } => {
            let max_pages = max_pages.unwrap_or(config.crawler.max_pages);
            let (crawler, mut storage) = open(config)?;
            let report = crawl_next(&crawler, &mut storage, &kb, max_pages)
                .await
                .with_context(|| format!("crawling next pages for {}", kb))?;
            print_report("Crawled", &kb, &report);
            Ok(())
        }
        Command::Recrawl { kb } => {
            let (crawler, mut storage) = open(config)?;
            let report = recrawl_knowledgebase(&crawler, &mut storage, &kb)
                .await
                .with_context(|| format!("recrawling {}", kb))?;
            print_report("Recrawled", &kb, &report);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("kb_crawler=info,warn"),
            1 => EnvFilter::new("kb_crawler=debug,info"),
            2 => EnvFilter::new("kb_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open(config: Config) -> Result<(WebCrawler, SqliteStorage)> {
    let storage = SqliteStorage::new(Path::new(&config.storage.database_path))
        .with_context(|| format!("opening database {}", config.storage.database_path))?;
    let crawler = WebCrawler::new(config)?;
    Ok((crawler, storage))
}

fn print_report(verb: &str, kb: &str, report: &IngestReport) {
    println!(
        "✓ {} and stored {} pages in knowledge base {} ({} total)",
        verb,
        report.pages_stored,
        kb,
        report.listing.files.len()
    );
}

/// Handles `check`: validates config and shows what a crawl would use
fn handle_check(config: &Config) -> Result<()> {
    println!("=== kb-crawler Configuration Check ===\n");

    println!("Crawler:");
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Pacing delay: {}ms", config.crawler.pacing_delay_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Max sitemap documents: {}",
        config.crawler.max_sitemap_documents
    );

    println!("\nExtraction service:");
    println!("  Endpoint: {}", config.extraction.endpoint);
    println!(
        "  Budget: {} calls per {}s",
        config.extraction.calls_per_window, config.extraction.window_secs
    );
    let key_source = if std::env::var(&config.extraction.api_key_env).is_ok() {
        format!("${}", config.extraction.api_key_env)
    } else if config.extraction.api_key.is_some() {
        "inline api-key".to_string()
    } else {
        "MISSING".to_string()
    };
    println!("  API key: {}", key_source);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    // Surfaces missing credentials the same way a crawl would
    WebCrawler::new(config.clone())?;

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles `list`: shows every knowledge base and its crawled pages
fn handle_list(config: &Config) -> Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = SqliteStorage::new(Path::new(&config.storage.database_path))
        .context("Failed to open database")?;
    let knowledgebases = storage.list_knowledgebases()?;
    if knowledgebases.is_empty() {
        println!("No knowledge bases found");
        return Ok(());
    }

    for kb in knowledgebases {
        let Some(listing) = storage.get_documents(&kb, DocumentType::Crawled)? else {
            continue;
        };
        println!("{} ({} pages)", kb, listing.files.len());
        if let Some(source) = listing.custom_metadata.get("source_url") {
            println!("  Source: {}", source);
        }
        for file in &listing.files {
            println!(
                "  - {} ({} bytes) {}",
                file.filename,
                file.size,
                file.url.as_deref().unwrap_or("")
            );
        }
    }

    Ok(())
}
