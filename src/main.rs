mod aggregator;
mod archiver;
#[cfg(feature = "browser")]
mod browser;
mod config;
mod error;
mod fetcher;
mod models;
mod normalizer;
mod parser;
mod specs;
mod urls;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::aggregator::Scraper;
use crate::config::ScraperConfig;
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::normalizer::ImageNormalizer;
use crate::parser::Selectors;
use crate::specs::ActionSpecFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FetcherKind {
    /// Plain HTTP GET, markup parsed as served
    Plain,
    /// Headless Chromium, markup taken after client-side rendering
    Rendered,
}

/// Scrape one Rokomari product page and print it as JSON.
#[derive(Parser, Debug)]
#[command(name = "rokomari-scraper", version)]
struct Cli {
    /// Product page URL (defaults to the configured default URL)
    url: Option<String>,

    /// How to fetch the page
    #[arg(short, long, value_enum, default_value_t = FetcherKind::Plain)]
    fetcher: FetcherKind,

    /// YAML file overriding selectors, target dimensions, etc.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write the JSON record to FILE
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write the fetched page markup to FILE
    #[arg(long, value_name = "FILE")]
    dump_html: Option<PathBuf>,

    /// Print single-line JSON
    #[arg(long)]
    compact: bool,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = ScraperConfig::load(cli.config.as_deref())?;
    let url = cli.url.clone().unwrap_or_else(|| config.default_url.clone());

    let selectors = Selectors::from_config(&config)?;
    let normalizer = ImageNormalizer::from_config(&config)?;
    let client = fetcher::build_client(&config)?;
    let specs = ActionSpecFetcher::new(client.clone(), &config);
    let page_fetcher = page_fetcher(cli.fetcher, client, &config)?;

    let scraper = Scraper {
        fetcher: page_fetcher.as_ref(),
        specs: &specs,
        selectors: &selectors,
        normalizer: &normalizer,
        dump_html: cli.dump_html.as_deref(),
    };
    let record = scraper.scrape_url(&url)?;

    if let Some(path) = &cli.output {
        archiver::save_to_file(&record, path)?;
        info!("Record written to {}", path.display());
    }
    println!("{}", archiver::to_json(&record, !cli.compact)?);
    Ok(())
}

fn page_fetcher(
    kind: FetcherKind,
    client: reqwest::blocking::Client,
    config: &ScraperConfig,
) -> Result<Box<dyn PageFetcher>> {
    match kind {
        FetcherKind::Plain => Ok(Box::new(HttpFetcher::new(client, config))),
        #[cfg(feature = "browser")]
        FetcherKind::Rendered => Ok(Box::new(browser::RenderedFetcher::new(config))),
        #[cfg(not(feature = "browser"))]
        FetcherKind::Rendered => anyhow::bail!("rendered fetch needs the `browser` feature"),
    }
}

/// Logs go to stderr so stdout stays valid JSON.
fn init_logging(cli: &Cli) {
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
