#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the listing and review crawler.
//!
//! Settings come from an optional TOML file, then command-line flags, then
//! the `LISTING_CRAWL_API_KEY` environment variable for the relay key. When
//! no keyword is configured and stdin is a terminal, the user is prompted
//! for one.
//!
//! Uses `indicatif-log-bridge` (via
//! [`listing_crawl_cli_utils::init_logger`]) so log lines and progress bars
//! never fight for the terminal.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dialoguer::Input;
use listing_crawl_cli_utils::{IndicatifProgress, MultiProgress};
use listing_crawl_crawler::config::{API_KEY_ENV, CrawlConfig};
use listing_crawl_crawler::orchestrator::{Crawler, JobReport};
use listing_crawl_scraper::Browser;
use listing_crawl_scraper::http::HttpBrowser;

#[derive(Parser)]
#[command(name = "listing_crawl", about = "Business listing and review crawler")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Keyword to search for (repeatable; replaces configured keywords)
    #[arg(long = "keyword", global = true)]
    keywords: Vec<String>,
    /// Listing pages per keyword
    #[arg(long, global = true)]
    pages: Option<u32>,
    /// Country code passed to the proxy relay
    #[arg(long, global = true)]
    location: Option<String>,
    /// Pages fetched concurrently
    #[arg(long, global = true)]
    concurrency: Option<usize>,
    /// Retries per page after the first attempt
    #[arg(long, global = true)]
    retries: Option<u32>,
    /// Directory receiving the CSV output
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Crawl listings, then the reviews of every business found (default)
    Crawl,
    /// Crawl reviews only, for businesses in existing summary files
    Reviews,
}

impl Cli {
    fn apply(&self, config: &mut CrawlConfig) {
        if !self.keywords.is_empty() {
            config.keywords.clone_from(&self.keywords);
        }
        if let Some(pages) = self.pages {
            config.pages = pages;
        }
        if let Some(location) = &self.location {
            config.location = Some(location.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency_limit = concurrency;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir.clone_from(output_dir);
        }
    }
}

fn load_config(cli: &Cli) -> Result<CrawlConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => CrawlConfig::load(path)?,
        None => CrawlConfig::default(),
    };
    cli.apply(&mut config);

    if config.api_key.is_none()
        && let Ok(key) = std::env::var(API_KEY_ENV)
        && !key.trim().is_empty()
    {
        config.api_key = Some(key.trim().to_owned());
    }

    if config.keywords.is_empty() && std::io::stdin().is_terminal() {
        let keyword: String = Input::new()
            .with_prompt("Keyword to search for")
            .interact_text()?;
        config.keywords.push(keyword);
    }

    config.validate()?;
    if let Some(country) = config.unrelayed_location() {
        log::warn!("No relay API key configured; location '{country}' is ignored");
    }
    Ok(config)
}

fn print_report(report: &JobReport) {
    println!("'{}' ({}):", report.keyword, report.state);
    println!(
        "  {:<10} {} row(s) -> {}",
        "summaries",
        report.summaries_written,
        report.summary_output.display()
    );
    println!(
        "  {:<10} {} row(s) -> {}",
        "reviews",
        report.reviews_written,
        report.review_dir.display()
    );
    if report.listing_failures + report.detail_failures > 0 {
        println!(
            "  {:<10} {} listing page(s), {} business page(s)",
            "failed", report.listing_failures, report.detail_failures
        );
    }
}

async fn run(
    config: &CrawlConfig,
    command: Commands,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let browser: Arc<dyn Browser> = Arc::new(HttpBrowser::new(&config.browser_options())?);
    let jobs = config.jobs();
    log::info!(
        "Running {} job(s): {}",
        jobs.len(),
        jobs.iter()
            .map(|job| job.keyword.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    for job in &jobs {
        let crawler = Crawler::new(config, Arc::clone(&browser))
            .with_progress(IndicatifProgress::job_bar(multi, &job.keyword));
        match command {
            Commands::Crawl => print_report(&crawler.run_job(job).await),
            Commands::Reviews => match crawler.run_reviews(job).await {
                Ok(report) => print_report(&report),
                Err(e) => log::error!("Failed to crawl reviews for '{}': {e}", job.keyword),
            },
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = listing_crawl_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    run(&config, cli.command.unwrap_or(Commands::Crawl), &multi).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_values() {
        let cli = Cli::parse_from([
            "listing_crawl",
            "reviews",
            "--keyword",
            "online bank",
            "--keyword",
            "crm",
            "--pages",
            "4",
            "--concurrency",
            "2",
            "--output-dir",
            "out",
        ]);
        let mut config = CrawlConfig {
            keywords: vec!["ignored".to_string()],
            retries: 7,
            ..CrawlConfig::default()
        };
        cli.apply(&mut config);

        assert!(matches!(cli.command, Some(Commands::Reviews)));
        assert_eq!(config.keywords, vec!["online bank", "crm"]);
        assert_eq!(config.pages, 4);
        assert_eq!(config.concurrency_limit, 2);
        assert_eq!(config.retries, 7);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.location.as_deref(), Some("us"));
    }

    #[test]
    fn no_flags_keep_config_values() {
        let cli = Cli::parse_from(["listing_crawl"]);
        let mut config = CrawlConfig {
            keywords: vec!["bank".to_string()],
            ..CrawlConfig::default()
        };
        cli.apply(&mut config);

        assert!(cli.command.is_none());
        assert_eq!(config.keywords, vec!["bank"]);
        assert_eq!(config.pages, 1);
    }
}
