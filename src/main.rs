use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use gadio_feed::config::Config;
use gadio_feed::crawl::{self, PageRange, ResponseCache, RunReport};
use gadio_feed::feed::{render_feed, write_feed, Channel};

#[derive(Parser, Debug)]
#[command(
    name = "gadio-feed",
    about = "Crawl the GADIO radio catalog and write a podcast feed"
)]
struct Args {
    /// First catalog page to visit
    #[arg(long, default_value_t = 1)]
    from: u32,

    /// Last catalog page to visit (inclusive)
    #[arg(long, default_value_t = 2)]
    to: u32,

    /// Delete the response cache before crawling
    #[arg(long)]
    purge: bool,

    /// Configuration file (optional; defaults are used if it is missing)
    #[arg(long, value_name = "FILE", default_value = "gadio-feed.toml")]
    config: PathBuf,

    /// Feed output path, overriding `[output].feed_path`
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write a JSON run report, overriding `[output].report_path`
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            create_parent_dir(path)?;
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file '{}'", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
    }
    Ok(())
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    create_parent_dir(path)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run report '{}'", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_file.as_deref())?;

    let range = PageRange::new(args.from, args.to).context("Wrong page range")?;
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    let channel = Channel::from_config(&config.channel).context("Invalid [channel] section")?;

    if args.purge {
        match &config.crawl.cache_dir {
            Some(dir) => {
                if ResponseCache::purge(dir)
                    .with_context(|| format!("Failed to purge cache '{}'", dir.display()))?
                {
                    tracing::info!(path = %dir.display(), "Purged response cache");
                }
            }
            None => tracing::warn!("--purge given but no cache_dir is configured"),
        }
    }

    let run_start = Utc::now();
    let output = crawl::run(&config.crawl, range, run_start)
        .await
        .context("Crawl failed")?;

    let feed_path = args.output.unwrap_or(config.output.feed_path);
    let xml = render_feed(&channel, &output.episodes, run_start)?;
    write_feed(&feed_path, &xml)?;
    tracing::info!(
        path = %feed_path.display(),
        items = output.episodes.len(),
        "Wrote feed"
    );

    if let Some(report_path) = args.report.or(config.output.report_path) {
        write_report(&report_path, &output.report)?;
        tracing::info!(path = %report_path.display(), "Wrote run report");
    }

    Ok(())
}
