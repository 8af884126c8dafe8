use clap::Parser;
use fake_jobs_crawler::fakejobs::{FakeJobsCrawler, JobData};
use fake_jobs_crawler::fetch::DEFAULT_USER_AGENT;
use fake_jobs_crawler::output::{print_results, OutputFormat};
use fake_jobs_crawler::{
    run_scrapper, CrawlOptions, Fetcher, FetcherConfig, MemoryStorage, DEFAULT_START_URL,
};
use std::path::PathBuf;
use tokio::{sync::mpsc, time::Duration};
use tracing::{info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

/// Fetch job listing pages and print every job title with its application link.
#[derive(Debug, Parser)]
#[command(version)]
struct CrawlArgs {
    /// Pages to start from
    #[arg(default_value = DEFAULT_START_URL)]
    urls: Vec<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Keep crawl state and results in this SQLite file, resuming earlier runs
    #[arg(long)]
    db: Option<PathBuf>,

    /// Minimum time between two requests
    #[arg(long, default_value_t = 200)]
    delay_ms: u64,

    /// Extra attempts for timeouts, connection failures and 5xx responses
    #[arg(long, default_value_t = 2)]
    retries: u32,

    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Stop after this many pages, 0 for no limit
    #[arg(long, default_value_t = 10)]
    max_pages: u32,

    #[arg(long, default_value_t = 4)]
    max_in_progress: u32,

    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
}

impl CrawlArgs {
    fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            request_delay: Duration::from_millis(self.delay_ms),
            retries: self.retries,
            ..FetcherConfig::default()
        }
    }

    fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            max_in_progress: self.max_in_progress,
            max_pages: (self.max_pages > 0).then_some(self.max_pages),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info,sqlx=warn".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let args = CrawlArgs::parse();
    let fetcher = Fetcher::new(args.fetcher_config())?;
    let options = args.crawl_options();

    let (tx, rx) = mpsc::channel(16);
    let printer = tokio::spawn(print_results(rx, args.format, std::io::stdout()));

    let stats = match &args.db {
        Some(path) => {
            info!("Using database {}", path.display());
            let storage = JobData::new(path).await?;
            run_scrapper(FakeJobsCrawler, storage, fetcher, options, args.urls, tx).await?
        }
        None => {
            let storage = MemoryStorage::new();
            run_scrapper(FakeJobsCrawler, storage, fetcher, options, args.urls, tx).await?
        }
    };

    let written = printer.await??;
    info!("Printed {} postings", written);
    if stats.failed > 0 {
        warn!("{} pages could not be fetched", stats.failed);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_crawl_the_fake_jobs_board() {
        let args = CrawlArgs::parse_from(["fake-jobs-crawler"]);
        assert_eq!(args.urls, vec![DEFAULT_START_URL.to_string()]);
        assert_eq!(args.format, OutputFormat::Text);
        assert!(args.db.is_none());

        let options = args.crawl_options();
        assert_eq!(options.max_pages, Some(10));
        assert_eq!(args.fetcher_config().request_delay, Duration::from_millis(200));
    }

    #[test]
    fn zero_max_pages_means_unlimited() {
        let args = CrawlArgs::parse_from([
            "fake-jobs-crawler",
            "--max-pages",
            "0",
            "--format",
            "json",
            "https://jobs.example/a",
            "https://jobs.example/b",
        ]);
        assert_eq!(args.crawl_options().max_pages, None);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.urls.len(), 2);
    }

    #[test]
    fn args_are_consistent() {
        use clap::CommandFactory;
        CrawlArgs::command().debug_assert();
    }
}
