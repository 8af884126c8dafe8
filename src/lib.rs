use reqwest::Url;
use scraper::Html;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::{sync::mpsc, task::JoinSet};
use tracing::{debug, error, info, warn};

pub mod fakejobs;
pub mod fetch;
pub mod output;

mod data;
mod error;
mod memory;

pub use data::Table;
pub use error::CrawlerError;
pub use fetch::{Fetcher, FetcherConfig, Page};
pub use memory::MemoryStorage;

pub const DEFAULT_START_URL: &str = "https://realpython.github.io/fake-jobs/";

/// A document extracted from one page.
pub trait Board {
    fn is_empty(&self) -> bool;
}

pub enum CrawlerResult<B: Board> {
    Links(Vec<String>),
    DocumentAndLinks(B, Vec<String>),
}

pub trait Crawler {
    type Document: Board + Clone + Send;

    fn can_be_scrapped(&self, doc: &Html) -> bool;
    fn crawl(&self, doc: &Html, page_url: &Url) -> CrawlerResult<Self::Document>;
    fn extract_links(&self, doc: &Html, page_url: &Url) -> Vec<String>;
}

#[async_trait::async_trait]
pub trait Storage {
    type Record: Board;

    async fn queued_get(&self) -> Result<Vec<String>, CrawlerError>;
    async fn queued_get_n(&self, n: u32) -> Result<Vec<String>, CrawlerError>;
    async fn queued_insert<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError>;
    async fn queued_delete<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError>;
    async fn queued_is_exists<I: AsRef<str> + Send>(&self, item: I) -> Result<bool, CrawlerError>;

    async fn running_get(&self) -> Result<Vec<String>, CrawlerError>;
    async fn running_insert<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError>;
    async fn running_delete<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError>;
    async fn running_is_exists<I: AsRef<str> + Send>(&self, item: I) -> Result<bool, CrawlerError>;

    async fn visited_is_exists<I: AsRef<str> + Send>(&self, item: I) -> Result<bool, CrawlerError>;
    async fn visited_insert<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError>;

    async fn results_count(&self) -> Result<u32, CrawlerError>;
    async fn results_insert<I: AsRef<str> + Send>(
        &self,
        (url, record): (I, Self::Record),
    ) -> Result<(), CrawlerError>;

    async fn warned_insert<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError>;

    async fn merge_queue_and_running(&self) -> Result<(), CrawlerError> {
        let running = self.running_get().await?;
        for i in running {
            self.queued_insert(i.as_str()).await?;
            self.running_delete(i.as_str()).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub max_in_progress: u32,
    /// Stop scheduling new pages once this many were started.
    pub max_pages: Option<u32>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        CrawlOptions {
            max_in_progress: 4,
            max_pages: Some(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extracted<D> {
    pub url: String,
    pub document: D,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages: u64,
    pub extracted: u64,
    pub warned: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    pages: AtomicU64,
    extracted: AtomicU64,
    warned: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CrawlStats {
        CrawlStats {
            pages: self.pages.load(Ordering::Relaxed),
            extracted: self.extracted.load(Ordering::Relaxed),
            warned: self.warned.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Crawls until the queue is empty or the page limit is reached, sending each
/// extracted document on `output`.
///
/// `output` is bounded and sends wait while it is full, so its receiver has to
/// be drained concurrently (e.g. from a spawned task), not after this returns.
pub async fn run_scrapper<C, S>(
    crawler: C,
    storage: S,
    fetcher: Fetcher,
    options: CrawlOptions,
    initial_queue: Vec<String>,
    output: mpsc::Sender<Extracted<C::Document>>,
) -> Result<CrawlStats, CrawlerError>
where
    C: Crawler + Send + Sync + 'static,
    S: Storage<Record = C::Document> + Sync + Send + 'static,
{
    let storage = Arc::new(storage);
    let crawler = Arc::new(crawler);
    let fetcher = Arc::new(fetcher);
    let counters = Arc::new(Counters::default());

    debug!(
        "Total (in progress, queue) before merge to queue: ({}, {})",
        storage.running_get().await?.len(),
        storage.queued_get().await?.len()
    );

    storage.merge_queue_and_running().await?;

    let queue = storage.queued_get().await?;
    if queue.is_empty() {
        for q in &initial_queue {
            storage.queued_insert(q).await?;
        }
    }
    info!("Initial queue length: {}", storage.queued_get().await?.len());
    info!("Results already stored: {}", storage.results_count().await?);

    let max_in_progress = options.max_in_progress.max(1);
    let mut started = 0u32;
    let mut in_flight = JoinSet::new();

    loop {
        let budget_left = options.max_pages.map_or(true, |max| started < max);
        let free = max_in_progress.saturating_sub(in_flight.len() as u32);

        let mut touched = 0;
        if budget_left && free > 0 {
            for url in storage.queued_get_n(free).await? {
                if options.max_pages.map_or(false, |max| started >= max) {
                    break;
                }
                touched += 1;
                if storage.running_is_exists(url.as_str()).await?
                    || storage.visited_is_exists(url.as_str()).await?
                {
                    storage.queued_delete(url.as_str()).await?;
                    continue;
                }

                storage.running_insert(url.as_str()).await?;
                storage.queued_delete(url.as_str()).await?;
                started += 1;

                in_flight.spawn(handle(
                    url,
                    Arc::clone(&crawler),
                    Arc::clone(&storage),
                    Arc::clone(&fetcher),
                    Arc::clone(&counters),
                    output.clone(),
                ));
            }
        }

        if touched > 0 && (in_flight.len() as u32) < max_in_progress {
            continue;
        }
        if in_flight.is_empty() {
            break;
        }

        // Wait for one page to finish before looking at the queue again.
        if let Some(joined) = in_flight.join_next().await {
            joined??;
        }
    }

    if let Some(max) = options.max_pages {
        if started >= max && !storage.queued_get().await?.is_empty() {
            info!("Page limit of {} reached, leaving the rest queued", max);
        }
    }

    let stats = counters.snapshot();
    info!(
        "Crawl finished: {} pages, {} extracted, {} warned, {} failed",
        stats.pages, stats.extracted, stats.warned, stats.failed
    );
    Ok(stats)
}

async fn handle<C, S>(
    url: String,
    crawler: Arc<C>,
    storage: Arc<S>,
    fetcher: Arc<Fetcher>,
    counters: Arc<Counters>,
    output: mpsc::Sender<Extracted<C::Document>>,
) -> Result<(), CrawlerError>
where
    C: Crawler,
    S: Storage<Record = C::Document>,
{
    let url = url.as_str();

    let page = match fetcher.fetch(url).await {
        Ok(page) => page,
        Err(e) => {
            error!("Failed to fetch {}: {}", url, e);
            counters.failed.fetch_add(1, Ordering::Relaxed);
            storage.warned_insert(url).await?;
            storage.running_delete(url).await?;
            return Ok(());
        }
    };
    counters.pages.fetch_add(1, Ordering::Relaxed);

    let result = {
        let doc = Html::parse_document(&page.body);
        crawler.crawl(&doc, &page.url)
    };

    match result {
        CrawlerResult::Links(links) => {
            debug!("Nothing to extract on {}", url);
            storage.visited_insert(url).await?;
            enqueue_links(storage.as_ref(), links).await?;
        }

        CrawlerResult::DocumentAndLinks(doc, links) => {
            if doc.is_empty() {
                warn!("Empty document extracted: {}", url);
                // Not marked visited, a later run may try again
                storage.warned_insert(url).await?;
                counters.warned.fetch_add(1, Ordering::Relaxed);
            } else {
                storage.results_insert((url, doc.clone())).await?;
                storage.visited_insert(url).await?;

                let num = counters.extracted.fetch_add(1, Ordering::Relaxed);
                info!("[{}] Insert Result {}", num + 1, url);

                let extracted = Extracted {
                    url: url.to_string(),
                    document: doc,
                };
                if output.send(extracted).await.is_err() {
                    debug!("Output closed, dropping result of {}", url);
                }

                enqueue_links(storage.as_ref(), links).await?;
            }
        }
    };

    storage.running_delete(url).await?;
    Ok(())
}

async fn enqueue_links<S: Storage>(storage: &S, links: Vec<String>) -> Result<(), CrawlerError> {
    for link in links {
        let link = link.as_str();
        if !storage.visited_is_exists(link).await?
            && !storage.running_is_exists(link).await?
            && !storage.queued_is_exists(link).await?
        {
            debug!("Queue {}", link);
            storage.queued_insert(link).await?;
        }
    }
    Ok(())
}
