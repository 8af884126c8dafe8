use crate::CrawlerError;
use reqwest::{Client, StatusCode, Url};
use tokio::{
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Minimum gap between the start of two requests, across all tasks.
    pub request_delay: Duration,
    pub retries: u32,
    pub retry_backoff: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        FetcherConfig {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            request_delay: Duration::from_millis(200),
            retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
pub struct Page {
    /// Final url, after redirects.
    pub url: Url,
    pub body: String,
}

#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    request_delay: Duration,
    retries: u32,
    retry_backoff: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Result<Fetcher, CrawlerError> {
        let client = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()?;

        Ok(Fetcher {
            client,
            request_delay: config.request_delay,
            retries: config.retries,
            retry_backoff: config.retry_backoff,
            last_request: Mutex::new(None),
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<Page, CrawlerError> {
        let url = Url::parse(url)
            .map_err(|e| CrawlerError::InvalidUrl(format!("{}: {}", url, e)))?;

        let mut backoff = self.retry_backoff;
        let mut attempt = 0;
        loop {
            match self.try_fetch(&url).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt < self.retries && is_retryable(&e) => {
                    attempt += 1;
                    warn!(attempt, ?backoff, "Fetching {} failed ({}), retrying", url, e);
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_fetch(&self, url: &Url) -> Result<Page, CrawlerError> {
        self.wait_turn().await;

        debug!("Visit {}", url);
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlerError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let url = response.url().clone();
        let body = response.text().await?;
        Ok(Page { url, body })
    }

    async fn wait_turn(&self) {
        let mut last_request = self.last_request.lock().await;
        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < self.request_delay {
                tokio::time::sleep(self.request_delay - elapsed).await;
            }
        }
        last_request.replace(Instant::now());
    }
}

fn is_retryable(e: &CrawlerError) -> bool {
    match e {
        CrawlerError::RequestError(e) => e.is_timeout() || e.is_connect(),
        CrawlerError::HttpStatus { status, .. } => {
            status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn quick_config(retries: u32) -> FetcherConfig {
        FetcherConfig {
            request_delay: Duration::ZERO,
            retries,
            retry_backoff: Duration::from_millis(5),
            ..FetcherConfig::default()
        }
    }

    #[tokio::test]
    async fn fetch_returns_body_and_url() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/jobs");
                then.status(200).body("<html>jobs</html>");
            })
            .await;

        let fetcher = Fetcher::new(quick_config(0)).unwrap();
        let page = fetcher.fetch(&server.url("/jobs")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.body, "<html>jobs</html>");
        assert_eq!(page.url.as_str(), server.url("/jobs"));
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/broken");
                then.status(503);
            })
            .await;

        let fetcher = Fetcher::new(quick_config(2)).unwrap();
        let res = fetcher.fetch(&server.url("/broken")).await;

        assert!(matches!(
            res,
            Err(CrawlerError::HttpStatus { status, .. }) if status == StatusCode::SERVICE_UNAVAILABLE
        ));
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn too_many_requests_is_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/busy");
                then.status(429);
            })
            .await;

        let fetcher = Fetcher::new(quick_config(2)).unwrap();
        let res = fetcher.fetch(&server.url("/busy")).await;

        assert!(matches!(
            res,
            Err(CrawlerError::HttpStatus { status, .. }) if status == StatusCode::TOO_MANY_REQUESTS
        ));
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;

        let fetcher = Fetcher::new(quick_config(2)).unwrap();
        assert!(fetcher.fetch(&server.url("/missing")).await.is_err());
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let fetcher = Fetcher::new(quick_config(0)).unwrap();
        assert!(matches!(
            fetcher.fetch("not a url").await,
            Err(CrawlerError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn requests_are_spaced_by_delay() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/");
                then.status(200).body("ok");
            })
            .await;

        let fetcher = Fetcher::new(FetcherConfig {
            request_delay: Duration::from_millis(100),
            ..quick_config(0)
        })
        .unwrap();

        let start = Instant::now();
        fetcher.fetch(&server.url("/")).await.unwrap();
        fetcher.fetch(&server.url("/")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
