#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("Database error")]
    DatabaseError(#[from] sqlx::error::Error),

    #[error("Request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("{url} responded with {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    #[error("Output error")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error")]
    JsonError(#[from] serde_json::Error),

    #[error("Crawl task failed")]
    TaskError(#[from] tokio::task::JoinError),
}
