use crate::{Board, CrawlerError, Storage};
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Crawl state kept in process memory, gone when the run ends.
#[derive(Debug)]
pub struct MemoryStorage<R> {
    queued: Mutex<Vec<String>>,
    running: Mutex<Vec<String>>,
    visited: Mutex<HashSet<String>>,
    warned: Mutex<HashSet<String>>,
    results: Mutex<Vec<(String, R)>>,
}

impl<R> Default for MemoryStorage<R> {
    fn default() -> Self {
        MemoryStorage {
            queued: Mutex::new(vec![]),
            running: Mutex::new(vec![]),
            visited: Mutex::new(HashSet::new()),
            warned: Mutex::new(HashSet::new()),
            results: Mutex::new(vec![]),
        }
    }
}

impl<R: Clone> MemoryStorage<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn results(&self) -> Vec<(String, R)> {
        self.results.lock().await.clone()
    }

    pub async fn warned(&self) -> Vec<String> {
        let mut warned: Vec<String> = self.warned.lock().await.iter().cloned().collect();
        warned.sort();
        warned
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|i| i == item) {
        list.push(item.to_string());
    }
}

#[async_trait::async_trait]
impl<R: Board + Send> Storage for MemoryStorage<R> {
    type Record = R;

    async fn queued_get(&self) -> Result<Vec<String>, CrawlerError> {
        Ok(self.queued.lock().await.clone())
    }

    async fn queued_get_n(&self, n: u32) -> Result<Vec<String>, CrawlerError> {
        Ok(self
            .queued
            .lock()
            .await
            .iter()
            .take(n as usize)
            .cloned()
            .collect())
    }

    async fn queued_insert<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError> {
        push_unique(&mut *self.queued.lock().await, item.as_ref());
        Ok(())
    }

    async fn queued_delete<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError> {
        self.queued.lock().await.retain(|i| i != item.as_ref());
        Ok(())
    }

    async fn queued_is_exists<I: AsRef<str> + Send>(&self, item: I) -> Result<bool, CrawlerError> {
        Ok(self.queued.lock().await.iter().any(|i| i == item.as_ref()))
    }

    async fn running_get(&self) -> Result<Vec<String>, CrawlerError> {
        Ok(self.running.lock().await.clone())
    }

    async fn running_insert<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError> {
        push_unique(&mut *self.running.lock().await, item.as_ref());
        Ok(())
    }

    async fn running_delete<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError> {
        self.running.lock().await.retain(|i| i != item.as_ref());
        Ok(())
    }

    async fn running_is_exists<I: AsRef<str> + Send>(&self, item: I) -> Result<bool, CrawlerError> {
        Ok(self.running.lock().await.iter().any(|i| i == item.as_ref()))
    }

    async fn visited_is_exists<I: AsRef<str> + Send>(&self, item: I) -> Result<bool, CrawlerError> {
        Ok(self.visited.lock().await.contains(item.as_ref()))
    }

    async fn visited_insert<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError> {
        self.visited.lock().await.insert(item.as_ref().to_string());
        Ok(())
    }

    async fn results_count(&self) -> Result<u32, CrawlerError> {
        Ok(self.results.lock().await.len() as u32)
    }

    async fn results_insert<I: AsRef<str> + Send>(
        &self,
        (url, record): (I, Self::Record),
    ) -> Result<(), CrawlerError> {
        self.results
            .lock()
            .await
            .push((url.as_ref().to_string(), record));
        Ok(())
    }

    async fn warned_insert<I: AsRef<str> + Send>(&self, item: I) -> Result<(), CrawlerError> {
        self.warned.lock().await.insert(item.as_ref().to_string());
        Ok(())
    }
}
