//!
//! src/labels.rs  Andrew Belles  Sept 14th, 2025
//!
//! Label image resolution. A label's image lives on its detail page, one
//! fetch per distinct label, memoized in a cache shared by every worker
//!

use std::{collections::HashMap, sync::{Arc, Mutex}};

use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, warn};
use url::Url;

use crate::config::ChartConfig;
use crate::extract::ChartExtractor;
use crate::fetch::PageFetcher;
use crate::errors::CrawlerError;

/// label -> image url, "" for labels that failed to resolve.
/// The lock is only ever taken for a map read or write
#[derive(Clone, Debug, Default)]
pub struct LabelImageCache {
    inner: Arc<Mutex<HashMap<String, String>>>
}

impl LabelImageCache {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(known: HashMap<String, String>) -> Self {
        Self { inner: Arc::new(Mutex::new(known)) }
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // a panicked writer leaves a plain map behind, still usable
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, label: &str) -> Option<String> {
        self.map().get(label).cloned()
    }

    pub fn insert(&self, label: &str, image: &str) {
        self.map().insert(label.to_string(), image.to_string());
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.map().len()
    }
}

#[derive(Clone)]
pub struct LabelImageResolver {
    pages: Arc<dyn PageFetcher>,
    extractor: Arc<dyn ChartExtractor>,
    cache: LabelImageCache,
    site_base: Url,
    thumb: String,
    full_size: String,
}

impl LabelImageResolver {
    pub fn new(
        pages: Arc<dyn PageFetcher>,
        extractor: Arc<dyn ChartExtractor>,
        cache: LabelImageCache,
        cfg: &ChartConfig
    ) -> Self {
        Self {
            pages,
            extractor,
            cache,
            site_base: cfg.site_base.clone(),
            thumb: cfg.label_thumb.clone(),
            full_size: cfg.full_size.clone(),
        }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &LabelImageCache {
        &self.cache
    }

    /// Cached value if any, else fetch + upgrade; failures resolve to ""
    pub async fn resolve(&self, label: &str, href: &str) -> (String, String) {
        if let Some(hit) = self.cache.get(label) {
            debug!(label = %label, "label.cache.hit");
            return (label.to_string(), hit);
        }

        let image = match self.fetch_image(label, href).await {
            Ok(Some(src)) => src.replace(&self.thumb, &self.full_size),
            Ok(None) => {
                debug!(label = %label, "label.image.missing");
                String::new()
            }
            Err(e) => {
                warn!(label = %label, error = %e, "label.fetch.error");
                String::new()
            }
        };

        self.cache.insert(label, &image);
        (label.to_string(), image)
    }

    async fn fetch_image(&self, label: &str, href: &str) -> Result<Option<String>, CrawlerError> {
        let url = self.site_base.join(href)?;
        let page = self.pages.fetch(url.as_str()).await?;
        Ok(self.extractor.label_image(&page, label))
    }

    /// Resolves every (label, href) with at most `workers` fetches in flight,
    /// returns once all of them are done
    pub async fn resolve_all(
        &self,
        labels: Vec<(String, String)>,
        workers: usize
    ) -> HashMap<String, String> {
        let gate = Arc::new(Semaphore::new(workers.max(1)));
        let mut tasks = JoinSet::new();

        for (label, href) in labels {
            let this = self.clone();
            let gate = gate.clone();
            tasks.spawn(async move {
                let _permit = gate.acquire_owned().await.ok();
                this.resolve(&label, &href).await
            });
        }

        let mut resolved = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((label, image)) => {
                    resolved.insert(label, image);
                }
                Err(e) => {
                    warn!(error = ?e, "label worker failed");
                }
            }
        }
        resolved
    }
}
