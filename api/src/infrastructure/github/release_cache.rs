use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::application::ports::github_source::{
    GithubSource, RawRepository, ReleaseInfo, SearchQuery,
};

struct CachedRelease {
    fetched_at: Instant,
    release: Option<ReleaseInfo>,
}

/// TTL cache in front of release lookups. Search pages pass straight through.
/// Both "has a release" and "has none" are remembered; errors are not.
pub struct CachingGithubSource {
    inner: Arc<dyn GithubSource>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedRelease>>,
}

impl CachingGithubSource {
    pub fn new(inner: Arc<dyn GithubSource>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn cache_key(html_url: &str) -> String {
        format!("{:x}", Sha256::digest(html_url.trim().as_bytes()))
    }

    async fn fresh(&self, key: &str) -> Option<Option<ReleaseInfo>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.release.clone())
        } else {
            None
        }
    }

    /// The wrapped source, for single-record actions that must see the
    /// current release.
    pub fn uncached(&self) -> Arc<dyn GithubSource> {
        self.inner.clone()
    }

    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.fetched_at.elapsed() < self.ttl);
        before - entries.len()
    }
}

#[async_trait]
impl GithubSource for CachingGithubSource {
    async fn search_page(
        &self,
        query: &SearchQuery,
        page: u32,
    ) -> anyhow::Result<Vec<RawRepository>> {
        self.inner.search_page(query, page).await
    }

    async fn latest_release(&self, html_url: &str) -> anyhow::Result<Option<ReleaseInfo>> {
        let key = Self::cache_key(html_url);
        if let Some(hit) = self.fresh(&key).await {
            return Ok(hit);
        }
        let release = self.inner.latest_release(html_url).await?;
        self.entries.write().await.insert(
            key,
            CachedRelease {
                fetched_at: Instant::now(),
                release: release.clone(),
            },
        );
        Ok(release)
    }
}
