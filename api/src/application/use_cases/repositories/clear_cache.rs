use crate::application::ports::repository_cache::RepositoryCache;

pub struct ClearCache<'a, C: RepositoryCache + ?Sized> {
    pub cache: &'a C,
}

impl<'a, C: RepositoryCache + ?Sized> ClearCache<'a, C> {
    pub async fn execute(&self) -> anyhow::Result<u64> {
        let removed = self.cache.clear().await?;
        tracing::info!(removed, "repository_cache_cleared");
        Ok(removed)
    }
}
