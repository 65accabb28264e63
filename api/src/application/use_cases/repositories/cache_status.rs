use crate::application::dto::sync::CacheStatus;
use crate::application::ports::repository_cache::RepositoryCache;
use crate::application::services::sync_gate::SyncGate;

pub struct GetCacheStatus<'a, C: RepositoryCache + ?Sized> {
    pub cache: &'a C,
    pub gate: &'a SyncGate,
}

impl<'a, C: RepositoryCache + ?Sized> GetCacheStatus<'a, C> {
    pub async fn execute(&self) -> anyhow::Result<CacheStatus> {
        Ok(CacheStatus {
            cached: self.cache.count().await?,
            sync_running: self.gate.is_running(),
        })
    }
}
