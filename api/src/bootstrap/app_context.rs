use std::sync::Arc;

use crate::application::ports::github_source::GithubSource;
use crate::application::ports::plugin_host::PluginHost;
use crate::application::ports::plugin_installer::PluginInstaller;
use crate::application::ports::plugin_package_fetcher::PluginPackageFetcher;
use crate::application::ports::repository_cache::RepositoryCache;
use crate::application::services::sync_gate::SyncGate;
use crate::bootstrap::config::Config;
use crate::infrastructure::github::release_cache::CachingGithubSource;

#[derive(Clone)]
pub struct AppContext {
    pub cfg: Config,
    services: Arc<AppServices>,
}

#[derive(Clone)]
pub struct AppServices {
    repository_cache: Arc<dyn RepositoryCache>,
    release_cache: Arc<CachingGithubSource>,
    plugin_host: Arc<dyn PluginHost>,
    plugin_installer: Arc<dyn PluginInstaller>,
    plugin_fetcher: Arc<dyn PluginPackageFetcher>,
    sync_gate: SyncGate,
}

impl AppServices {
    pub fn new(
        repository_cache: Arc<dyn RepositoryCache>,
        release_cache: Arc<CachingGithubSource>,
        plugin_host: Arc<dyn PluginHost>,
        plugin_installer: Arc<dyn PluginInstaller>,
        plugin_fetcher: Arc<dyn PluginPackageFetcher>,
    ) -> Self {
        Self {
            repository_cache,
            release_cache,
            plugin_host,
            plugin_installer,
            plugin_fetcher,
            sync_gate: SyncGate::new(),
        }
    }
}

impl AppContext {
    pub fn new(cfg: Config, services: AppServices) -> Self {
        Self {
            cfg,
            services: Arc::new(services),
        }
    }

    pub fn repository_cache(&self) -> Arc<dyn RepositoryCache> {
        self.services.repository_cache.clone()
    }

    /// GitHub access with release lookups memoized.
    pub fn github(&self) -> Arc<dyn GithubSource> {
        self.services.release_cache.clone()
    }

    /// GitHub access that skips the release cache.
    pub fn github_uncached(&self) -> Arc<dyn GithubSource> {
        self.services.release_cache.uncached()
    }

    pub fn release_cache(&self) -> Arc<CachingGithubSource> {
        self.services.release_cache.clone()
    }

    pub fn plugin_host(&self) -> Arc<dyn PluginHost> {
        self.services.plugin_host.clone()
    }

    pub fn plugin_installer(&self) -> Arc<dyn PluginInstaller> {
        self.services.plugin_installer.clone()
    }

    pub fn plugin_fetcher(&self) -> Arc<dyn PluginPackageFetcher> {
        self.services.plugin_fetcher.clone()
    }

    pub fn sync_gate(&self) -> &SyncGate {
        &self.services.sync_gate
    }
}
