//! In-memory port doubles shared by the application tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::application::ports::github_source::{
    GithubSource, RawRepository, ReleaseAsset, ReleaseInfo, SearchQuery,
};
use crate::application::ports::plugin_host::PluginHost;
use crate::application::ports::plugin_installer::{
    InstalledPackage, PluginInstallError, PluginInstaller,
};
use crate::application::ports::plugin_package_fetcher::PluginPackageFetcher;
use crate::application::ports::repository_cache::{CacheSearch, RepositoryCache};
use crate::domain::plugins::installed_plugin::InstalledPluginDescriptor;
use crate::domain::repositories::repository::{RepositoryRecord, derive_slug};

pub fn raw_repo(id: i64, full_name: &str, topics: &[&str]) -> RawRepository {
    RawRepository {
        id,
        full_name: full_name.to_string(),
        html_url: format!("https://github.com/{full_name}"),
        description: Some(format!("{full_name} description")),
        topics: Some(topics.iter().map(|t| t.to_string()).collect()),
        homepage: None,
        pushed_at: None,
    }
}

pub fn release(created_at: DateTime<Utc>, asset: Option<&str>) -> ReleaseInfo {
    ReleaseInfo {
        created_at,
        tag_name: Some("v1.0.0".to_string()),
        assets: asset
            .map(|name| {
                vec![ReleaseAsset {
                    name: name.to_string(),
                    browser_download_url: format!("https://github.com/downloads/{name}"),
                }]
            })
            .unwrap_or_default(),
        zipball_url: Some("https://api.github.com/zipball/v1.0.0".to_string()),
    }
}

pub fn record(repo_id: i64, full_name: &str) -> RepositoryRecord {
    RepositoryRecord {
        repo_id,
        slug: derive_slug(full_name),
        full_name: full_name.to_string(),
        html_url: format!("https://github.com/{full_name}"),
        description: format!("{full_name} description"),
        topics: vec!["wordpress-plugin".to_string()],
        latest_release_date: None,
        homepage: None,
    }
}

pub fn plugin(file: &str, name: &str, active: bool) -> InstalledPluginDescriptor {
    InstalledPluginDescriptor {
        plugin_file: file.to_string(),
        name: name.to_string(),
        active,
    }
}

type PageKey = (String, u32);

#[derive(Default)]
pub struct FakeGithubSource {
    pages: Mutex<HashMap<PageKey, Result<Vec<RawRepository>, String>>>,
    releases: Mutex<HashMap<String, Result<Option<ReleaseInfo>, String>>>,
    pub search_calls: AtomicUsize,
    pub release_calls: AtomicUsize,
}

impl FakeGithubSource {
    pub fn with_page(mut self, topic: &str, page: u32, repos: Vec<RawRepository>) -> Self {
        self.pages
            .get_mut()
            .unwrap()
            .insert((topic.to_string(), page), Ok(repos));
        self
    }

    pub fn with_page_error(mut self, topic: &str, page: u32, message: &str) -> Self {
        self.pages
            .get_mut()
            .unwrap()
            .insert((topic.to_string(), page), Err(message.to_string()));
        self
    }

    pub fn with_release(mut self, html_url: &str, release: Option<ReleaseInfo>) -> Self {
        self.releases
            .get_mut()
            .unwrap()
            .insert(html_url.to_string(), Ok(release));
        self
    }

    pub fn with_release_error(mut self, html_url: &str, message: &str) -> Self {
        self.releases
            .get_mut()
            .unwrap()
            .insert(html_url.to_string(), Err(message.to_string()));
        self
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GithubSource for FakeGithubSource {
    async fn search_page(
        &self,
        query: &SearchQuery,
        page: u32,
    ) -> anyhow::Result<Vec<RawRepository>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let pages = self.pages.lock().unwrap();
        match pages.get(&(query.topic.clone(), page)) {
            Some(Ok(items)) => Ok(items.clone()),
            Some(Err(message)) => Err(anyhow::anyhow!(message.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn latest_release(&self, html_url: &str) -> anyhow::Result<Option<ReleaseInfo>> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        let releases = self.releases.lock().unwrap();
        match releases.get(html_url) {
            Some(Ok(release)) => Ok(release.clone()),
            Some(Err(message)) => Err(anyhow::anyhow!(message.clone())),
            None => Ok(None),
        }
    }
}

/// Mirrors the SQL store: keyed by `repo_id`, unique `slug`.
#[derive(Default)]
pub struct InMemoryRepositoryCache {
    rows: Mutex<BTreeMap<i64, RepositoryRecord>>,
    failing_slugs: Mutex<Vec<String>>,
}

impl InMemoryRepositoryCache {
    pub fn fail_writes_for(&self, slug: &str) {
        self.failing_slugs.lock().unwrap().push(slug.to_string());
    }

    pub fn rows(&self) -> Vec<RepositoryRecord> {
        self.rows.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl RepositoryCache for InMemoryRepositoryCache {
    async fn upsert(&self, record: &RepositoryRecord) -> anyhow::Result<()> {
        if self.failing_slugs.lock().unwrap().contains(&record.slug) {
            anyhow::bail!("simulated write failure for {}", record.slug);
        }
        let mut rows = self.rows.lock().unwrap();
        let slug_taken = rows
            .values()
            .any(|r| r.slug == record.slug && r.repo_id != record.repo_id);
        if slug_taken {
            anyhow::bail!("duplicate slug {}", record.slug);
        }
        rows.insert(record.repo_id, record.clone());
        Ok(())
    }

    async fn search(&self, term: &str) -> anyhow::Result<CacheSearch> {
        let rows = self.rows.lock().unwrap();
        if rows.is_empty() {
            return Ok(CacheSearch::NeverSynced);
        }
        let needle = term.to_lowercase();
        let mut hits: Vec<RepositoryRecord> = rows
            .values()
            .filter(|r| {
                r.full_name.to_lowercase().contains(&needle)
                    || r.description.to_lowercase().contains(&needle)
                    || r.topics_text().to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            b.latest_release_date
                .cmp(&a.latest_release_date)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });
        Ok(CacheSearch::Hits(hits))
    }

    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<RepositoryRecord>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.values().find(|r| r.slug == slug).cloned())
    }

    async fn count(&self) -> anyhow::Result<i64> {
        Ok(self.rows.lock().unwrap().len() as i64)
    }

    async fn clear(&self) -> anyhow::Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let removed = rows.len() as u64;
        rows.clear();
        Ok(removed)
    }
}

#[derive(Default)]
pub struct StaticPluginHost {
    plugins: Mutex<Vec<InstalledPluginDescriptor>>,
    pub stuck_active: bool,
}

impl StaticPluginHost {
    pub fn new(plugins: Vec<InstalledPluginDescriptor>) -> Self {
        Self {
            plugins: Mutex::new(plugins),
            stuck_active: false,
        }
    }

    pub fn plugins(&self) -> Vec<InstalledPluginDescriptor> {
        self.plugins.lock().unwrap().clone()
    }

    fn set_active(&self, plugin_file: &str, active: bool) -> anyhow::Result<()> {
        let mut plugins = self.plugins.lock().unwrap();
        let plugin = plugins
            .iter_mut()
            .find(|p| p.plugin_file == plugin_file)
            .ok_or_else(|| anyhow::anyhow!("unknown plugin {plugin_file}"))?;
        plugin.active = active;
        Ok(())
    }
}

#[async_trait]
impl PluginHost for StaticPluginHost {
    async fn list_installed(&self) -> anyhow::Result<Vec<InstalledPluginDescriptor>> {
        Ok(self.plugins())
    }

    async fn activate(&self, plugin_file: &str) -> anyhow::Result<()> {
        self.set_active(plugin_file, true)
    }

    async fn deactivate(&self, plugin_file: &str) -> anyhow::Result<()> {
        if self.stuck_active {
            return Ok(());
        }
        self.set_active(plugin_file, false)
    }

    async fn is_active(&self, plugin_file: &str) -> anyhow::Result<bool> {
        Ok(self
            .plugins
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.plugin_file == plugin_file && p.active))
    }

    async fn remove(&self, plugin_file: &str) -> anyhow::Result<()> {
        self.plugins
            .lock()
            .unwrap()
            .retain(|p| p.plugin_file != plugin_file);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingFetcher {
    pub requests: Mutex<Vec<(String, Option<String>)>>,
    pub fail: bool,
}

#[async_trait]
impl PluginPackageFetcher for RecordingFetcher {
    async fn fetch(&self, url: &str, token: Option<&str>) -> anyhow::Result<Vec<u8>> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), token.map(str::to_string)));
        if self.fail {
            anyhow::bail!("connection reset");
        }
        Ok(b"PK fake archive".to_vec())
    }
}

#[derive(Default)]
pub struct RecordingInstaller {
    pub installs: Mutex<Vec<String>>,
    pub zipball_prefixes: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl PluginInstaller for RecordingInstaller {
    async fn install(
        &self,
        _archive: &[u8],
        fallback_folder: &str,
        zipball_prefix: Option<&str>,
    ) -> Result<InstalledPackage, PluginInstallError> {
        self.zipball_prefixes
            .lock()
            .unwrap()
            .push(zipball_prefix.map(str::to_string));
        self.installs
            .lock()
            .unwrap()
            .push(fallback_folder.to_string());
        Ok(InstalledPackage {
            folder_name: fallback_folder.to_string(),
        })
    }
}
