use chrono::{DateTime, Utc};

use crate::application::dto::search::{
    EmptyReason, ResultSource, SearchPage, SearchRequest, SearchResult, SearchSettings,
};
use crate::application::ports::github_source::GithubSource;
use crate::application::ports::plugin_host::PluginHost;
use crate::application::ports::repository_cache::{CacheSearch, RepositoryCache};
use crate::application::services::discovery::discover;
use crate::application::services::matcher::resolve_installation;
use crate::application::services::release_filter::ReleaseFilter;
use crate::domain::repositories::repository::RepositoryRecord;

pub const DEFAULT_PER_PAGE: usize = 12;
pub const MAX_PER_PAGE: usize = 100;
/// Highest page number whose offset still fits in `usize`.
pub const MAX_PAGE: usize = usize::MAX / MAX_PER_PAGE;

#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    #[error("Missing search term.")]
    MissingTerm,
    #[error("Failed to search the repository cache.")]
    Cache(#[source] anyhow::Error),
    #[error("Failed to read installed plugins.")]
    Host(#[source] anyhow::Error),
}

/// Normalizes paging input: pages start at 1 and stop at [`MAX_PAGE`], page
/// size falls back to [`DEFAULT_PER_PAGE`] and is capped at [`MAX_PER_PAGE`].
pub fn clamp_paging(page: usize, per_page: usize) -> (usize, usize) {
    let per_page = match per_page {
        0 => DEFAULT_PER_PAGE,
        n => n.min(MAX_PER_PAGE),
    };
    (page.clamp(1, MAX_PAGE), per_page)
}

pub struct SearchRepositories<'a, C, H, S>
where
    C: RepositoryCache + ?Sized,
    H: PluginHost + ?Sized,
    S: GithubSource + ?Sized,
{
    pub cache: &'a C,
    pub host: &'a H,
    pub source: &'a S,
    pub settings: &'a SearchSettings,
}

impl<'a, C, H, S> SearchRepositories<'a, C, H, S>
where
    C: RepositoryCache + ?Sized,
    H: PluginHost + ?Sized,
    S: GithubSource + ?Sized,
{
    pub async fn execute(
        &self,
        req: SearchRequest,
        now: DateTime<Utc>,
    ) -> Result<SearchPage, SearchError> {
        let term = req.term.trim();
        if term.is_empty() {
            return Err(SearchError::MissingTerm);
        }
        let (page, per_page) = clamp_paging(req.page, req.per_page);

        let (records, source) = match self.cache.search(term).await.map_err(SearchError::Cache)? {
            CacheSearch::Hits(hits) if hits.is_empty() => {
                return Ok(SearchPage::empty(EmptyReason::NoMatch, page, per_page));
            }
            CacheSearch::Hits(hits) => (hits, ResultSource::Cache),
            CacheSearch::NeverSynced if self.settings.live_fallback => {
                tracing::info!(term, "search_live_fallback");
                (self.live_records(term, now).await, ResultSource::Live)
            }
            CacheSearch::NeverSynced => {
                return Ok(SearchPage::empty(EmptyReason::EmptyDb, page, per_page));
            }
        };
        if records.is_empty() {
            return Ok(SearchPage::empty(EmptyReason::EmptyDb, page, per_page));
        }

        let total = records.len();
        let visible: Vec<RepositoryRecord> = records
            .into_iter()
            .skip(page.saturating_sub(1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        let plugins = self.host.list_installed().await.map_err(SearchError::Host)?;
        let mut results = Vec::with_capacity(visible.len());
        for record in visible {
            let found = resolve_installation(
                self.source,
                &record.slug,
                Some(&record.html_url),
                &plugins,
            )
            .await;
            results.push(SearchResult::new(record, found));
        }

        Ok(SearchPage {
            results,
            source,
            reason: None,
            page,
            per_page,
            total,
        })
    }

    async fn live_records(&self, term: &str, now: DateTime<Utc>) -> Vec<RepositoryRecord> {
        let filter = ReleaseFilter::new(self.settings.lookup_concurrency);
        discover(
            self.source,
            &filter,
            term,
            &self.settings.topics,
            Some(ReleaseFilter::window_start(now).date_naive()),
            self.settings.live_max_pages,
            now,
        )
        .await
        .records
    }
}
