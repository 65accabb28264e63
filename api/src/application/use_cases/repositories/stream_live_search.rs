use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::application::dto::search::{SearchResult, SearchSettings};
use crate::application::ports::github_source::GithubSource;
use crate::application::ports::plugin_host::PluginHost;
use crate::application::services::dedupe::dedupe_by_repo_id;
use crate::application::services::discovery::collect_candidates;
use crate::application::services::matcher::resolve_installation;
use crate::application::services::release_filter::ReleaseFilter;
use crate::application::use_cases::repositories::search_repositories::SearchError;

const CHANNEL_CAPACITY: usize = 16;

/// Live upstream search that emits each result as soon as it passes the
/// release filter. Owns its ports because the work outlives the request
/// handler; pending page fetches and release lookups are dropped as soon as
/// the receiver goes away.
pub struct StreamLiveSearch {
    pub source: Arc<dyn GithubSource>,
    pub host: Arc<dyn PluginHost>,
    pub settings: SearchSettings,
}

impl StreamLiveSearch {
    pub fn execute(
        self,
        term: &str,
        now: DateTime<Utc>,
    ) -> Result<ReceiverStream<SearchResult>, SearchError> {
        let term = term.trim().to_string();
        if term.is_empty() {
            return Err(SearchError::MissingTerm);
        }
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let work = self.run(&term, now, &tx);
            tokio::select! {
                biased;
                _ = tx.closed() => {
                    tracing::debug!(term = term.as_str(), "live_search_client_gone");
                }
                sent = work => {
                    tracing::debug!(term = term.as_str(), sent, "live_search_finished");
                }
            }
        });
        Ok(ReceiverStream::new(rx))
    }

    /// Returns how many results were delivered.
    async fn run(
        &self,
        term: &str,
        now: DateTime<Utc>,
        tx: &mpsc::Sender<SearchResult>,
    ) -> usize {
        let plugins = match self.host.list_installed().await {
            Ok(plugins) => plugins,
            Err(e) => {
                tracing::warn!(error = ?e, "live_search_plugins_unavailable");
                Vec::new()
            }
        };
        let source = self.source.as_ref();
        let collected = collect_candidates(
            source,
            term,
            &self.settings.topics,
            Some(ReleaseFilter::window_start(now).date_naive()),
            self.settings.live_max_pages,
        )
        .await;
        let unique = dedupe_by_repo_id(collected.repositories);
        let filter = ReleaseFilter::new(self.settings.lookup_concurrency);
        let mut qualified = filter.stream(source, unique, now);
        let mut sent = 0usize;
        while let Some(q) = qualified.next().await {
            let record = q.into_record();
            let found =
                resolve_installation(source, &record.slug, Some(&record.html_url), &plugins).await;
            if tx.send(SearchResult::new(record, found)).await.is_err() {
                break;
            }
            sent += 1;
        }
        sent
    }
}
