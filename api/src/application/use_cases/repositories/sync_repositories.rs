use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::application::dto::sync::{SyncReport, SyncSettings};
use crate::application::ports::github_source::GithubSource;
use crate::application::ports::repository_cache::RepositoryCache;
use crate::application::services::discovery::discover;
use crate::application::services::release_filter::ReleaseFilter;
use crate::application::services::sync_gate::SyncGate;

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("A repository sync is already running.")]
    AlreadyRunning,
    #[error("Repository sync did not finish within {0:?}.")]
    TimedOut(Duration),
}

pub struct SyncRepositories<'a, S, C>
where
    S: GithubSource + ?Sized,
    C: RepositoryCache + ?Sized,
{
    pub source: &'a S,
    pub cache: &'a C,
    pub gate: &'a SyncGate,
    pub settings: &'a SyncSettings,
}

impl<'a, S, C> SyncRepositories<'a, S, C>
where
    S: GithubSource + ?Sized,
    C: RepositoryCache + ?Sized,
{
    pub async fn execute(&self, now: DateTime<Utc>) -> Result<SyncReport, SyncError> {
        let _permit = self.gate.try_acquire().ok_or(SyncError::AlreadyRunning)?;
        Ok(self.run(now).await)
    }

    /// Same as [`execute`](Self::execute) but abandons the run after
    /// `deadline`. Rows already written stay written.
    pub async fn execute_with_deadline(
        &self,
        now: DateTime<Utc>,
        deadline: Duration,
    ) -> Result<SyncReport, SyncError> {
        let _permit = self.gate.try_acquire().ok_or(SyncError::AlreadyRunning)?;
        tokio::time::timeout(deadline, self.run(now))
            .await
            .map_err(|_| SyncError::TimedOut(deadline))
    }

    async fn run(&self, now: DateTime<Utc>) -> SyncReport {
        let started_at = Utc::now();
        let filter = ReleaseFilter::new(self.settings.lookup_concurrency);
        let pushed_since = ReleaseFilter::window_start(now).date_naive();
        let discovered = discover(
            self.source,
            &filter,
            &self.settings.keyword,
            &self.settings.topics,
            Some(pushed_since),
            self.settings.max_pages,
            now,
        )
        .await;

        let mut persisted = 0;
        let mut failed_writes = 0;
        for record in &discovered.records {
            match self.cache.upsert(record).await {
                Ok(()) => persisted += 1,
                Err(e) => {
                    failed_writes += 1;
                    tracing::error!(
                        error = ?e,
                        repo_id = record.repo_id,
                        slug = record.slug.as_str(),
                        "repository_upsert_failed"
                    );
                }
            }
        }

        let report = SyncReport {
            qualified: discovered.records.len(),
            topics: discovered.topics,
            candidates: discovered.candidates,
            unique: discovered.unique,
            persisted,
            failed_writes,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(
            candidates = report.candidates,
            unique = report.unique,
            qualified = report.qualified,
            persisted = report.persisted,
            failed_writes = report.failed_writes,
            failed_topics = report.failed_topics().count(),
            "repository_sync_finished"
        );
        report
    }
}
