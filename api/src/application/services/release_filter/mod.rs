use chrono::{DateTime, Months, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::application::ports::github_source::{GithubSource, RawRepository};
use crate::domain::repositories::repository::{
    DEFAULT_DESCRIPTION, RepositoryRecord, WORDPRESS_PLUGIN_TOPIC, derive_slug,
};

/// How far back the latest release may be.
pub const RECENCY_WINDOW_MONTHS: u32 = 6;

/// A repository that passed the topic and release checks.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedRepository {
    pub repo: RawRepository,
    pub release_date: DateTime<Utc>,
}

impl QualifiedRepository {
    pub fn into_record(self) -> RepositoryRecord {
        let repo = self.repo;
        let description = repo
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DESCRIPTION)
            .to_string();
        let homepage = repo
            .homepage
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string);
        RepositoryRecord {
            repo_id: repo.id,
            slug: derive_slug(&repo.full_name),
            topics: repo.topics().to_vec(),
            full_name: repo.full_name,
            html_url: repo.html_url,
            description,
            latest_release_date: Some(self.release_date),
            homepage,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReleaseFilter {
    pub lookup_concurrency: usize,
}

impl ReleaseFilter {
    pub fn new(lookup_concurrency: usize) -> Self {
        Self {
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    /// Oldest release date still inside the window. Inclusive.
    pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_months(Months::new(RECENCY_WINDOW_MONTHS))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_recent(release_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        release_date >= Self::window_start(now)
    }

    pub fn has_required_topic(repo: &RawRepository) -> bool {
        repo.has_topic(WORDPRESS_PLUGIN_TOPIC)
    }

    /// Yields qualifying repositories as their release lookups complete.
    /// Repositories without the topic never trigger a lookup.
    pub fn stream<'a, S>(
        &self,
        source: &'a S,
        repos: Vec<RawRepository>,
        now: DateTime<Utc>,
    ) -> BoxStream<'a, QualifiedRepository>
    where
        S: GithubSource + ?Sized,
    {
        let cutoff = Self::window_start(now);
        stream::iter(repos.into_iter().filter(Self::has_required_topic))
            .map(move |repo| async move {
                match source.latest_release(&repo.html_url).await {
                    Ok(Some(release)) if release.created_at >= cutoff => {
                        Some(QualifiedRepository {
                            release_date: release.created_at,
                            repo,
                        })
                    }
                    Ok(Some(release)) => {
                        tracing::debug!(
                            repo = repo.full_name.as_str(),
                            released = %release.created_at,
                            "release_outside_window"
                        );
                        None
                    }
                    Ok(None) => None,
                    Err(e) => {
                        tracing::warn!(
                            error = ?e,
                            repo = repo.full_name.as_str(),
                            "release_lookup_failed"
                        );
                        None
                    }
                }
            })
            .buffer_unordered(self.lookup_concurrency)
            .filter_map(|qualified| async move { qualified })
            .boxed()
    }

    pub async fn filter<S>(
        &self,
        source: &S,
        repos: Vec<RawRepository>,
        now: DateTime<Utc>,
    ) -> Vec<QualifiedRepository>
    where
        S: GithubSource + ?Sized,
    {
        self.stream(source, repos, now).collect().await
    }
}
