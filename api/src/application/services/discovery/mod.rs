use chrono::{DateTime, NaiveDate, Utc};

use crate::application::dto::sync::TopicFetch;
use crate::application::ports::github_source::{GithubSource, RawRepository, SearchQuery};
use crate::application::services::dedupe::dedupe_by_repo_id;
use crate::application::services::release_filter::ReleaseFilter;
use crate::domain::repositories::repository::RepositoryRecord;

/// GitHub search never serves more than 1000 results (10 pages of 100).
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Reported for a topic whose search failed; the cause is only logged.
pub const TOPIC_SEARCH_FAILED: &str = "GitHub search failed for this topic.";

#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub repositories: Vec<RawRepository>,
    pub topics: Vec<TopicFetch>,
}

#[derive(Debug, Clone, Default)]
pub struct Discovered {
    pub records: Vec<RepositoryRecord>,
    pub topics: Vec<TopicFetch>,
    pub candidates: usize,
    pub unique: usize,
}

/// Pages through every topic query until an empty page. A failing page ends
/// that topic only; pages already fetched are kept.
pub async fn collect_candidates<S>(
    source: &S,
    keyword: &str,
    topics: &[String],
    pushed_since: Option<NaiveDate>,
    max_pages: u32,
) -> Collected
where
    S: GithubSource + ?Sized,
{
    let mut collected = Collected::default();
    for topic in topics {
        let query = SearchQuery {
            keyword: keyword.to_string(),
            topic: topic.clone(),
            pushed_since,
        };
        let mut fetch = TopicFetch {
            topic: topic.clone(),
            pages: 0,
            items: 0,
            error: None,
        };
        for page in 1..=max_pages {
            match source.search_page(&query, page).await {
                Ok(items) if items.is_empty() => break,
                Ok(items) => {
                    fetch.pages += 1;
                    fetch.items += items.len();
                    collected.repositories.extend(items);
                }
                Err(e) => {
                    tracing::warn!(
                        error = ?e,
                        topic = topic.as_str(),
                        page,
                        "github_search_page_failed"
                    );
                    fetch.error = Some(TOPIC_SEARCH_FAILED.to_string());
                    break;
                }
            }
            if page == max_pages {
                tracing::debug!(topic = topic.as_str(), max_pages, "search_page_limit_reached");
            }
        }
        tracing::debug!(
            topic = topic.as_str(),
            pages = fetch.pages,
            items = fetch.items,
            "topic_collected"
        );
        collected.topics.push(fetch);
    }
    collected
}

/// Full discovery pipeline: collect, de-duplicate, then filter on releases.
pub async fn discover<S>(
    source: &S,
    filter: &ReleaseFilter,
    keyword: &str,
    topics: &[String],
    pushed_since: Option<NaiveDate>,
    max_pages: u32,
    now: DateTime<Utc>,
) -> Discovered
where
    S: GithubSource + ?Sized,
{
    let collected = collect_candidates(source, keyword, topics, pushed_since, max_pages).await;
    let candidates = collected.repositories.len();
    let unique = dedupe_by_repo_id(collected.repositories);
    let unique_count = unique.len();
    let records = filter
        .filter(source, unique, now)
        .await
        .into_iter()
        .map(|q| q.into_record())
        .collect();
    Discovered {
        records,
        topics: collected.topics,
        candidates,
        unique: unique_count,
    }
}
