use async_trait::async_trait;

use crate::domain::repositories::repository::RepositoryRecord;

/// Outcome of a cache search. `NeverSynced` means the table holds no rows at
/// all, which callers must tell apart from an empty match list.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheSearch {
    NeverSynced,
    Hits(Vec<RepositoryRecord>),
}

#[async_trait]
pub trait RepositoryCache: Send + Sync {
    /// Insert or fully replace the row with the same `repo_id`.
    async fn upsert(&self, record: &RepositoryRecord) -> anyhow::Result<()>;

    /// Case-insensitive substring match on full name, description and topics.
    async fn search(&self, term: &str) -> anyhow::Result<CacheSearch>;

    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<RepositoryRecord>>;

    async fn count(&self) -> anyhow::Result<i64>;

    /// Removes every row and returns how many were deleted.
    async fn clear(&self) -> anyhow::Result<u64>;
}
