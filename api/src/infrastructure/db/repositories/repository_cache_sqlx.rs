use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::application::ports::repository_cache::{CacheSearch, RepositoryCache};
use crate::domain::repositories::repository::RepositoryRecord;
use crate::infrastructure::db::PgPool;

pub struct SqlxRepositoryCache {
    pub pool: PgPool,
}

impl SqlxRepositoryCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escapes `ILIKE` wildcards so the term matches literally.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn row_to_record(row: &PgRow) -> RepositoryRecord {
    let topics: String = row.get("topics");
    RepositoryRecord {
        repo_id: row.get("repo_id"),
        slug: row.get("slug"),
        full_name: row.get("full_name"),
        html_url: row.get("html_url"),
        description: row.get("description"),
        topics: RepositoryRecord::parse_topics(&topics),
        latest_release_date: row.get("latest_release_date"),
        homepage: row.get("homepage"),
    }
}

#[async_trait]
impl RepositoryCache for SqlxRepositoryCache {
    async fn upsert(&self, record: &RepositoryRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO github_repositories
               (repo_id, slug, full_name, html_url, description, topics, latest_release_date, homepage)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               ON CONFLICT (repo_id)
               DO UPDATE SET
                 slug = EXCLUDED.slug,
                 full_name = EXCLUDED.full_name,
                 html_url = EXCLUDED.html_url,
                 description = EXCLUDED.description,
                 topics = EXCLUDED.topics,
                 latest_release_date = EXCLUDED.latest_release_date,
                 homepage = EXCLUDED.homepage"#,
        )
        .bind(record.repo_id)
        .bind(&record.slug)
        .bind(&record.full_name)
        .bind(&record.html_url)
        .bind(&record.description)
        .bind(record.topics_text())
        .bind(record.latest_release_date)
        .bind(record.homepage.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search(&self, term: &str) -> anyhow::Result<CacheSearch> {
        let populated: bool =
            sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM github_repositories)"#)
                .fetch_one(&self.pool)
                .await?;
        if !populated {
            return Ok(CacheSearch::NeverSynced);
        }

        let pattern = format!("%{}%", escape_like(term.trim()));
        let rows = sqlx::query(
            r#"SELECT repo_id, slug, full_name, html_url, description, topics, latest_release_date, homepage
               FROM github_repositories
               WHERE full_name ILIKE $1 ESCAPE '\'
                  OR description ILIKE $1 ESCAPE '\'
                  OR topics ILIKE $1 ESCAPE '\'
               ORDER BY latest_release_date DESC NULLS LAST, full_name"#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(CacheSearch::Hits(rows.iter().map(row_to_record).collect()))
    }

    async fn find_by_slug(&self, slug: &str) -> anyhow::Result<Option<RepositoryRecord>> {
        let row = sqlx::query(
            r#"SELECT repo_id, slug, full_name, html_url, description, topics, latest_release_date, homepage
               FROM github_repositories
               WHERE slug = $1"#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn count(&self) -> anyhow::Result<i64> {
        let n: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM github_repositories"#)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn clear(&self) -> anyhow::Result<u64> {
        let res = sqlx::query(r#"DELETE FROM github_repositories"#)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("seo"), "seo");
        assert_eq!(escape_like("100%_off"), r"100\%\_off");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
    }
}
