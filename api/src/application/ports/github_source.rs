use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// Repository object as returned by the GitHub search API.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RawRepository {
    pub id: i64,
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

impl RawRepository {
    pub fn topics(&self) -> &[String] {
        self.topics.as_deref().unwrap_or(&[])
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics().iter().any(|t| t.eq_ignore_ascii_case(topic))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReleaseInfo {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
    #[serde(default)]
    pub zipball_url: Option<String>,
}

impl ReleaseInfo {
    /// Lowercased file stem of the first asset; WordPress typically extracts
    /// a release ZIP into a folder with that name.
    pub fn asset_folder_hint(&self) -> Option<String> {
        let name = self.assets.first()?.name.trim();
        let stem = match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        };
        if stem.is_empty() {
            None
        } else {
            Some(stem.to_lowercase())
        }
    }

    /// First `.zip` asset, falling back to the source zipball.
    pub fn download_url(&self) -> Option<&str> {
        self.assets
            .iter()
            .find(|a| a.name.to_lowercase().ends_with(".zip"))
            .map(|a| a.browser_download_url.as_str())
            .or(self.zipball_url.as_deref())
    }
}

/// One topic-scoped repository search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: String,
    pub topic: String,
    pub pushed_since: Option<NaiveDate>,
}

impl SearchQuery {
    /// Value of the `q` parameter, e.g. `seo topic:wordpress-plugin pushed:>=2025-01-01`.
    pub fn to_q(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        let keyword = self.keyword.trim();
        if !keyword.is_empty() {
            parts.push(keyword.to_string());
        }
        parts.push(format!("topic:{}", self.topic));
        if let Some(date) = self.pushed_since {
            parts.push(format!("pushed:>={}", date.format("%Y-%m-%d")));
        }
        parts.join(" ")
    }
}

#[async_trait]
pub trait GithubSource: Send + Sync {
    /// One page of search results. An empty page ends pagination.
    async fn search_page(
        &self,
        query: &SearchQuery,
        page: u32,
    ) -> anyhow::Result<Vec<RawRepository>>;

    /// Latest release of `https://github.com/{owner}/{repo}`; `None` when the
    /// repository has no release.
    async fn latest_release(&self, html_url: &str) -> anyhow::Result<Option<ReleaseInfo>>;
}
