use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use crate::application::ports::github_source::{
    GithubSource, RawRepository, ReleaseInfo, SearchQuery,
};
use crate::domain::repositories::repository::parse_github_url;

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub api_base: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub per_page: u32,
    pub request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<RawRepository>,
}

pub struct ReqwestGithubSource {
    client: reqwest::Client,
    cfg: GithubConfig,
}

impl ReqwestGithubSource {
    pub fn new(cfg: GithubConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .default_headers(headers)
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self { client, cfg })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.api_base.trim_end_matches('/'), path)
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let req = self.client.get(url);
        match self.cfg.token.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn check_rate_limit(resp: &Response, url: &str) {
        let status = resp.status();
        if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
            return;
        }
        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        if header("x-ratelimit-remaining").as_deref() == Some("0") {
            tracing::warn!(
                url,
                status = status.as_u16(),
                reset = ?header("x-ratelimit-reset"),
                "github_rate_limited"
            );
        }
    }
}

#[async_trait]
impl GithubSource for ReqwestGithubSource {
    async fn search_page(
        &self,
        query: &SearchQuery,
        page: u32,
    ) -> anyhow::Result<Vec<RawRepository>> {
        let url = self.url("/search/repositories");
        let q = query.to_q();
        let per_page = self.cfg.per_page.to_string();
        let page_param = page.to_string();
        let resp = self
            .get(&url)
            .query(&[
                ("q", q.as_str()),
                ("per_page", per_page.as_str()),
                ("page", page_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("search request failed: {e}"))?;
        Self::check_rate_limit(&resp, &url);
        if !resp.status().is_success() {
            anyhow::bail!("search returned status {}", resp.status());
        }
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("invalid search response: {e}"))?;
        tracing::debug!(q = q.as_str(), page, items = body.items.len(), "github_search_page");
        Ok(body.items)
    }

    async fn latest_release(&self, html_url: &str) -> anyhow::Result<Option<ReleaseInfo>> {
        let (owner, name) = parse_github_url(html_url)
            .ok_or_else(|| anyhow::anyhow!("not a GitHub repository URL: {html_url}"))?;
        let url = self.url(&format!("/repos/{owner}/{name}/releases/latest"));
        let resp = self
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("release request failed: {e}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::check_rate_limit(&resp, &url);
        if !resp.status().is_success() {
            anyhow::bail!("release lookup returned status {}", resp.status());
        }
        let release: ReleaseInfo = resp
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("invalid release response: {e}"))?;
        Ok(Some(release))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    #[derive(Clone, Default)]
    struct Seen {
        requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
    }

    fn header(headers: &AxumHeaders, name: &str) -> String {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    async fn search(
        State(seen): State<Seen>,
        headers: AxumHeaders,
        Query(mut params): Query<HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
        params.insert("authorization".into(), header(&headers, "authorization"));
        params.insert("user-agent".into(), header(&headers, "user-agent"));
        params.insert("accept".into(), header(&headers, "accept"));
        let page = params.get("page").cloned().unwrap_or_default();
        seen.requests.lock().unwrap().push(params);
        if page == "1" {
            Json(json!({
                "total_count": 1,
                "items": [{
                    "id": 42,
                    "full_name": "acme/widget",
                    "html_url": "https://github.com/acme/widget",
                    "description": null,
                    "topics": ["wordpress-plugin"],
                    "homepage": ""
                }]
            }))
        } else {
            Json(json!({ "total_count": 1, "items": [] }))
        }
    }

    async fn release() -> Json<serde_json::Value> {
        Json(json!({
            "tag_name": "v2.0.0",
            "created_at": "2026-09-01T10:00:00Z",
            "zipball_url": "https://api.github.com/repos/acme/widget/zipball/v2.0.0",
            "assets": [{
                "name": "widget.zip",
                "browser_download_url": "https://github.com/acme/widget/releases/download/v2.0.0/widget.zip"
            }]
        }))
    }

    async fn rate_limited() -> impl IntoResponse {
        (
            AxumStatus::FORBIDDEN,
            [("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", "1760000000")],
            "rate limited",
        )
    }

    async fn serve(seen: Seen) -> String {
        let app = Router::new()
            .route("/search/repositories", get(search))
            .route("/repos/acme/widget/releases/latest", get(release))
            .route(
                "/repos/acme/missing/releases/latest",
                get(|| async { AxumStatus::NOT_FOUND }),
            )
            .route("/repos/acme/limited/releases/latest", get(rate_limited))
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(api_base: String, token: Option<&str>) -> ReqwestGithubSource {
        ReqwestGithubSource::new(GithubConfig {
            api_base,
            token: token.map(str::to_string),
            user_agent: "WordPress GitHub Plugin Search".into(),
            per_page: 100,
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn search_sends_query_and_headers() {
        let seen = Seen::default();
        let base = serve(seen.clone()).await;
        let gh = client(base, Some("t0ken"));
        let query = SearchQuery {
            keyword: "seo".into(),
            topic: "wordpress-plugin".into(),
            pushed_since: None,
        };

        let first = gh.search_page(&query, 1).await.unwrap();
        let second = gh.search_page(&query, 2).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, 42);
        assert!(first[0].has_topic("wordpress-plugin"));
        assert!(second.is_empty());

        let requests = seen.requests.lock().unwrap().clone();
        assert_eq!(requests[0]["q"], "seo topic:wordpress-plugin");
        assert_eq!(requests[0]["per_page"], "100");
        assert_eq!(requests[0]["authorization"], "Bearer t0ken");
        assert_eq!(requests[0]["user-agent"], "WordPress GitHub Plugin Search");
        assert_eq!(requests[0]["accept"], "application/vnd.github+json");
        assert_eq!(requests[1]["page"], "2");
    }

    #[tokio::test]
    async fn anonymous_requests_carry_no_authorization() {
        let seen = Seen::default();
        let gh = client(serve(seen.clone()).await, None);
        let query = SearchQuery {
            keyword: String::new(),
            topic: "wordpress".into(),
            pushed_since: None,
        };

        gh.search_page(&query, 1).await.unwrap();

        assert_eq!(seen.requests.lock().unwrap()[0]["authorization"], "");
    }

    #[tokio::test]
    async fn release_lookup_maps_statuses() {
        let gh = client(serve(Seen::default()).await, None);

        let found = gh
            .latest_release("https://github.com/acme/widget")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.tag_name.as_deref(), Some("v2.0.0"));
        assert_eq!(found.asset_folder_hint().as_deref(), Some("widget"));

        assert!(gh
            .latest_release("https://github.com/acme/missing")
            .await
            .unwrap()
            .is_none());
        assert!(gh
            .latest_release("https://github.com/acme/limited")
            .await
            .is_err());
        assert!(gh.latest_release("https://example.com/x").await.is_err());
    }
}
