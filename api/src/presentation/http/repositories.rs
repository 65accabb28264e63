use axum::body::{Body, Bytes};
use axum::response::{IntoResponse, Response};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::application::dto::search::{SearchPage, SearchRequest, SearchResult};
use crate::application::dto::sync::SyncReport;
use crate::application::use_cases::repositories::cache_status::GetCacheStatus;
use crate::application::use_cases::repositories::clear_cache::ClearCache;
use crate::application::use_cases::repositories::search_repositories::{
    SearchError, SearchRepositories,
};
use crate::application::use_cases::repositories::stream_live_search::StreamLiveSearch;
use crate::application::use_cases::repositories::sync_repositories::{
    SyncError, SyncRepositories,
};
use crate::bootstrap::app_context::AppContext;
use crate::presentation::http::auth::{self, Bearer, Capability};
use crate::presentation::http::responses::{ActionResponse, ApiError, api_error, authorize};

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/repositories", delete(clear_cache))
        .route("/repositories/search", get(search_repositories))
        .route("/repositories/search/live", get(live_search))
        .route("/repositories/sync", post(sync_repositories))
        .route("/repositories/status", get(cache_status))
        .with_state(ctx)
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Matched case-insensitively against name, description and topics.
    pub term: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RepositoryItem {
    pub repo_id: i64,
    pub slug: String,
    pub full_name: String,
    pub html_url: String,
    pub description: String,
    pub topics: Vec<String>,
    pub latest_release_date: Option<DateTime<Utc>>,
    pub homepage: Option<String>,
    pub is_installed: bool,
    pub is_active: bool,
    pub plugin_file: Option<String>,
    /// Which matcher rule found the installed copy.
    pub match_tier: Option<&'static str>,
    pub ambiguous: bool,
}

impl From<SearchResult> for RepositoryItem {
    fn from(r: SearchResult) -> Self {
        Self {
            repo_id: r.record.repo_id,
            slug: r.record.slug,
            full_name: r.record.full_name,
            html_url: r.record.html_url,
            description: r.record.description,
            topics: r.record.topics,
            latest_release_date: r.record.latest_release_date,
            homepage: r.record.homepage,
            is_installed: r.is_installed,
            is_active: r.is_active,
            plugin_file: r.plugin_file,
            match_tier: r.match_tier.map(|t| t.as_str()),
            ambiguous: r.ambiguous,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<RepositoryItem>,
    /// `cache` or `live`.
    pub source: &'static str,
    /// `empty_db` or `no_match` when `results` is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

impl From<SearchPage> for SearchResponse {
    fn from(page: SearchPage) -> Self {
        let total_pages = page.total_pages();
        Self {
            source: page.source.as_str(),
            reason: page.reason.map(|r| r.as_str()),
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            total_pages,
            results: page.results.into_iter().map(RepositoryItem::from).collect(),
        }
    }
}

fn search_error(err: SearchError) -> ApiError {
    match err {
        SearchError::MissingTerm => api_error(StatusCode::BAD_REQUEST, err.to_string()),
        SearchError::Cache(_) | SearchError::Host(_) => {
            tracing::error!(error = ?err, "repository_search_failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/repositories/search",
    tag = "Repositories",
    params(SearchParams),
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, body = ActionResponse),
        (status = 403, body = ActionResponse)
    )
)]
pub async fn search_repositories(
    State(ctx): State<AppContext>,
    bearer: Result<Bearer, StatusCode>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    authorize(&ctx.cfg, bearer, Capability::InstallPlugins)?;
    let cache = ctx.repository_cache();
    let host = ctx.plugin_host();
    let github = ctx.github();
    let settings = ctx.cfg.search_settings();
    let uc = SearchRepositories {
        cache: cache.as_ref(),
        host: host.as_ref(),
        source: github.as_ref(),
        settings: &settings,
    };
    let req = SearchRequest {
        term: params.term.unwrap_or_default(),
        page: params.page.unwrap_or(1),
        per_page: params.per_page.unwrap_or(0),
    };
    let page = uc.execute(req, Utc::now()).await.map_err(search_error)?;
    Ok(Json(page.into()))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LiveSearchParams {
    pub term: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/repositories/search/live",
    tag = "Repositories",
    params(LiveSearchParams),
    responses(
        (status = 200, description = "One RepositoryItem JSON object per line", content_type = "application/x-ndjson", body = RepositoryItem),
        (status = 400, body = ActionResponse)
    )
)]
pub async fn live_search(
    State(ctx): State<AppContext>,
    bearer: Result<Bearer, StatusCode>,
    Query(params): Query<LiveSearchParams>,
) -> Result<Response, ApiError> {
    authorize(&ctx.cfg, bearer, Capability::InstallPlugins)?;
    let uc = StreamLiveSearch {
        source: ctx.github(),
        host: ctx.plugin_host(),
        settings: ctx.cfg.search_settings(),
    };
    let results = uc
        .execute(params.term.as_deref().unwrap_or_default(), Utc::now())
        .map_err(search_error)?;
    let lines = results.map(|result| {
        let mut line = serde_json::to_vec(&RepositoryItem::from(result))?;
        line.push(b'\n');
        Ok::<_, serde_json::Error>(Bytes::from(line))
    });
    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response())
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopicFailure {
    pub topic: String,
    pub pages: u32,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncReportBody {
    pub candidates: usize,
    pub unique: usize,
    pub qualified: usize,
    pub persisted: usize,
    pub failed_writes: usize,
    pub failed_topics: Vec<TopicFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl From<&SyncReport> for SyncReportBody {
    fn from(report: &SyncReport) -> Self {
        Self {
            candidates: report.candidates,
            unique: report.unique,
            qualified: report.qualified,
            persisted: report.persisted,
            failed_writes: report.failed_writes,
            failed_topics: report
                .failed_topics()
                .map(|t| TopicFailure {
                    topic: t.topic.clone(),
                    pages: t.pages,
                    error: t.error.clone().unwrap_or_default(),
                })
                .collect(),
            started_at: report.started_at,
            finished_at: report.finished_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SyncReportBody>,
}

#[utoipa::path(
    post,
    path = "/api/repositories/sync",
    tag = "Repositories",
    responses(
        (status = 200, body = SyncResponse),
        (status = 409, body = ActionResponse),
        (status = 504, body = ActionResponse)
    )
)]
pub async fn sync_repositories(
    State(ctx): State<AppContext>,
    bearer: Result<Bearer, StatusCode>,
) -> Result<Json<SyncResponse>, ApiError> {
    let claims = authorize(&ctx.cfg, bearer, Capability::ManageCache)?;
    let github = ctx.github();
    let cache = ctx.repository_cache();
    let settings = ctx.cfg.sync_settings();
    let uc = SyncRepositories {
        source: github.as_ref(),
        cache: cache.as_ref(),
        gate: ctx.sync_gate(),
        settings: &settings,
    };
    tracing::info!(sub = claims.sub.as_str(), "manual_sync_requested");
    match uc
        .execute_with_deadline(Utc::now(), ctx.cfg.sync_timeout())
        .await
    {
        Ok(report) => Ok(Json(SyncResponse {
            success: true,
            message: report.summary(),
            report: Some(SyncReportBody::from(&report)),
        })),
        Err(err) => {
            let status = match err {
                SyncError::AlreadyRunning => StatusCode::CONFLICT,
                SyncError::TimedOut(_) => {
                    tracing::error!(error = ?err, "manual_sync_timed_out");
                    StatusCode::GATEWAY_TIMEOUT
                }
            };
            Err(api_error(status, err.to_string()))
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearCacheResponse {
    pub success: bool,
    pub message: String,
    pub removed: u64,
}

#[utoipa::path(
    delete,
    path = "/api/repositories",
    tag = "Repositories",
    responses((status = 200, body = ClearCacheResponse), (status = 403, body = ActionResponse))
)]
pub async fn clear_cache(
    State(ctx): State<AppContext>,
    bearer: Result<Bearer, StatusCode>,
) -> Result<Json<ClearCacheResponse>, ApiError> {
    authorize(&ctx.cfg, bearer, Capability::ManageCache)?;
    let cache = ctx.repository_cache();
    let uc = ClearCache {
        cache: cache.as_ref(),
    };
    let removed = uc.execute().await.map_err(|e| {
        tracing::error!(error = ?e, "repository_cache_clear_failed");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to clear the repository cache.",
        )
    })?;
    Ok(Json(ClearCacheResponse {
        success: true,
        message: format!("Removed {removed} cached repositories."),
        removed,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CacheStatusResponse {
    pub cached: i64,
    pub sync_running: bool,
}

#[utoipa::path(
    get,
    path = "/api/repositories/status",
    tag = "Repositories",
    responses((status = 200, body = CacheStatusResponse))
)]
pub async fn cache_status(
    State(ctx): State<AppContext>,
    bearer: Result<Bearer, StatusCode>,
) -> Result<Json<CacheStatusResponse>, ApiError> {
    let unauthorized = |status| api_error(status, "Authentication required.");
    auth::validate_bearer(&ctx.cfg, bearer.map_err(unauthorized)?).map_err(unauthorized)?;
    let cache = ctx.repository_cache();
    let uc = GetCacheStatus {
        cache: cache.as_ref(),
        gate: ctx.sync_gate(),
    };
    let status = uc.execute().await.map_err(|e| {
        tracing::error!(error = ?e, "repository_cache_status_failed");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read the repository cache.",
        )
    })?;
    Ok(Json(CacheStatusResponse {
        cached: status.cached,
        sync_running: status.sync_running,
    }))
}
