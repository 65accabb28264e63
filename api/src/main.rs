use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::MatchedPath;
use chrono::Utc;
use dotenvy::dotenv;
use http::HeaderValue;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use api::application::ports::github_source::GithubSource;
use api::application::use_cases::repositories::sync_repositories::{SyncError, SyncRepositories};
use api::bootstrap::app_context::{AppContext, AppServices};
use api::bootstrap::config::{Config, parse_list};
use api::infrastructure::github::client_reqwest::ReqwestGithubSource;
use api::infrastructure::github::release_cache::CachingGithubSource;
use api::presentation::http::auth::{Capability, issue_token};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
        paths(
            api::presentation::http::repositories::search_repositories,
            api::presentation::http::repositories::live_search,
            api::presentation::http::repositories::sync_repositories,
            api::presentation::http::repositories::clear_cache,
            api::presentation::http::repositories::cache_status,
            api::presentation::http::plugins::install_plugin,
            api::presentation::http::plugins::activate_plugin,
            api::presentation::http::plugins::deactivate_plugin,
            api::presentation::http::plugins::delete_plugin,
            api::presentation::http::health::health,
        ),
        components(schemas(
            api::presentation::http::repositories::RepositoryItem,
            api::presentation::http::repositories::SearchResponse,
            api::presentation::http::repositories::TopicFailure,
            api::presentation::http::repositories::SyncReportBody,
            api::presentation::http::repositories::SyncResponse,
            api::presentation::http::repositories::ClearCacheResponse,
            api::presentation::http::repositories::CacheStatusResponse,
            api::presentation::http::plugins::PluginTargetBody,
            api::presentation::http::responses::ActionResponse,
            api::presentation::http::health::HealthResp,
        )),
        tags(
            (name = "Repositories", description = "Cached GitHub plugin repositories"),
            (name = "Plugins", description = "Install and manage WordPress plugins"),
            (name = "Health", description = "System health checks")
        )
    )]
struct ApiDoc;

/// `api issue-token [sub] [cap,cap,...]` prints a bearer token and exits.
fn issue_token_command(cfg: &Config, args: &[String]) -> anyhow::Result<()> {
    let sub = args.first().map(String::as_str).unwrap_or("admin");
    let caps = match args.get(1) {
        Some(raw) => parse_list(raw)
            .iter()
            .map(|c| {
                Capability::parse(c).ok_or_else(|| anyhow::anyhow!("unknown capability: {c}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?,
        None => Capability::ALL.to_vec(),
    };
    println!("{}", issue_token(cfg, sub, &caps)?);
    Ok(())
}

fn cors_layer(cfg: &Config) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION]);
    match cfg.frontend_url.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => base.allow_origin(origin),
        // FRONTEND_URL is mandatory in production; an unusable value denies all
        _ if cfg.is_production => base.allow_origin(AllowOrigin::exact(
            HeaderValue::from_static("http://invalid"),
        )),
        _ => base.allow_origin(AllowOrigin::mirror_request()),
    }
}

async fn scheduled_sync(ctx: &AppContext) {
    let github = ctx.github();
    let cache = ctx.repository_cache();
    let settings = ctx.cfg.sync_settings();
    let uc = SyncRepositories {
        source: github.as_ref(),
        cache: cache.as_ref(),
        gate: ctx.sync_gate(),
        settings: &settings,
    };
    match uc
        .execute_with_deadline(Utc::now(), ctx.cfg.sync_timeout())
        .await
    {
        Ok(report) => info!(
            persisted = report.persisted,
            qualified = report.qualified,
            failed_writes = report.failed_writes,
            failed_topics = report.failed_topics().count(),
            "scheduled_sync_finished"
        ),
        Err(SyncError::AlreadyRunning) => info!("scheduled_sync_skipped_already_running"),
        Err(e) => error!(error = ?e, "scheduled_sync_failed"),
    }
    let purged = ctx.release_cache().purge_expired().await;
    tracing::debug!(purged, "release_cache_purged");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = ?e, "shutdown_signal_failed");
    }
    info!("shutdown_requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "api=debug,tower_http=info,axum=info".into()),
        )
        .init();

    let cfg = Config::from_env()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("issue-token") {
        return issue_token_command(&cfg, &args[1..]);
    }

    info!(
        api_port = cfg.api_port,
        github_api_base = cfg.github_api_base.as_str(),
        github_token = cfg.github_token.is_some(),
        topics = ?cfg.sync_topics,
        sync_interval_secs = cfg.sync_interval_secs,
        wp_plugin_dir = cfg.wp_plugin_dir.as_str(),
        is_production = cfg.is_production,
        "Starting WordPress GitHub plugin search backend"
    );

    // Database
    let pool = api::infrastructure::db::connect_pool(&cfg.database_url).await?;
    api::infrastructure::db::migrate(&pool).await?;

    let repository_cache = Arc::new(
        api::infrastructure::db::repositories::repository_cache_sqlx::SqlxRepositoryCache::new(
            pool.clone(),
        ),
    );
    let github: Arc<dyn GithubSource> = Arc::new(ReqwestGithubSource::new(cfg.github())?);
    let release_cache = Arc::new(CachingGithubSource::new(github, cfg.release_cache_ttl()));
    let plugin_host = Arc::new(
        api::infrastructure::plugins::wp_plugin_host::WpPluginHost::new(&cfg.wp_plugin_dir)?,
    );
    let plugin_installer = Arc::new(
        api::infrastructure::plugins::filesystem_installer::FilesystemPluginInstaller::new(
            &cfg.wp_plugin_dir,
        )?,
    );
    let plugin_fetcher = Arc::new(
        api::infrastructure::plugins::package_fetcher_reqwest::ReqwestPluginPackageFetcher::new(
            &cfg.github_user_agent,
            cfg.http_timeout(),
            cfg.install_max_bytes,
        )?,
    );

    let services = AppServices::new(
        repository_cache,
        release_cache,
        plugin_host,
        plugin_installer,
        plugin_fetcher,
    );
    let ctx = AppContext::new(cfg.clone(), services);

    let cors = cors_layer(&cfg);

    // Build API router
    let app = Router::new()
        .nest("/api", api::presentation::http::health::routes(ctx.clone()))
        .nest(
            "/api",
            api::presentation::http::repositories::routes(ctx.clone()),
        )
        .nest("/api", api::presentation::http::plugins::routes(ctx.clone()))
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                let matched = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                tracing::info_span!("http", %method, %uri, matched_path = %matched)
            }),
        );

    let api_addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port));
    info!(%api_addr, "HTTP API listening");
    let listener = tokio::net::TcpListener::bind(api_addr).await?;

    let api_handle: JoinHandle<anyhow::Result<()>> = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    });

    // Background repository sync
    let sync_ctx = ctx.clone();
    let sync_handle: JoinHandle<()> = tokio::spawn(async move {
        let interval = sync_ctx.cfg.sync_interval();
        if !sync_ctx.cfg.sync_on_startup {
            sleep(interval).await;
        }
        loop {
            scheduled_sync(&sync_ctx).await;
            sleep(interval).await;
        }
    });

    match api_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(?e, "API server task failed"),
        Err(e) => error!(?e, "API server task panicked"),
    }

    sync_handle.abort();
    if let Err(e) = sync_handle.await {
        if !e.is_cancelled() {
            error!(?e, "Sync task panicked");
        }
    }
    Ok(())
}
