use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::application::ports::plugin_installer::PluginInstallError;
use crate::application::use_cases::plugins::activate::ActivatePlugin;
use crate::application::use_cases::plugins::deactivate::DeactivatePlugin;
use crate::application::use_cases::plugins::delete::DeletePlugin;
use crate::application::use_cases::plugins::install_from_repo::{
    INSTALLED_MESSAGE, InstallFromRepo, InstallFromRepoError,
};
use crate::application::use_cases::plugins::locate::PluginActionError;
use crate::bootstrap::app_context::AppContext;
use crate::presentation::http::auth::{Bearer, Capability};
use crate::presentation::http::responses::{ActionResponse, ApiError, api_error, authorize};

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/plugins/install", post(install_plugin))
        .route("/plugins/activate", post(activate_plugin))
        .route("/plugins/deactivate", post(deactivate_plugin))
        .route("/plugins/delete", post(delete_plugin))
        .with_state(ctx)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PluginTargetBody {
    /// Repository URL (`https://github.com/owner/repo`) or plugin slug.
    #[serde(default)]
    pub slug_or_url: String,
}

fn install_error(err: InstallFromRepoError) -> ApiError {
    let status = match &err {
        InstallFromRepoError::MissingTarget => StatusCode::BAD_REQUEST,
        InstallFromRepoError::UnknownRepository => StatusCode::NOT_FOUND,
        InstallFromRepoError::NoRelease => StatusCode::UNPROCESSABLE_ENTITY,
        InstallFromRepoError::ReleaseLookup(_) | InstallFromRepoError::Download(_) => {
            StatusCode::BAD_GATEWAY
        }
        InstallFromRepoError::Install(
            PluginInstallError::InvalidPackage(_) | PluginInstallError::EmptyPackage,
        ) => StatusCode::UNPROCESSABLE_ENTITY,
        InstallFromRepoError::Cache(_)
        | InstallFromRepoError::Install(PluginInstallError::Storage(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() || status == StatusCode::UNPROCESSABLE_ENTITY {
        tracing::error!(error = ?err, "plugin_install_failed");
    }
    api_error(status, err.to_string())
}

fn action_error(err: PluginActionError, event: &'static str) -> ApiError {
    let status = match &err {
        PluginActionError::MissingTarget => StatusCode::BAD_REQUEST,
        PluginActionError::NotFound => StatusCode::NOT_FOUND,
        PluginActionError::Host(_)
        | PluginActionError::Activate(_)
        | PluginActionError::Deactivate(_)
        | PluginActionError::StillActive
        | PluginActionError::Delete(_) => {
            tracing::error!(error = ?err, "{event}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, err.to_string())
}

#[utoipa::path(
    post,
    path = "/api/plugins/install",
    tag = "Plugins",
    request_body = PluginTargetBody,
    responses(
        (status = 200, body = ActionResponse),
        (status = 400, body = ActionResponse),
        (status = 403, body = ActionResponse),
        (status = 404, body = ActionResponse),
        (status = 502, body = ActionResponse)
    )
)]
pub async fn install_plugin(
    State(ctx): State<AppContext>,
    bearer: Result<Bearer, StatusCode>,
    Json(body): Json<PluginTargetBody>,
) -> Result<Json<ActionResponse>, ApiError> {
    authorize(&ctx.cfg, bearer, Capability::InstallPlugins)?;
    let cache = ctx.repository_cache();
    let github = ctx.github_uncached();
    let fetcher = ctx.plugin_fetcher();
    let installer = ctx.plugin_installer();
    let uc = InstallFromRepo {
        cache: cache.as_ref(),
        source: github.as_ref(),
        fetcher: fetcher.as_ref(),
        installer: installer.as_ref(),
        github_token: ctx.cfg.github_token.as_deref(),
    };
    let installed = uc.execute(&body.slug_or_url).await.map_err(install_error)?;
    Ok(Json(
        ActionResponse::ok(INSTALLED_MESSAGE).with_folder(installed.folder_name),
    ))
}

#[utoipa::path(
    post,
    path = "/api/plugins/activate",
    tag = "Plugins",
    request_body = PluginTargetBody,
    responses(
        (status = 200, body = ActionResponse),
        (status = 404, body = ActionResponse)
    )
)]
pub async fn activate_plugin(
    State(ctx): State<AppContext>,
    bearer: Result<Bearer, StatusCode>,
    Json(body): Json<PluginTargetBody>,
) -> Result<Json<ActionResponse>, ApiError> {
    authorize(&ctx.cfg, bearer, Capability::ActivatePlugins)?;
    let cache = ctx.repository_cache();
    let host = ctx.plugin_host();
    let github = ctx.github();
    let uc = ActivatePlugin {
        cache: cache.as_ref(),
        host: host.as_ref(),
        source: github.as_ref(),
    };
    let found = uc
        .execute(&body.slug_or_url)
        .await
        .map_err(|e| action_error(e, "plugin_activate_failed"))?;
    Ok(Json(
        ActionResponse::ok("Plugin activated successfully.").with_folder(found.folder()),
    ))
}

#[utoipa::path(
    post,
    path = "/api/plugins/deactivate",
    tag = "Plugins",
    request_body = PluginTargetBody,
    responses(
        (status = 200, body = ActionResponse),
        (status = 404, body = ActionResponse)
    )
)]
pub async fn deactivate_plugin(
    State(ctx): State<AppContext>,
    bearer: Result<Bearer, StatusCode>,
    Json(body): Json<PluginTargetBody>,
) -> Result<Json<ActionResponse>, ApiError> {
    authorize(&ctx.cfg, bearer, Capability::ActivatePlugins)?;
    let cache = ctx.repository_cache();
    let host = ctx.plugin_host();
    let github = ctx.github();
    let uc = DeactivatePlugin {
        cache: cache.as_ref(),
        host: host.as_ref(),
        source: github.as_ref(),
    };
    let found = uc
        .execute(&body.slug_or_url)
        .await
        .map_err(|e| action_error(e, "plugin_deactivate_failed"))?;
    Ok(Json(
        ActionResponse::ok("Plugin deactivated successfully.").with_folder(found.folder()),
    ))
}

#[utoipa::path(
    post,
    path = "/api/plugins/delete",
    tag = "Plugins",
    request_body = PluginTargetBody,
    responses(
        (status = 200, body = ActionResponse),
        (status = 404, body = ActionResponse)
    )
)]
pub async fn delete_plugin(
    State(ctx): State<AppContext>,
    bearer: Result<Bearer, StatusCode>,
    Json(body): Json<PluginTargetBody>,
) -> Result<Json<ActionResponse>, ApiError> {
    authorize(&ctx.cfg, bearer, Capability::DeletePlugins)?;
    let cache = ctx.repository_cache();
    let host = ctx.plugin_host();
    let github = ctx.github();
    let uc = DeletePlugin {
        cache: cache.as_ref(),
        host: host.as_ref(),
        source: github.as_ref(),
    };
    let found = uc
        .execute(&body.slug_or_url)
        .await
        .map_err(|e| action_error(e, "plugin_delete_failed"))?;
    Ok(Json(
        ActionResponse::ok("Plugin deleted successfully.").with_folder(found.folder()),
    ))
}
