use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use utoipa::ToSchema;

use crate::bootstrap::config::Config;
use crate::presentation::http::auth::{self, Bearer, Capability, Claims};

/// Body of every plugin action and cache maintenance reply.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            folder_name: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            folder_name: None,
        }
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder_name = Some(folder.into());
        self
    }
}

pub type ApiError = (StatusCode, Json<ActionResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ActionResponse::failure(message)))
}

/// Capability check that answers with a JSON message.
pub fn authorize(
    cfg: &Config,
    bearer: Result<Bearer, StatusCode>,
    cap: Capability,
) -> Result<Claims, ApiError> {
    auth::require_capability(cfg, bearer, cap).map_err(|status| match status {
        StatusCode::FORBIDDEN => api_error(status, cap.denied_message()),
        _ => api_error(StatusCode::UNAUTHORIZED, "Authentication required."),
    })
}
