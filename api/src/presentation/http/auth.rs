use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::bootstrap::config::Config;

/// WordPress capabilities a token can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    InstallPlugins,
    ActivatePlugins,
    DeletePlugins,
    ManageCache,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::InstallPlugins,
        Capability::ActivatePlugins,
        Capability::DeletePlugins,
        Capability::ManageCache,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::InstallPlugins => "install_plugins",
            Capability::ActivatePlugins => "activate_plugins",
            Capability::DeletePlugins => "delete_plugins",
            Capability::ManageCache => "manage_cache",
        }
    }

    pub fn denied_message(&self) -> &'static str {
        match self {
            Capability::InstallPlugins => "You do not have permission to install plugins.",
            Capability::ActivatePlugins => "You do not have permission to activate plugins.",
            Capability::DeletePlugins => "You do not have permission to delete plugins.",
            Capability::ManageCache => "You do not have permission to manage the repository cache.",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == raw.trim())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    /// Unknown capability names are carried but never match.
    #[serde(default)]
    pub caps: Vec<String>,
}

impl Claims {
    pub fn allows(&self, cap: Capability) -> bool {
        self.caps.iter().any(|c| c == cap.as_str())
    }
}

pub struct Bearer(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Bearer
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .map(|t| Bearer(t.trim().to_string()))
            .filter(|b| !b.0.is_empty())
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

pub(crate) fn validate_bearer(cfg: &Config, bearer: Bearer) -> Result<Claims, StatusCode> {
    let data = jsonwebtoken::decode::<Claims>(
        &bearer.0,
        &DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;
    Ok(data.claims)
}

/// 401 without a valid token, 403 when the token lacks `cap`.
pub fn require_capability(
    cfg: &Config,
    bearer: Result<Bearer, StatusCode>,
    cap: Capability,
) -> Result<Claims, StatusCode> {
    let claims = validate_bearer(cfg, bearer?)?;
    if !claims.allows(cap) {
        tracing::warn!(sub = claims.sub.as_str(), capability = cap.as_str(), "capability_denied");
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(claims)
}

pub fn issue_token(cfg: &Config, sub: &str, caps: &[Capability]) -> anyhow::Result<String> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: sub.to_string(),
        exp: now + (cfg.jwt_expires_secs.max(0) as usize),
        caps: caps.iter().map(|c| c.as_str().to_string()).collect(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
    )?;
    Ok(token)
}
