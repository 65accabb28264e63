use crate::application::ports::github_source::GithubSource;
use crate::application::ports::plugin_host::PluginHost;
use crate::application::ports::repository_cache::RepositoryCache;
use crate::application::services::matcher::{InstallationMatch, resolve_installation};
use crate::domain::repositories::repository::{parse_github_url, slugify};

/// What a plugin action refers to: a repository URL or a bare slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginTarget {
    pub slug: String,
    pub html_url: Option<String>,
}

impl PluginTarget {
    pub fn parse(slug_or_url: &str) -> Option<Self> {
        let input = slug_or_url.trim();
        if input.is_empty() {
            return None;
        }
        if let Some((owner, name)) = parse_github_url(input) {
            let slug = slugify(&name);
            if slug.is_empty() {
                return None;
            }
            return Some(Self {
                slug,
                html_url: Some(format!("https://github.com/{owner}/{name}")),
            });
        }
        if input.contains("://") {
            return None;
        }
        Some(Self {
            slug: input.to_lowercase(),
            html_url: None,
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PluginActionError {
    #[error("Missing plugin slug.")]
    MissingTarget,
    #[error("Plugin not found.")]
    NotFound,
    #[error("Failed to read installed plugins.")]
    Host(#[source] anyhow::Error),
    #[error("Failed to activate the plugin.")]
    Activate(#[source] anyhow::Error),
    #[error("Failed to deactivate the plugin.")]
    Deactivate(#[source] anyhow::Error),
    #[error("Failed to deactivate the plugin.")]
    StillActive,
    #[error("Failed to delete the plugin.")]
    Delete(#[source] anyhow::Error),
}

/// Finds the installed plugin a slug or repository URL refers to.
pub struct LocatePlugin<'a, C, H, S>
where
    C: RepositoryCache + ?Sized,
    H: PluginHost + ?Sized,
    S: GithubSource + ?Sized,
{
    pub cache: &'a C,
    pub host: &'a H,
    pub source: &'a S,
}

impl<'a, C, H, S> LocatePlugin<'a, C, H, S>
where
    C: RepositoryCache + ?Sized,
    H: PluginHost + ?Sized,
    S: GithubSource + ?Sized,
{
    pub async fn execute(&self, slug_or_url: &str) -> Result<InstallationMatch, PluginActionError> {
        let target = PluginTarget::parse(slug_or_url).ok_or(PluginActionError::MissingTarget)?;
        let html_url = match target.html_url {
            Some(url) => Some(url),
            None => match self.cache.find_by_slug(&target.slug).await {
                Ok(found) => found.map(|r| r.html_url),
                Err(e) => {
                    tracing::warn!(error = ?e, slug = target.slug.as_str(), "cache_lookup_failed");
                    None
                }
            },
        };
        let plugins = self
            .host
            .list_installed()
            .await
            .map_err(PluginActionError::Host)?;
        let found = resolve_installation(self.source, &target.slug, html_url.as_deref(), &plugins)
            .await
            .ok_or(PluginActionError::NotFound)?;
        if found.is_ambiguous() {
            tracing::warn!(
                slug = target.slug.as_str(),
                chosen = found.plugin_file.as_str(),
                others = ?found.ambiguous_with,
                "plugin_match_ambiguous"
            );
        }
        Ok(found)
    }
}
