use crate::application::ports::github_source::GithubSource;
use crate::application::ports::plugin_host::PluginHost;
use crate::application::ports::repository_cache::RepositoryCache;
use crate::application::services::matcher::InstallationMatch;
use crate::application::use_cases::plugins::locate::{LocatePlugin, PluginActionError};

pub struct DeactivatePlugin<'a, C, H, S>
where
    C: RepositoryCache + ?Sized,
    H: PluginHost + ?Sized,
    S: GithubSource + ?Sized,
{
    pub cache: &'a C,
    pub host: &'a H,
    pub source: &'a S,
}

impl<'a, C, H, S> DeactivatePlugin<'a, C, H, S>
where
    C: RepositoryCache + ?Sized,
    H: PluginHost + ?Sized,
    S: GithubSource + ?Sized,
{
    /// Succeeds only if the host reports the plugin inactive afterwards.
    pub async fn execute(&self, slug_or_url: &str) -> Result<InstallationMatch, PluginActionError> {
        let found = LocatePlugin {
            cache: self.cache,
            host: self.host,
            source: self.source,
        }
        .execute(slug_or_url)
        .await?;
        self.host
            .deactivate(&found.plugin_file)
            .await
            .map_err(PluginActionError::Deactivate)?;
        let still_active = self
            .host
            .is_active(&found.plugin_file)
            .await
            .map_err(PluginActionError::Host)?;
        if still_active {
            tracing::warn!(plugin = found.plugin_file.as_str(), "plugin_still_active");
            return Err(PluginActionError::StillActive);
        }
        tracing::info!(plugin = found.plugin_file.as_str(), "plugin_deactivated");
        Ok(found)
    }
}
