use crate::application::ports::github_source::GithubSource;
use crate::application::ports::plugin_host::PluginHost;
use crate::application::ports::repository_cache::RepositoryCache;
use crate::application::services::matcher::InstallationMatch;
use crate::application::use_cases::plugins::locate::{LocatePlugin, PluginActionError};

pub struct DeletePlugin<'a, C, H, S>
where
    C: RepositoryCache + ?Sized,
    H: PluginHost + ?Sized,
    S: GithubSource + ?Sized,
{
    pub cache: &'a C,
    pub host: &'a H,
    pub source: &'a S,
}

impl<'a, C, H, S> DeletePlugin<'a, C, H, S>
where
    C: RepositoryCache + ?Sized,
    H: PluginHost + ?Sized,
    S: GithubSource + ?Sized,
{
    pub async fn execute(&self, slug_or_url: &str) -> Result<InstallationMatch, PluginActionError> {
        let found = LocatePlugin {
            cache: self.cache,
            host: self.host,
            source: self.source,
        }
        .execute(slug_or_url)
        .await?;
        if found.is_active {
            self.host
                .deactivate(&found.plugin_file)
                .await
                .map_err(PluginActionError::Deactivate)?;
        }
        self.host
            .remove(&found.plugin_file)
            .await
            .map_err(PluginActionError::Delete)?;
        tracing::info!(plugin = found.plugin_file.as_str(), "plugin_deleted");
        Ok(found)
    }
}
