use crate::application::ports::github_source::GithubSource;
use crate::application::ports::plugin_host::PluginHost;
use crate::application::ports::repository_cache::RepositoryCache;
use crate::application::services::matcher::InstallationMatch;
use crate::application::use_cases::plugins::locate::{LocatePlugin, PluginActionError};

pub struct ActivatePlugin<'a, C, H, S>
where
    C: RepositoryCache + ?Sized,
    H: PluginHost + ?Sized,
    S: GithubSource + ?Sized,
{
    pub cache: &'a C,
    pub host: &'a H,
    pub source: &'a S,
}

impl<'a, C, H, S> ActivatePlugin<'a, C, H, S>
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
        if !found.is_active {
            self.host
                .activate(&found.plugin_file)
                .await
                .map_err(PluginActionError::Activate)?;
        }
        tracing::info!(plugin = found.plugin_file.as_str(), "plugin_activated");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        FakeGithubSource, InMemoryRepositoryCache, StaticPluginHost, plugin,
    };

    #[tokio::test]
    async fn marks_matched_plugin_active() {
        let cache = InMemoryRepositoryCache::default();
        let source = FakeGithubSource::default();
        let host = StaticPluginHost::new(vec![plugin("widget/widget.php", "Widget", false)]);

        let found = ActivatePlugin {
            cache: &cache,
            host: &host,
            source: &source,
        }
        .execute("widget")
        .await
        .unwrap();

        assert_eq!(found.plugin_file, "widget/widget.php");
        assert!(host.is_active("widget/widget.php").await.unwrap());
    }

    #[tokio::test]
    async fn blank_slug_is_rejected() {
        let cache = InMemoryRepositoryCache::default();
        let source = FakeGithubSource::default();
        let host = StaticPluginHost::default();

        let err = ActivatePlugin {
            cache: &cache,
            host: &host,
            source: &source,
        }
        .execute("")
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "Missing plugin slug.");
    }
}
