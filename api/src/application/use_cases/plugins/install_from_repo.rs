use crate::application::ports::github_source::GithubSource;
use crate::application::ports::plugin_installer::{
    InstalledPackage, PluginInstallError, PluginInstaller,
};
use crate::application::ports::plugin_package_fetcher::PluginPackageFetcher;
use crate::application::ports::repository_cache::RepositoryCache;
use crate::application::use_cases::plugins::locate::PluginTarget;
use crate::domain::repositories::repository::parse_github_url;

pub const INSTALLED_MESSAGE: &str =
    "Plugin installed successfully! Please activate it from the Plugins page.";

#[derive(thiserror::Error, Debug)]
pub enum InstallFromRepoError {
    #[error("Invalid repository URL.")]
    MissingTarget,
    #[error("Repository not found in cache.")]
    UnknownRepository,
    #[error("Failed to read the repository cache.")]
    Cache(#[source] anyhow::Error),
    #[error("Failed to fetch release information.")]
    ReleaseLookup(#[source] anyhow::Error),
    #[error("No downloadable ZIP found for the latest release.")]
    NoRelease,
    #[error("Failed to download the plugin ZIP.")]
    Download(#[source] anyhow::Error),
    #[error("Plugin installation failed.")]
    Install(#[source] PluginInstallError),
}

/// Only GitHub-hosted downloads get the API token.
fn is_github_url(url: &str) -> bool {
    ["https://github.com/", "https://api.github.com/", "https://codeload.github.com/"]
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

pub struct InstallFromRepo<'a, C, S, F, I>
where
    C: RepositoryCache + ?Sized,
    S: GithubSource + ?Sized,
    F: PluginPackageFetcher + ?Sized,
    I: PluginInstaller + ?Sized,
{
    pub cache: &'a C,
    pub source: &'a S,
    pub fetcher: &'a F,
    pub installer: &'a I,
    pub github_token: Option<&'a str>,
}

impl<'a, C, S, F, I> InstallFromRepo<'a, C, S, F, I>
where
    C: RepositoryCache + ?Sized,
    S: GithubSource + ?Sized,
    F: PluginPackageFetcher + ?Sized,
    I: PluginInstaller + ?Sized,
{
    pub async fn execute(&self, slug_or_url: &str) -> Result<InstalledPackage, InstallFromRepoError> {
        let target =
            PluginTarget::parse(slug_or_url).ok_or(InstallFromRepoError::MissingTarget)?;
        let html_url = match target.html_url {
            Some(url) => url,
            None => {
                self.cache
                    .find_by_slug(&target.slug)
                    .await
                    .map_err(InstallFromRepoError::Cache)?
                    .ok_or(InstallFromRepoError::UnknownRepository)?
                    .html_url
            }
        };

        let release = self
            .source
            .latest_release(&html_url)
            .await
            .map_err(InstallFromRepoError::ReleaseLookup)?
            .ok_or(InstallFromRepoError::NoRelease)?;
        let download_url = release
            .download_url()
            .ok_or(InstallFromRepoError::NoRelease)?;
        let token = self.github_token.filter(|_| is_github_url(download_url));

        let bytes = self
            .fetcher
            .fetch(download_url, token)
            .await
            .map_err(InstallFromRepoError::Download)?;
        let zipball_prefix =
            parse_github_url(&html_url).map(|(owner, name)| format!("{owner}-{name}-"));
        let installed = self
            .installer
            .install(&bytes, &target.slug, zipball_prefix.as_deref())
            .await
            .map_err(InstallFromRepoError::Install)?;

        tracing::info!(
            repo = html_url.as_str(),
            folder = installed.folder_name.as_str(),
            bytes = bytes.len(),
            "plugin_installed"
        );
        Ok(installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::github_source::{ReleaseAsset, ReleaseInfo};
    use crate::application::test_support::{
        FakeGithubSource, InMemoryRepositoryCache, RecordingFetcher, RecordingInstaller, record,
        release,
    };
    use chrono::Utc;

    #[tokio::test]
    async fn installs_zip_asset_of_cached_repository() {
        let cache = InMemoryRepositoryCache::default();
        let rec = record(1, "acme/awesome-widget");
        cache.upsert(&rec).await.unwrap();
        let source = FakeGithubSource::default()
            .with_release(&rec.html_url, Some(release(Utc::now(), Some("awesome-widget.zip"))));
        let fetcher = RecordingFetcher::default();
        let installer = RecordingInstaller::default();

        let installed = InstallFromRepo {
            cache: &cache,
            source: &source,
            fetcher: &fetcher,
            installer: &installer,
            github_token: Some("secret"),
        }
        .execute("awesome-widget")
        .await
        .unwrap();

        assert_eq!(installed.folder_name, "awesome-widget");
        let requests = fetcher.requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec![(
                "https://github.com/downloads/awesome-widget.zip".to_string(),
                Some("secret".to_string())
            )]
        );
        assert_eq!(
            installer.zipball_prefixes.lock().unwrap().clone(),
            vec![Some("acme-awesome-widget-".to_string())]
        );
    }

    #[tokio::test]
    async fn token_is_withheld_from_foreign_hosts() {
        let cache = InMemoryRepositoryCache::default();
        let url = "https://github.com/acme/widget";
        let source = FakeGithubSource::default().with_release(
            url,
            Some(ReleaseInfo {
                created_at: Utc::now(),
                tag_name: None,
                assets: vec![ReleaseAsset {
                    name: "widget.zip".into(),
                    browser_download_url: "https://cdn.example.test/widget.zip".into(),
                }],
                zipball_url: None,
            }),
        );
        let fetcher = RecordingFetcher::default();
        let installer = RecordingInstaller::default();

        InstallFromRepo {
            cache: &cache,
            source: &source,
            fetcher: &fetcher,
            installer: &installer,
            github_token: Some("secret"),
        }
        .execute(url)
        .await
        .unwrap();

        assert_eq!(fetcher.requests.lock().unwrap()[0].1, None);
    }

    #[tokio::test]
    async fn reports_each_failure_with_its_own_message() {
        let cache = InMemoryRepositoryCache::default();
        let source = FakeGithubSource::default()
            .with_release("https://github.com/acme/bare", None)
            .with_release_error("https://github.com/acme/flaky", "timeout");
        let fetcher = RecordingFetcher::default();
        let installer = RecordingInstaller::default();
        let uc = InstallFromRepo {
            cache: &cache,
            source: &source,
            fetcher: &fetcher,
            installer: &installer,
            github_token: None,
        };

        let messages = [
            uc.execute("").await.unwrap_err().to_string(),
            uc.execute("not-cached").await.unwrap_err().to_string(),
            uc.execute("https://github.com/acme/bare").await.unwrap_err().to_string(),
            uc.execute("https://github.com/acme/flaky").await.unwrap_err().to_string(),
        ];

        assert_eq!(
            messages,
            [
                "Invalid repository URL.",
                "Repository not found in cache.",
                "No downloadable ZIP found for the latest release.",
                "Failed to fetch release information.",
            ]
        );
        assert!(installer.installs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn download_failure_stops_before_install() {
        let cache = InMemoryRepositoryCache::default();
        let url = "https://github.com/acme/widget";
        let source =
            FakeGithubSource::default().with_release(url, Some(release(Utc::now(), None)));
        let fetcher = RecordingFetcher {
            fail: true,
            ..Default::default()
        };
        let installer = RecordingInstaller::default();

        let err = InstallFromRepo {
            cache: &cache,
            source: &source,
            fetcher: &fetcher,
            installer: &installer,
            github_token: None,
        }
        .execute(url)
        .await
        .unwrap_err();

        assert!(matches!(err, InstallFromRepoError::Download(_)));
        // no zip asset, so the zipball was requested
        assert_eq!(
            fetcher.requests.lock().unwrap()[0].0,
            "https://api.github.com/zipball/v1.0.0"
        );
        assert!(installer.installs.lock().unwrap().is_empty());
    }
}
