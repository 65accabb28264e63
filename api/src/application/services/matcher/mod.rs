//! Reconciles a repository slug with the plugins installed on the host.
//!
//! There is no authoritative mapping between a GitHub repository and the
//! folder WordPress ends up with after extraction, so matching walks an ordered
//! list of rules. The first tier with any hit wins; when several installed
//! plugins hit at that tier the first one in host order is chosen and the rest
//! are reported in [`InstallationMatch::ambiguous_with`].

use crate::application::ports::github_source::GithubSource;
use crate::domain::plugins::installed_plugin::InstalledPluginDescriptor;
use crate::domain::repositories::repository::slugify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchTier {
    /// Candidate equals the plugin's folder name.
    Folder,
    /// Candidate equals the main file name without extension.
    Basename,
    /// Candidate equals the slugified `Plugin Name:` header.
    Title,
    /// Candidate appears inside the folder name or slugified title.
    Substring,
    /// Folder matches the latest release's asset name.
    ReleaseAsset,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Folder => "folder",
            MatchTier::Basename => "basename",
            MatchTier::Title => "title",
            MatchTier::Substring => "substring",
            MatchTier::ReleaseAsset => "release_asset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationMatch {
    pub plugin_file: String,
    pub tier: MatchTier,
    pub is_active: bool,
    /// Other plugin files that matched at the same tier.
    pub ambiguous_with: Vec<String>,
}

impl InstallationMatch {
    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguous_with.is_empty()
    }

    pub fn folder(&self) -> &str {
        self.plugin_file
            .rsplit_once('/')
            .map(|(folder, _)| folder)
            .unwrap_or(&self.plugin_file)
    }
}

type Rule = fn(&str, &InstalledPluginDescriptor) -> bool;

fn folder_of(plugin: &InstalledPluginDescriptor) -> Option<String> {
    plugin.folder().map(str::to_lowercase)
}

fn folder_equals(candidate: &str, plugin: &InstalledPluginDescriptor) -> bool {
    folder_of(plugin).is_some_and(|f| f == candidate)
}

fn basename_equals(candidate: &str, plugin: &InstalledPluginDescriptor) -> bool {
    plugin.basename().to_lowercase() == candidate
}

fn title_equals(candidate: &str, plugin: &InstalledPluginDescriptor) -> bool {
    slugify(&plugin.name) == candidate
}

fn folder_or_title_contains(candidate: &str, plugin: &InstalledPluginDescriptor) -> bool {
    folder_of(plugin).is_some_and(|f| f.contains(candidate))
        || slugify(&plugin.name).contains(candidate)
}

fn folder_matches_asset(hint: &str, plugin: &InstalledPluginDescriptor) -> bool {
    folder_of(plugin).is_some_and(|f| f == hint || f.contains(hint))
}

const NAME_RULES: [(MatchTier, Rule); 4] = [
    (MatchTier::Folder, folder_equals),
    (MatchTier::Basename, basename_equals),
    (MatchTier::Title, title_equals),
    (MatchTier::Substring, folder_or_title_contains),
];

fn normalize(candidate: &str) -> Option<String> {
    let normalized = candidate.trim().to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn first_tier_hit(
    candidate: &str,
    plugins: &[InstalledPluginDescriptor],
    rules: &[(MatchTier, Rule)],
) -> Option<InstallationMatch> {
    for (tier, rule) in rules {
        let mut hits = plugins.iter().filter(|p| rule(candidate, p));
        let Some(first) = hits.next() else {
            continue;
        };
        return Some(InstallationMatch {
            plugin_file: first.plugin_file.clone(),
            tier: *tier,
            is_active: first.active,
            ambiguous_with: hits.map(|p| p.plugin_file.clone()).collect(),
        });
    }
    None
}

/// Rules 1-4: folder, basename, title, substring.
pub fn match_by_name(
    candidate: &str,
    plugins: &[InstalledPluginDescriptor],
) -> Option<InstallationMatch> {
    let candidate = normalize(candidate)?;
    first_tier_hit(&candidate, plugins, &NAME_RULES)
}

/// Rule 5: installed folder named after the release asset.
pub fn match_by_release_asset(
    asset_hint: &str,
    plugins: &[InstalledPluginDescriptor],
) -> Option<InstallationMatch> {
    let hint = normalize(asset_hint)?;
    first_tier_hit(
        &hint,
        plugins,
        &[(MatchTier::ReleaseAsset, folder_matches_asset as Rule)],
    )
}

/// Runs every rule in order. The release lookup behind rule 5 only happens
/// when the name rules found nothing and the repository URL is known.
pub async fn resolve_installation<S>(
    source: &S,
    candidate: &str,
    html_url: Option<&str>,
    plugins: &[InstalledPluginDescriptor],
) -> Option<InstallationMatch>
where
    S: GithubSource + ?Sized,
{
    if plugins.is_empty() {
        return None;
    }
    if let Some(found) = match_by_name(candidate, plugins) {
        return Some(found);
    }
    let html_url = html_url?;
    match source.latest_release(html_url).await {
        Ok(Some(release)) => release
            .asset_folder_hint()
            .and_then(|hint| match_by_release_asset(&hint, plugins)),
        Ok(None) => None,
        Err(e) => {
            tracing::debug!(error = ?e, html_url, "asset_match_lookup_failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{FakeGithubSource, plugin, release};
    use chrono::Utc;

    #[test]
    fn exact_folder_reports_installed_and_active() {
        let plugins = vec![plugin(
            "awesome-widget/awesome-widget.php",
            "Awesome Widget",
            true,
        )];

        let found = match_by_name("awesome-widget", &plugins).unwrap();

        assert_eq!(found.tier, MatchTier::Folder);
        assert!(found.is_active);
        assert!(!found.is_ambiguous());
        assert_eq!(found.folder(), "awesome-widget");
    }

    #[test]
    fn substring_rule_over_matches() {
        let plugins = vec![plugin(
            "awesome-widget-pro/main.php",
            "Awesome Widget Pro",
            false,
        )];

        let found = match_by_name("widget", &plugins).unwrap();

        assert_eq!(found.tier, MatchTier::Substring);
        assert!(!found.is_active);
    }

    #[test]
    fn earlier_tier_beats_host_order() {
        let plugins = vec![
            plugin("seo-tools-extra/seo.php", "SEO Tools Extra", false),
            plugin("misc/seo-tools.php", "Misc", true),
        ];

        let found = match_by_name("seo-tools", &plugins).unwrap();

        assert_eq!(found.tier, MatchTier::Basename);
        assert_eq!(found.plugin_file, "misc/seo-tools.php");
        assert!(found.is_active);
    }

    #[test]
    fn title_match_is_slugified_and_case_insensitive() {
        let plugins = vec![plugin("wpx-19/loader.php", "My Cool Plugin!", false)];

        let found = match_by_name("  My-Cool-Plugin ", &plugins).unwrap();

        assert_eq!(found.tier, MatchTier::Title);
    }

    #[test]
    fn ties_are_reported_as_ambiguous() {
        let plugins = vec![
            plugin("forms-lite/forms.php", "Forms Lite", false),
            plugin("forms-pro/forms.php", "Forms Pro", true),
        ];

        let found = match_by_name("forms", &plugins).unwrap();

        assert_eq!(found.tier, MatchTier::Basename);
        assert_eq!(found.plugin_file, "forms-lite/forms.php");
        assert_eq!(found.ambiguous_with, vec!["forms-pro/forms.php"]);
    }

    #[test]
    fn blank_candidate_never_matches() {
        let plugins = vec![plugin("anything/anything.php", "Anything", true)];
        assert_eq!(match_by_name("   ", &plugins), None);
        assert_eq!(match_by_name("unrelated", &plugins), None);
    }

    #[test]
    fn single_file_plugins_match_by_basename_only() {
        let plugins = vec![plugin("hello.php", "Hello Dolly", true)];
        assert_eq!(
            match_by_name("hello", &plugins).map(|m| m.tier),
            Some(MatchTier::Basename)
        );
        assert_eq!(match_by_release_asset("hello", &plugins), None);
    }

    #[tokio::test]
    async fn falls_back_to_release_asset_name() {
        let url = "https://github.com/acme/wp-gallery";
        let source = FakeGithubSource::default()
            .with_release(url, Some(release(Utc::now(), Some("Gallery-Block.zip"))));
        let plugins = vec![plugin("gallery-block/index.php", "Block Gallery", true)];

        let found = resolve_installation(&source, "wp-gallery", Some(url), &plugins)
            .await
            .unwrap();

        assert_eq!(found.tier, MatchTier::ReleaseAsset);
        assert!(found.is_active);
    }

    #[tokio::test]
    async fn name_match_skips_release_lookup() {
        let url = "https://github.com/acme/widget";
        let source = FakeGithubSource::default();
        let plugins = vec![plugin("widget/widget.php", "Widget", false)];

        let found = resolve_installation(&source, "widget", Some(url), &plugins).await;

        assert!(found.is_some());
        assert_eq!(source.release_calls(), 0);
    }

    #[tokio::test]
    async fn lookup_failure_means_not_installed() {
        let url = "https://github.com/acme/widget";
        let source = FakeGithubSource::default().with_release_error(url, "boom");
        let plugins = vec![plugin("other/other.php", "Other", false)];

        assert_eq!(
            resolve_installation(&source, "widget", Some(url), &plugins).await,
            None
        );
    }
}
