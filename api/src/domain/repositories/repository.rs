use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Topic every cached repository must carry.
pub const WORDPRESS_PLUGIN_TOPIC: &str = "wordpress-plugin";

pub const DEFAULT_DESCRIPTION: &str = "No description available.";

static NON_ALNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    pub repo_id: i64,
    pub slug: String,
    pub full_name: String,
    pub html_url: String,
    pub description: String,
    pub topics: Vec<String>,
    pub latest_release_date: Option<DateTime<Utc>>,
    pub homepage: Option<String>,
}

impl RepositoryRecord {
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.iter().any(|t| t.eq_ignore_ascii_case(topic))
    }

    /// Topics as stored in the cache table.
    pub fn topics_text(&self) -> String {
        self.topics.join(",")
    }

    pub fn parse_topics(text: &str) -> Vec<String> {
        text.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Lowercases the input and collapses every run of non-alphanumeric
/// characters into a single hyphen, the way WordPress sanitizes titles.
pub fn slugify(input: &str) -> String {
    let lowered = input.trim().to_lowercase();
    NON_ALNUM_RE
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Plugin-folder-like slug for `owner/name`: the slugified repository name.
pub fn derive_slug(full_name: &str) -> String {
    let name = full_name.rsplit('/').next().unwrap_or(full_name);
    let slug = slugify(name);
    if slug.is_empty() {
        slugify(full_name)
    } else {
        slug
    }
}

/// Splits `https://github.com/{owner}/{repo}` into its owner and repository name.
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .trim()
        .strip_prefix("https://github.com/")
        .or_else(|| url.trim().strip_prefix("http://github.com/"))?;
    let mut parts = rest.trim_end_matches('/').split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;
    let name = name.strip_suffix(".git").unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    Some((owner.to_string(), name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Awesome Widget"), "awesome-widget");
        assert_eq!(slugify("  My__Plugin -- Pro! "), "my-plugin-pro");
        assert_eq!(slugify("WP.Rocket"), "wp-rocket");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn derive_slug_uses_repository_name() {
        assert_eq!(derive_slug("acme/Awesome_Widget"), "awesome-widget");
        assert_eq!(derive_slug("no-owner"), "no-owner");
    }

    #[test]
    fn topics_round_trip_through_text() {
        let parsed = RepositoryRecord::parse_topics("wordpress-plugin, seo,,gutenberg");
        assert_eq!(parsed, vec!["wordpress-plugin", "seo", "gutenberg"]);
        assert!(RepositoryRecord::parse_topics("").is_empty());
    }

    #[test]
    fn parses_github_urls() {
        assert_eq!(
            parse_github_url("https://github.com/acme/widget/"),
            Some(("acme".to_string(), "widget".to_string()))
        );
        assert_eq!(
            parse_github_url("https://github.com/acme/widget.git"),
            Some(("acme".to_string(), "widget".to_string()))
        );
        assert_eq!(parse_github_url("https://gitlab.com/acme/widget"), None);
        assert_eq!(parse_github_url("https://github.com/acme"), None);
    }
}
