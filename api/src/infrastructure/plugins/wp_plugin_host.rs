use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Mutex;
use walkdir::WalkDir;

use crate::application::ports::plugin_host::PluginHost;
use crate::domain::plugins::installed_plugin::InstalledPluginDescriptor;
use crate::infrastructure::plugins::filesystem_installer::resolve_root;

/// WordPress only looks at the start of a file for headers.
const HEADER_SCAN_BYTES: u64 = 8 * 1024;

pub const ACTIVE_STATE_FILE: &str = ".active_plugins.json";

static PLUGIN_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)^[ \t/*#@]*Plugin Name:(.*)$").expect("valid regex")
});

/// Plugins directory of a WordPress install. The active list lives in a JSON
/// file next to the plugins.
pub struct WpPluginHost {
    root: PathBuf,
    state_lock: Mutex<()>,
}

impl WpPluginHost {
    pub fn new(configured_dir: &str) -> anyhow::Result<Self> {
        Ok(Self {
            root: resolve_root(configured_dir)?,
            state_lock: Mutex::new(()),
        })
    }

    fn state_path(&self) -> PathBuf {
        self.root.join(ACTIVE_STATE_FILE)
    }

    /// Rejects anything that could point outside the plugins directory.
    fn sanitize_plugin_file(plugin_file: &str) -> anyhow::Result<String> {
        let trimmed = plugin_file.trim().trim_start_matches('/');
        if trimmed.is_empty() || !trimmed.ends_with(".php") {
            bail!("invalid plugin file");
        }
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.len() > 2
            || segments
                .iter()
                .any(|s| s.is_empty() || *s == "." || *s == ".." || s.starts_with('.'))
        {
            bail!("invalid plugin file path");
        }
        Ok(trimmed.to_string())
    }

    async fn read_active(&self) -> anyhow::Result<BTreeSet<String>> {
        match tokio::fs::read(self.state_path()).await {
            Ok(bytes) => {
                let files: Vec<String> =
                    serde_json::from_slice(&bytes).context("parse active plugin list")?;
                Ok(files.into_iter().collect())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(err) => Err(err).context("read active plugin list"),
        }
    }

    async fn write_active(&self, active: &BTreeSet<String>) -> anyhow::Result<()> {
        let files: Vec<&String> = active.iter().collect();
        let body = serde_json::to_vec_pretty(&files)?;
        let root = self.root.clone();
        let target = self.state_path();
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&root)?;
            std::io::Write::write_all(&mut tmp, &body)?;
            tmp.persist(&target).map_err(|e| anyhow::anyhow!(e.error))?;
            Ok(())
        })
        .await
        .context("join active list writer")??;
        Ok(())
    }

    async fn update_active(&self, plugin_file: &str, active: bool) -> anyhow::Result<()> {
        let _guard = self.state_lock.lock().await;
        let mut set = self.read_active().await?;
        let changed = if active {
            set.insert(plugin_file.to_string())
        } else {
            set.remove(plugin_file)
        };
        if changed {
            self.write_active(&set).await?;
        }
        Ok(())
    }

    fn scan(root: &Path) -> anyhow::Result<Vec<(String, String)>> {
        let mut found = Vec::new();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = ?e, "plugin_scan_entry_failed");
                    continue;
                }
            };
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some("php")
            {
                continue;
            }
            let Some(name) = read_plugin_name(entry.path()) else {
                continue;
            };
            let rel = entry
                .path()
                .strip_prefix(root)
                .context("plugin outside root")?
                .to_string_lossy()
                .replace('\\', "/");
            found.push((rel, name));
        }
        found.sort();
        Ok(found)
    }
}

/// Declared `Plugin Name:` header, if the file has one.
pub fn read_plugin_name(path: &Path) -> Option<String> {
    let file = std::fs::File::open(path).ok()?;
    let mut head = Vec::new();
    file.take(HEADER_SCAN_BYTES).read_to_end(&mut head).ok()?;
    parse_plugin_name(&String::from_utf8_lossy(&head))
}

pub fn parse_plugin_name(source: &str) -> Option<String> {
    let caps = PLUGIN_NAME_RE.captures(source)?;
    let name = caps.get(1)?.as_str();
    let name = name.trim().trim_end_matches("*/").trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[async_trait]
impl PluginHost for WpPluginHost {
    async fn list_installed(&self) -> anyhow::Result<Vec<InstalledPluginDescriptor>> {
        let root = self.root.clone();
        let scanned = tokio::task::spawn_blocking(move || WpPluginHost::scan(&root))
            .await
            .context("join plugin scan")??;
        let active = self.read_active().await?;
        Ok(scanned
            .into_iter()
            .map(|(plugin_file, name)| InstalledPluginDescriptor {
                active: active.contains(&plugin_file),
                plugin_file,
                name,
            })
            .collect())
    }

    async fn activate(&self, plugin_file: &str) -> anyhow::Result<()> {
        let plugin_file = Self::sanitize_plugin_file(plugin_file)?;
        let path = self.root.join(&plugin_file);
        let has_header = tokio::task::spawn_blocking(move || read_plugin_name(&path).is_some())
            .await
            .context("join plugin header read")?;
        if !has_header {
            bail!("plugin file {plugin_file} does not exist or has no plugin header");
        }
        self.update_active(&plugin_file, true).await
    }

    async fn deactivate(&self, plugin_file: &str) -> anyhow::Result<()> {
        let plugin_file = Self::sanitize_plugin_file(plugin_file)?;
        self.update_active(&plugin_file, false).await
    }

    async fn is_active(&self, plugin_file: &str) -> anyhow::Result<bool> {
        let plugin_file = Self::sanitize_plugin_file(plugin_file)?;
        Ok(self.read_active().await?.contains(&plugin_file))
    }

    async fn remove(&self, plugin_file: &str) -> anyhow::Result<()> {
        let plugin_file = Self::sanitize_plugin_file(plugin_file)?;
        match plugin_file.split_once('/') {
            Some((folder, _)) => {
                let dir = self.root.join(folder);
                match tokio::fs::remove_dir_all(&dir).await {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err).context("remove plugin folder"),
                }
            }
            None => match tokio::fs::remove_file(self.root.join(&plugin_file)).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err).context("remove plugin file"),
            },
        }
        self.update_active(&plugin_file, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn fixture() -> (TempDir, WpPluginHost) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("plugins");
        let host = WpPluginHost::new(root.to_str().unwrap()).unwrap();
        write(
            &host.root,
            "awesome-widget/awesome-widget.php",
            "<?php\n/**\n * Plugin Name: Awesome Widget\n * Version: 1.0\n */\n",
        );
        write(&host.root, "awesome-widget/includes.php", "<?php // helpers\n");
        write(&host.root, "hello.php", "<?php\n/*\nPlugin Name: Hello Dolly */\n");
        write(&host.root, ".hidden/ghost.php", "<?php /* Plugin Name: Ghost */");
        write(&host.root, "deep/nested/too-deep.php", "<?php /* Plugin Name: Deep */");
        (temp, host)
    }

    #[test]
    fn parses_header_variants() {
        assert_eq!(
            parse_plugin_name(" * Plugin Name:   Awesome Widget  \n").as_deref(),
            Some("Awesome Widget")
        );
        assert_eq!(
            parse_plugin_name("/* plugin name: Short */").as_deref(),
            Some("Short")
        );
        assert_eq!(parse_plugin_name("<?php echo 'no header';"), None);
        assert_eq!(parse_plugin_name(" * Plugin Name:   \n"), None);
    }

    #[tokio::test]
    async fn lists_folder_and_single_file_plugins() {
        let (_temp, host) = fixture();

        let plugins = host.list_installed().await.unwrap();

        let files: Vec<(&str, &str)> = plugins
            .iter()
            .map(|p| (p.plugin_file.as_str(), p.name.as_str()))
            .collect();
        assert_eq!(
            files,
            vec![
                ("awesome-widget/awesome-widget.php", "Awesome Widget"),
                ("hello.php", "Hello Dolly"),
            ]
        );
        assert!(plugins.iter().all(|p| !p.active));
    }

    #[tokio::test]
    async fn activation_state_survives_restart() {
        let (temp, host) = fixture();
        host.activate("awesome-widget/awesome-widget.php").await.unwrap();
        host.activate("hello.php").await.unwrap();
        host.deactivate("hello.php").await.unwrap();

        let reopened = WpPluginHost::new(temp.path().join("plugins").to_str().unwrap()).unwrap();

        assert!(reopened.is_active("awesome-widget/awesome-widget.php").await.unwrap());
        assert!(!reopened.is_active("hello.php").await.unwrap());
        let listed = reopened.list_installed().await.unwrap();
        assert!(listed[0].active);
    }

    #[tokio::test]
    async fn cannot_activate_missing_or_headerless_files() {
        let (_temp, host) = fixture();
        assert!(host.activate("nope/nope.php").await.is_err());
        assert!(host.activate("awesome-widget/includes.php").await.is_err());
        assert!(host.activate("../escape.php").await.is_err());
    }

    #[tokio::test]
    async fn remove_deletes_folder_and_active_entry() {
        let (_temp, host) = fixture();
        host.activate("awesome-widget/awesome-widget.php").await.unwrap();

        host.remove("awesome-widget/awesome-widget.php").await.unwrap();
        host.remove("hello.php").await.unwrap();

        assert!(!host.root.join("awesome-widget").exists());
        assert!(!host.root.join("hello.php").exists());
        assert!(!host.is_active("awesome-widget/awesome-widget.php").await.unwrap());
        assert!(host.list_installed().await.unwrap().is_empty());
    }

    #[test]
    fn plugin_file_paths_are_sanitized() {
        assert!(WpPluginHost::sanitize_plugin_file("a/b.php").is_ok());
        assert!(WpPluginHost::sanitize_plugin_file("a/b/c.php").is_err());
        assert!(WpPluginHost::sanitize_plugin_file("../b.php").is_err());
        assert!(WpPluginHost::sanitize_plugin_file("a/b.txt").is_err());
        assert!(WpPluginHost::sanitize_plugin_file("").is_err());
    }
}
