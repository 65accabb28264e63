use std::path::Path;

/// A plugin as the WordPress host sees it. Recomputed on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPluginDescriptor {
    /// Path relative to the plugins directory, e.g. `akismet/akismet.php`.
    pub plugin_file: String,
    /// Declared `Plugin Name:` header.
    pub name: String,
    pub active: bool,
}

impl InstalledPluginDescriptor {
    /// Containing folder, `None` for single-file plugins at the root.
    pub fn folder(&self) -> Option<&str> {
        self.plugin_file
            .rsplit_once('/')
            .map(|(folder, _)| folder)
            .filter(|f| !f.is_empty())
    }

    /// Main file name without its extension.
    pub fn basename(&self) -> &str {
        Path::new(&self.plugin_file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.plugin_file)
    }
}
