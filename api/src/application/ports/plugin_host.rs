use async_trait::async_trait;

use crate::domain::plugins::installed_plugin::InstalledPluginDescriptor;

/// The WordPress installation whose plugins directory this service manages.
#[async_trait]
pub trait PluginHost: Send + Sync {
    async fn list_installed(&self) -> anyhow::Result<Vec<InstalledPluginDescriptor>>;

    async fn activate(&self, plugin_file: &str) -> anyhow::Result<()>;

    async fn deactivate(&self, plugin_file: &str) -> anyhow::Result<()>;

    async fn is_active(&self, plugin_file: &str) -> anyhow::Result<bool>;

    /// Deletes the plugin's folder (or file, for single-file plugins).
    async fn remove(&self, plugin_file: &str) -> anyhow::Result<()>;
}
