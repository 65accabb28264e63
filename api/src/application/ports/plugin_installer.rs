use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    /// Folder created under the plugins directory.
    pub folder_name: String,
}

#[derive(thiserror::Error, Debug)]
pub enum PluginInstallError {
    #[error("invalid plugin package")]
    InvalidPackage(#[source] anyhow::Error),
    #[error("no files found in the plugin package")]
    EmptyPackage,
    #[error("failed to persist plugin package")]
    Storage(#[source] anyhow::Error),
}

#[async_trait]
pub trait PluginInstaller: Send + Sync {
    /// Extracts `archive` into the plugins directory, replacing any existing
    /// folder of the same name. `fallback_folder` names the result when the
    /// archive has no usable root folder, or when its root is the
    /// `{zipball_prefix}{sha}` folder of a GitHub source zipball.
    async fn install(
        &self,
        archive: &[u8],
        fallback_folder: &str,
        zipball_prefix: Option<&str>,
    ) -> Result<InstalledPackage, PluginInstallError>;
}
