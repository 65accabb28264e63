use async_trait::async_trait;

#[async_trait]
pub trait PluginPackageFetcher: Send + Sync {
    /// Downloads a release archive. `token` is only sent when the caller
    /// trusts the host with it.
    async fn fetch(&self, url: &str, token: Option<&str>) -> anyhow::Result<Vec<u8>>;
}
