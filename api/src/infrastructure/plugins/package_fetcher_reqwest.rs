use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::plugin_package_fetcher::PluginPackageFetcher;

pub struct ReqwestPluginPackageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl ReqwestPluginPackageFetcher {
    pub fn new(user_agent: &str, timeout: Duration, max_bytes: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, max_bytes })
    }
}

#[async_trait]
impl PluginPackageFetcher for ReqwestPluginPackageFetcher {
    async fn fetch(&self, url: &str, token: Option<&str>) -> anyhow::Result<Vec<u8>> {
        let mut req = self.client.get(url);
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        let mut resp = req
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("request failed: {e}"))?;
        if !resp.status().is_success() {
            anyhow::bail!("upstream returned status {}", resp.status());
        }
        if let Some(len) = resp.content_length() {
            if len > self.max_bytes as u64 {
                anyhow::bail!("package is {len} bytes, limit is {}", self.max_bytes);
            }
        }
        let mut body = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| anyhow::anyhow!("failed to read body: {e}"))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                anyhow::bail!("package exceeds limit of {} bytes", self.max_bytes);
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}
