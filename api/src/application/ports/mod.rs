pub mod github_source;
pub mod plugin_host;
pub mod plugin_installer;
pub mod plugin_package_fetcher;
pub mod repository_cache;
