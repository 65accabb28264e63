pub mod filesystem_installer;
pub mod package_fetcher_reqwest;
pub mod wp_plugin_host;
