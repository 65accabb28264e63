pub mod db;
pub mod github;
pub mod plugins;
