pub mod plugins;
pub mod repositories;
