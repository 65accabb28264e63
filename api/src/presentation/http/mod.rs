pub mod auth;
pub mod health;
pub mod plugins;
pub mod repositories;
pub mod responses;
