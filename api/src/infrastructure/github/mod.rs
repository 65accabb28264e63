pub mod client_reqwest;
pub mod release_cache;
