pub mod cache_status;
pub mod clear_cache;
pub mod search_repositories;
pub mod stream_live_search;
pub mod sync_repositories;
