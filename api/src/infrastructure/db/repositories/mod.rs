pub mod repository_cache_sqlx;
