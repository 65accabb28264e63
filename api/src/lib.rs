// Module layout (Clean Architecture style)
// - bootstrap: configuration and startup
// - infrastructure: Postgres cache, GitHub client and WordPress filesystem adapters
// - presentation: HTTP handlers and routing
// - application: ports, use cases and discovery/matching services
// - domain: core models

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
