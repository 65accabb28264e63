pub mod dedupe;
pub mod discovery;
pub mod matcher;
pub mod release_filter;
pub mod sync_gate;
