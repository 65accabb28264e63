use chrono::{DateTime, Utc};

/// Pagination outcome for one topic query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFetch {
    pub topic: String,
    pub pages: u32,
    pub items: usize,
    /// Set when pagination for this topic was aborted.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub topics: Vec<String>,
    pub keyword: String,
    pub max_pages: u32,
    pub lookup_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub topics: Vec<TopicFetch>,
    pub candidates: usize,
    pub unique: usize,
    pub qualified: usize,
    pub persisted: usize,
    pub failed_writes: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn failed_topics(&self) -> impl Iterator<Item = &TopicFetch> {
        self.topics.iter().filter(|t| t.error.is_some())
    }

    pub fn summary(&self) -> String {
        let failed = self.failed_topics().count();
        let mut message = format!(
            "Synced {} of {} qualifying repositories.",
            self.persisted, self.qualified
        );
        if self.failed_writes > 0 {
            message.push_str(&format!(" {} could not be saved.", self.failed_writes));
        }
        if failed > 0 {
            message.push_str(&format!(" {failed} topic queries ended early."));
        }
        message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatus {
    pub cached: i64,
    pub sync_running: bool,
}
