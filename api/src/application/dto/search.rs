use crate::application::services::matcher::{InstallationMatch, MatchTier};
use crate::domain::repositories::repository::RepositoryRecord;

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub topics: Vec<String>,
    pub live_fallback: bool,
    pub live_max_pages: u32,
    pub lookup_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub term: String,
    pub page: usize,
    pub per_page: usize,
}

/// A cached repository annotated with local installation state.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub record: RepositoryRecord,
    pub is_installed: bool,
    pub is_active: bool,
    pub plugin_file: Option<String>,
    pub match_tier: Option<MatchTier>,
    pub ambiguous: bool,
}

impl SearchResult {
    pub fn new(record: RepositoryRecord, found: Option<InstallationMatch>) -> Self {
        match found {
            Some(m) => Self {
                record,
                is_installed: true,
                is_active: m.is_active,
                ambiguous: m.is_ambiguous(),
                match_tier: Some(m.tier),
                plugin_file: Some(m.plugin_file),
            },
            None => Self {
                record,
                is_installed: false,
                is_active: false,
                plugin_file: None,
                match_tier: None,
                ambiguous: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Cache,
    Live,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSource::Cache => "cache",
            ResultSource::Live => "live",
        }
    }
}

/// Why a search came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    EmptyDb,
    NoMatch,
}

impl EmptyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmptyReason::EmptyDb => "empty_db",
            EmptyReason::NoMatch => "no_match",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchPage {
    pub results: Vec<SearchResult>,
    pub source: ResultSource,
    pub reason: Option<EmptyReason>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl SearchPage {
    pub fn empty(reason: EmptyReason, page: usize, per_page: usize) -> Self {
        Self {
            results: Vec::new(),
            source: ResultSource::Cache,
            reason: Some(reason),
            page,
            per_page,
            total: 0,
        }
    }

    pub fn total_pages(&self) -> usize {
        if self.per_page == 0 {
            0
        } else {
            self.total.div_ceil(self.per_page)
        }
    }
}
