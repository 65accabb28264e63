use std::collections::HashSet;

use crate::application::ports::github_source::RawRepository;

/// Keeps the first occurrence of every `repo_id`; the same repository comes
/// back once per matching topic query.
pub fn dedupe_by_repo_id(repos: Vec<RawRepository>) -> Vec<RawRepository> {
    let mut seen = HashSet::with_capacity(repos.len());
    repos.into_iter().filter(|r| seen.insert(r.id)).collect()
}
