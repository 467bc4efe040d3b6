use std::{collections::HashMap, sync::Mutex};

use tracing::debug;

use crate::{
    domain::IssueKey,
    issue::{Issue, RawIssue},
};

/// Process-lifetime dedup map of every issue the new-issue poll has seen.
///
/// There is no eviction: once a key is registered it is never returned by
/// [`IssueCache::filter_new`] again. The lock is never held across an await.
#[derive(Debug, Default)]
pub struct IssueCache {
    seen: Mutex<HashMap<IssueKey, Issue>>,
}

impl IssueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register unseen issues and return them in arrival order.
    pub fn filter_new(&self, raw: Vec<RawIssue>) -> Vec<Issue> {
        let mut seen = self.lock();
        let mut fresh = Vec::new();
        for r in raw {
            let key = IssueKey(r.key.clone());
            if seen.contains_key(&key) {
                debug!(%key, "jira issue already in cache, skipping");
                continue;
            }
            let issue = Issue::from(r);
            debug!(%key, "fetched jira issue");
            seen.insert(key, issue.clone());
            fresh.push(issue);
        }
        fresh
    }

    pub fn get(&self, key: &IssueKey) -> Option<Issue> {
        self.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &IssueKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<IssueKey, Issue>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.seen.lock().unwrap_or_else(|e| e.into_inner())
    }
}
