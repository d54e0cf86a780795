//! Head-SHA ledger: the last known remote tip of every open PR's head branch.
//!
//! The ledger is the only state that changes during a run. The executor refreshes an
//! entry after every successful push, and in dry-run mode overwrites it with
//! [`SIMULATED_SHA`] so that descendants classified later in the same run can see that
//! their parent would have moved.

use std::collections::HashMap;

/// Placeholder written for a branch that a dry run would have rebased.
pub const SIMULATED_SHA: &str = "dummy-sha-after-rebase";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadShaLedger {
    shas: HashMap<String, String>,
}

impl HeadShaLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, branch: &str) -> Option<&str> {
        self.shas.get(branch).map(String::as_str)
    }

    pub fn record(&mut self, branch: &str, sha: &str) {
        self.shas.insert(branch.to_string(), sha.to_string());
    }

    pub fn mark_simulated(&mut self, branch: &str) {
        self.record(branch, SIMULATED_SHA);
    }

    pub fn is_simulated(&self, branch: &str) -> bool {
        self.get(branch) == Some(SIMULATED_SHA)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeadShaLedger {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            shas: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
