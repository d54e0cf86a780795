//! Broken-PR classification.
//!
//! A PR is broken when its declared base no longer describes the history it should sit
//! on. The checks run in a fixed order and the first match wins:
//!
//! 1. its base branch is the head of a merged PR (squash merges additionally produce an
//!    upstream boundary for a three-point rebase);
//! 2. in a dry run, its parent PR was already marked as rebased earlier in the same run;
//! 3. its parent PR's tip is no longer the fork point of this PR (the parent moved);
//! 4. it targets the default branch but forked from a commit that belongs to a merged PR.
//!
//! Check 4 is a best-effort heuristic on exact SHA membership. It misfires when the
//! default branch was rewritten independently of any tracked merge.

use std::collections::HashMap;

use tracing::debug;

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::git::remote_ref;
use crate::ledger::HeadShaLedger;
use crate::types::PullRequest;

/// Why a PR was classified as broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokenReason {
    BaseMerged,
    BaseSquashMerged,
    ParentSimulated,
    ParentMoved,
    ForkedFromMergedPr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Healthy,
    Broken {
        reason: BrokenReason,
        /// New base; `None` keeps the PR's current base.
        onto: Option<String>,
        upstream: Option<String>,
    },
}

/// Lookup tables over one run's PR snapshot.
#[derive(Debug)]
pub struct PrIndex<'a> {
    open_by_head: HashMap<&'a str, &'a PullRequest>,
    merged_by_head: HashMap<&'a str, &'a PullRequest>,
    merged: &'a [PullRequest],
    default_branch: &'a str,
}

impl<'a> PrIndex<'a> {
    pub fn new(open: &'a [PullRequest], merged: &'a [PullRequest], default_branch: &'a str) -> Self {
        let mut open_by_head = HashMap::new();
        for pr in open {
            open_by_head.entry(pr.head.as_str()).or_insert(pr);
        }
        Self {
            open_by_head,
            merged_by_head: merged.iter().map(|pr| (pr.head.as_str(), pr)).collect(),
            merged,
            default_branch,
        }
    }

    /// The open PR this PR is stacked on, if any.
    pub fn parent_of(&self, pr: &PullRequest) -> Option<&'a PullRequest> {
        self.open_by_head
            .get(pr.base.as_str())
            .copied()
            .filter(|parent| parent.number != pr.number)
    }

    pub fn merged_with_head(&self, head: &str) -> Option<&'a PullRequest> {
        self.merged_by_head.get(head).copied()
    }

    pub fn default_branch(&self) -> &str {
        self.default_branch
    }
}

pub fn classify(
    pr: &PullRequest,
    index: &PrIndex<'_>,
    ledger: &HeadShaLedger,
    gateway: &dyn Gateway,
    dry_run: bool,
) -> Result<Verdict, GatewayError> {
    let parent = index.parent_of(pr);

    if parent.is_none() {
        if let Some(base_pr) = index.merged_with_head(&pr.base) {
            return on_merged_base(base_pr, gateway);
        }
    }

    if let Some(parent) = parent {
        if dry_run && ledger.is_simulated(&parent.head) {
            debug!("#{}: parent #{} was rebased in this dry run", pr.number, parent.number);
            return Ok(broken(BrokenReason::ParentSimulated, None, None));
        }
        let parent_sha = match ledger.get(&parent.head) {
            Some(sha) => sha.to_string(),
            None => gateway.remote_sha(&parent.head)?,
        };
        let head = head_ref(pr, ledger, gateway);
        let fork_point = gateway.merge_base(&parent_sha, &head)?;
        if fork_point != parent_sha {
            debug!(
                "#{}: forked from {} but {} is now at {}",
                pr.number, fork_point, parent.head, parent_sha
            );
            return Ok(broken(BrokenReason::ParentMoved, None, None));
        }
    }

    if pr.base == index.default_branch() {
        let head = head_ref(pr, ledger, gateway);
        let fork_point =
            gateway.merge_base(&remote_ref(gateway.remote(), index.default_branch()), &head)?;
        if let Some(merged) = index
            .merged
            .iter()
            .find(|m| m.commits.iter().any(|c| *c == fork_point))
        {
            debug!(
                "#{}: forked from {} which belongs to merged #{}",
                pr.number, fork_point, merged.number
            );
            return Ok(broken(
                BrokenReason::ForkedFromMergedPr,
                Some(merged.base.clone()),
                None,
            ));
        }
    }

    Ok(Verdict::Healthy)
}

fn on_merged_base(base_pr: &PullRequest, gateway: &dyn Gateway) -> Result<Verdict, GatewayError> {
    if let (Some(merge_commit), Some(last)) = (&base_pr.merge_commit, base_pr.last_commit()) {
        if !gateway.is_ancestor(last, merge_commit)? {
            // Squash merge: the branch's commits never reached the base, so replay only
            // what comes after them.
            return Ok(broken(
                BrokenReason::BaseSquashMerged,
                Some(base_pr.base.clone()),
                Some(last.to_string()),
            ));
        }
    }
    Ok(broken(BrokenReason::BaseMerged, Some(base_pr.base.clone()), None))
}

fn broken(reason: BrokenReason, onto: Option<String>, upstream: Option<String>) -> Verdict {
    Verdict::Broken {
        reason,
        onto,
        upstream,
    }
}

/// Ledger SHA of the PR's head, or its remote ref when the ledger has no entry.
fn head_ref(pr: &PullRequest, ledger: &HeadShaLedger, gateway: &dyn Gateway) -> String {
    ledger
        .get(&pr.head)
        .map(str::to_string)
        .unwrap_or_else(|| remote_ref(gateway.remote(), &pr.head))
}
