//! Core types shared by the tree builder, classifier and executor.

use serde::Deserialize;
use std::fmt;

/// Pull request state as reported by `gh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Merged => write!(f, "merged"),
        }
    }
}

/// Snapshot of one pull request, fetched once per run and never mutated.
///
/// `commits` is ordered oldest to newest. `merge_commit` is `None` for open PRs and for
/// merges where the hosting side did not record a merge commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub author: String,
    pub state: PrState,
    pub is_draft: bool,
    pub base: String,
    pub head: String,
    pub merge_commit: Option<String>,
    pub commits: Vec<String>,
}

impl PullRequest {
    pub fn number_label(&self) -> String {
        format!("#{}", self.number)
    }

    pub fn first_commit(&self) -> Option<&str> {
        self.commits.first().map(String::as_str)
    }

    pub fn last_commit(&self) -> Option<&str> {
        self.commits.last().map(String::as_str)
    }
}

impl fmt::Display for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({} ← {})",
            self.number, self.title, self.base, self.head
        )
    }
}

/// A broken PR together with where it has to be rebased to.
///
/// `upstream` is only set when the PR sat on a squash-merged branch: the rebase then
/// replays just the commits after that boundary instead of everything since the fork point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairAction {
    pub pr: PullRequest,
    pub onto: String,
    pub upstream: Option<String>,
}

impl RepairAction {
    /// Whether the PR's declared base has to be repointed after the rebase.
    pub fn updates_base(&self) -> bool {
        self.pr.base != self.onto
    }

    /// The `git rebase` invocation equivalent to this repair.
    pub fn rebase_command(&self, remote: &str) -> String {
        match &self.upstream {
            Some(upstream) => format!(
                "git rebase --onto {}/{} {} {}",
                remote, self.onto, upstream, self.pr.head
            ),
            None => format!("git rebase {}/{} {}", remote, self.onto, self.pr.head),
        }
    }

    /// The `gh` invocation equivalent to the base update.
    pub fn base_update_command(&self) -> String {
        format!("gh pr edit {} --base {}", self.pr.number, self.onto)
    }
}

#[cfg(test)]
pub(crate) fn pr(number: u64, base: &str, head: &str) -> PullRequest {
    PullRequest {
        number,
        title: format!("pr {}", number),
        url: format!("https://github.com/acme/widgets/pull/{}", number),
        author: "octocat".to_string(),
        state: PrState::Open,
        is_draft: false,
        base: base.to_string(),
        head: head.to_string(),
        merge_commit: None,
        commits: vec![],
    }
}

#[cfg(test)]
pub(crate) fn merged_pr(
    number: u64,
    base: &str,
    head: &str,
    merge_commit: Option<&str>,
    commits: &[&str],
) -> PullRequest {
    PullRequest {
        state: PrState::Merged,
        merge_commit: merge_commit.map(str::to_string),
        commits: commits.iter().map(|c| c.to_string()).collect(),
        ..pr(number, base, head)
    }
}
