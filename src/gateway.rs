//! The oracle operations the stack engine needs from `git` and the code host.
//!
//! Everything the tree builder, classifier and executor know about the repository comes
//! through [`Gateway`]. [`CliGateway`] answers by shelling out to `git`/`gh`; tests use
//! the scripted `fake::FakeGateway`.

use crate::error::GatewayError;
use crate::git::{self, remote_ref, Runner};
use crate::github;
use crate::types::PullRequest;

/// Result of a rebase that ran to completion or stopped on conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebaseOutcome {
    Clean,
    Conflict,
}

pub trait Gateway {
    /// Name of the remote every `<remote>/<branch>` ref is resolved against.
    fn remote(&self) -> &str;

    fn fetch(&self) -> Result<(), GatewayError>;

    /// Open PRs of the current user, ascending by number.
    fn list_open_prs(&self) -> Result<Vec<PullRequest>, GatewayError>;

    /// Recently merged PRs of the current user, ascending by number.
    fn list_merged_prs(&self) -> Result<Vec<PullRequest>, GatewayError>;

    fn default_branch(&self) -> Result<String, GatewayError>;

    /// Commit at the tip of `<remote>/<branch>`.
    fn remote_sha(&self, branch: &str) -> Result<String, GatewayError>;

    fn merge_base(&self, a: &str, b: &str) -> Result<String, GatewayError>;

    /// `false` (not an error) when `ancestor` is cleanly not an ancestor of `descendant`.
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, GatewayError>;

    /// Commits in `base..head`, oldest first.
    fn commits_between(&self, base: &str, head: &str) -> Result<Vec<String>, GatewayError>;

    /// Rebase `branch` onto `<remote>/<onto>`, replaying only commits after `upstream`
    /// when one is given.
    fn rebase(
        &self,
        onto: &str,
        upstream: Option<&str>,
        branch: &str,
    ) -> Result<RebaseOutcome, GatewayError>;

    fn abort_rebase(&self) -> Result<(), GatewayError>;

    fn force_push_with_lease(&self, branch: &str) -> Result<(), GatewayError>;

    fn update_pr_base(&self, number: u64, base: &str) -> Result<(), GatewayError>;
}

/// Gateway backed by the `git` and `gh` executables.
#[derive(Debug)]
pub struct CliGateway {
    runner: Runner,
    remote: String,
    merged_limit: usize,
    default_branch: Option<String>,
}

impl CliGateway {
    pub fn new(
        runner: Runner,
        remote: &str,
        merged_limit: usize,
        default_branch: Option<String>,
    ) -> Self {
        Self {
            runner,
            remote: remote.to_string(),
            merged_limit,
            default_branch,
        }
    }
}

impl Gateway for CliGateway {
    fn remote(&self) -> &str {
        &self.remote
    }

    fn fetch(&self) -> Result<(), GatewayError> {
        git::fetch(&self.runner, &self.remote)
    }

    fn list_open_prs(&self) -> Result<Vec<PullRequest>, GatewayError> {
        github::list_open_prs(&self.runner)
    }

    fn list_merged_prs(&self) -> Result<Vec<PullRequest>, GatewayError> {
        github::list_merged_prs(&self.runner, self.merged_limit)
    }

    fn default_branch(&self) -> Result<String, GatewayError> {
        match &self.default_branch {
            Some(branch) => Ok(branch.clone()),
            None => git::default_branch(&self.runner, &self.remote),
        }
    }

    fn remote_sha(&self, branch: &str) -> Result<String, GatewayError> {
        git::rev_parse(&self.runner, &remote_ref(&self.remote, branch))
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<String, GatewayError> {
        git::merge_base(&self.runner, a, b)
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, GatewayError> {
        git::is_ancestor(&self.runner, ancestor, descendant)
    }

    fn commits_between(&self, base: &str, head: &str) -> Result<Vec<String>, GatewayError> {
        git::commits_between(&self.runner, base, head)
    }

    fn rebase(
        &self,
        onto: &str,
        upstream: Option<&str>,
        branch: &str,
    ) -> Result<RebaseOutcome, GatewayError> {
        // A rebase we did not start is never treated as our conflict, or aborted.
        if git::rebase_in_progress(&self.runner) {
            return Err(GatewayError::RebaseInProgress {
                branch: branch.to_string(),
            });
        }
        let onto = remote_ref(&self.remote, onto);
        let mut args: Vec<&str> = vec!["rebase"];
        match upstream {
            Some(upstream) => args.extend(["--onto", onto.as_str(), upstream, branch]),
            None => args.extend([onto.as_str(), branch]),
        }
        let out = self.runner.run_raw("git", &args)?;
        if out.success() {
            return Ok(RebaseOutcome::Clean);
        }
        if git::is_rebase_conflict(&self.runner, &out) {
            return Ok(RebaseOutcome::Conflict);
        }
        Err(GatewayError::Command {
            tool: "git".to_string(),
            args: git::shellish(&args),
            exit_code: out.exit_code,
            stderr: out.stderr,
        })
    }

    fn abort_rebase(&self) -> Result<(), GatewayError> {
        git::abort_rebase(&self.runner)
    }

    fn force_push_with_lease(&self, branch: &str) -> Result<(), GatewayError> {
        git::push_force_with_lease(&self.runner, &self.remote, branch)
    }

    fn update_pr_base(&self, number: u64, base: &str) -> Result<(), GatewayError> {
        github::update_pr_base(&self.runner, number, base)
    }
}
