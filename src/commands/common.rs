//! Data collection shared by every command.
//!
//! One run works on a single snapshot: the remote is fetched once, open and merged PRs
//! are listed once, and the ledger starts from the remote tip of every open PR's head.

use anyhow::{Context, Result};
use tracing::debug;

use crate::gateway::Gateway;
use crate::ledger::HeadShaLedger;
use crate::report::{Event, Reporter, Step};
use crate::tree::{self, StackForest};
use crate::types::PullRequest;

#[derive(Debug)]
pub struct Snapshot {
    pub open: Vec<PullRequest>,
    pub merged: Vec<PullRequest>,
    pub default_branch: String,
    pub ledger: HeadShaLedger,
    pub forest: StackForest,
}

pub fn gather(gateway: &dyn Gateway, reporter: &mut dyn Reporter) -> Result<Snapshot> {
    let message = "Fetching pull requests...".to_string();
    reporter.report(Event::StepStarted {
        step: Step::Fetch,
        message: message.clone(),
    });
    match collect(gateway) {
        Ok(snapshot) => {
            reporter.report(Event::StepFinished {
                step: Step::Fetch,
                message,
            });
            Ok(snapshot)
        }
        Err(e) => {
            reporter.report(Event::StepFailed {
                step: Step::Fetch,
                message,
            });
            Err(e)
        }
    }
}

fn collect(gateway: &dyn Gateway) -> Result<Snapshot> {
    let remote = gateway.remote().to_string();
    gateway
        .fetch()
        .with_context(|| format!("failed to fetch {}", remote))?;
    let open = gateway
        .list_open_prs()
        .context("failed to list pull requests")?;
    let merged = gateway
        .list_merged_prs()
        .context("failed to list merged pull requests")?;
    let default_branch = gateway
        .default_branch()
        .context("failed to determine the default branch")?;

    let mut ledger = HeadShaLedger::new();
    for pr in &open {
        let sha = gateway
            .remote_sha(&pr.head)
            .with_context(|| format!("could not get SHA for {}", pr.head))?;
        ledger.record(&pr.head, &sha);
    }
    debug!("seeded ledger with {} head SHAs", open.len());

    let forest = tree::build(&open, &merged, &default_branch, &ledger, gateway)
        .context("failed to build the dependency tree")?;
    Ok(Snapshot {
        open,
        merged,
        default_branch,
        ledger,
        forest,
    })
}
