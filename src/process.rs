//! Breadth-first walk over the stack forest that classifies each PR and repairs the
//! broken ones.
//!
//! Children are only enqueued once their parent has been classified and, if needed,
//! repaired, so a child's divergence check always sees the parent's post-repair SHA in
//! the ledger.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use crate::classify::{classify, PrIndex, Verdict};
use crate::error::RepairError;
use crate::ledger::HeadShaLedger;
use crate::repair::{Executor, RepairOutcome};
use crate::report::Event;
use crate::tree::StackForest;
use crate::types::RepairAction;

/// What happened during one traversal that ran to the end.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// One entry per broken PR, in traversal order.
    pub outcomes: Vec<(u64, RepairOutcome)>,
    pub classification_errors: Vec<(u64, String)>,
}

impl ProcessReport {
    pub fn broken_count(&self) -> usize {
        self.outcomes.len()
    }

    pub fn repaired(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, RepairOutcome::Repaired { .. }))
            .count()
    }

    pub fn declined(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, RepairOutcome::Declined { .. }))
            .count()
    }
}

/// Classify and repair every PR in `forest`, parents before children.
///
/// Stops at the first repair failure (conflict, gateway error, cancellation). A failure
/// to classify one PR is reported and its children are still visited.
pub fn process(
    forest: &StackForest,
    index: &PrIndex<'_>,
    ledger: &mut HeadShaLedger,
    executor: &mut Executor<'_>,
) -> Result<ProcessReport, RepairError> {
    let dry_run = executor.mode().is_dry_run();
    let gateway = executor.gateway();
    let cancel = executor.cancel_token();
    if dry_run {
        executor.reporter().report(Event::DryRunStarted);
    }

    let mut report = ProcessReport::default();
    let mut processed: HashSet<u64> = HashSet::new();
    let mut queue: VecDeque<_> = forest.roots().into_iter().collect();

    while let Some(id) = queue.pop_front() {
        let node = forest.node(id);
        let pr = &node.pr;
        if !processed.insert(pr.number) {
            continue;
        }
        cancel.check()?;

        match classify(pr, index, ledger, gateway, dry_run) {
            Ok(Verdict::Healthy) => debug!("{} is healthy", pr.number_label()),
            Ok(Verdict::Broken {
                reason,
                onto,
                upstream,
            }) => {
                debug!("{} ({}) is broken: {:?}", pr.number_label(), pr.url, reason);
                let action = RepairAction {
                    pr: pr.clone(),
                    onto: onto.unwrap_or_else(|| pr.base.clone()),
                    upstream,
                };
                let outcome = executor.execute(&action, ledger)?;
                report.outcomes.push((pr.number, outcome));
            }
            Err(e) => {
                warn!("could not classify {}: {}", pr.number_label(), e);
                executor.reporter().report(Event::ClassificationFailed {
                    pr: pr.number,
                    error: e.to_string(),
                });
                report.classification_errors.push((pr.number, e.to_string()));
            }
        }

        queue.extend(node.children.iter().copied());
    }

    if report.broken_count() == 0 {
        executor.reporter().report(Event::NoBrokenPrs);
    }
    Ok(report)
}
