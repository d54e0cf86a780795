use anyhow::{Context, Result};
use tracing::info;

use crate::cancel::CancelToken;
use crate::classify::PrIndex;
use crate::commands::common::gather;
use crate::error::RepairError;
use crate::gateway::Gateway;
use crate::process::{process, ProcessReport};
use crate::repair::{Confirm, Executor, Mode};
use crate::report::{Event, Reporter};

#[derive(Debug, PartialEq, Eq)]
pub enum FixStatus {
    Finished(ProcessReport),
    /// A rebase hit conflicts; it was aborted and the manual command reported.
    Conflict { pr: u64 },
}

/// Rebuild the stack tree and repair every broken PR in it.
pub fn fix(
    gateway: &dyn Gateway,
    reporter: &mut dyn Reporter,
    confirm: &mut dyn Confirm,
    cancel: &CancelToken,
    mode: Mode,
) -> Result<FixStatus> {
    let mut snapshot = gather(gateway, reporter)?;
    reporter.report(Event::Forest(snapshot.forest.clone()));

    let index = PrIndex::new(&snapshot.open, &snapshot.merged, &snapshot.default_branch);
    let mut executor = Executor::new(gateway, confirm, reporter, cancel, mode);
    match process(&snapshot.forest, &index, &mut snapshot.ledger, &mut executor) {
        Ok(report) => {
            info!(
                "{} broken, {} repaired, {} declined",
                report.broken_count(),
                report.repaired(),
                report.declined()
            );
            Ok(FixStatus::Finished(report))
        }
        Err(RepairError::RebaseConflict { action, command }) => {
            let pr = action.pr.number;
            executor.reporter().report(Event::Conflict {
                action: *action,
                command,
            });
            Ok(FixStatus::Conflict { pr })
        }
        Err(e) => Err(e).context("failed to repair pull requests"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::FakeGateway;
    use crate::repair::tests::ScriptedConfirm;
    use crate::report::{RecordingReporter, Step};
    use crate::repair::RepairOutcome;
    use crate::types::{merged_pr, pr};

    fn stack() -> FakeGateway {
        FakeGateway::new("main")
            .with_open(pr(56, "stack-1", "stack-2"))
            .with_open(pr(57, "stack-2", "stack-3"))
            .with_merged(merged_pr(55, "main", "stack-1", Some("m55"), &["c1", "c2"]))
            .with_remote_sha("stack-2", "h56")
            .with_remote_sha("stack-3", "h57")
    }

    fn run(gw: &FakeGateway, mode: Mode, answers: &[bool]) -> (Result<FixStatus>, Vec<Event>) {
        let mut reporter = RecordingReporter::default();
        let mut confirm = ScriptedConfirm::new(answers);
        let cancel = CancelToken::new();
        let status = fix(gw, &mut reporter, &mut confirm, &cancel, mode);
        (status, reporter.events)
    }

    #[test]
    fn dry_run_prints_tree_then_planned_repairs() {
        let gw = stack();
        let (status, events) = run(&gw, Mode::DryRun, &[]);

        let FixStatus::Finished(report) = status.expect("fix") else {
            panic!("expected a finished run");
        };
        assert_eq!(report.broken_count(), 2);
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                Event::StepStarted { .. } => "started",
                Event::StepFinished { .. } => "finished",
                Event::Forest(_) => "forest",
                Event::DryRunStarted => "dry-run",
                Event::WouldRepair(_) => "would-repair",
                _ => "other",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["started", "finished", "forest", "dry-run", "would-repair", "would-repair"]
        );
        assert_eq!(gw.calls(), vec!["fetch origin"]);
    }

    #[test]
    fn conflict_is_reported_with_manual_command() {
        let gw = stack().with_conflict("stack-2");
        let (status, events) = run(&gw, Mode::Auto, &[]);

        assert_eq!(status.expect("fix"), FixStatus::Conflict { pr: 56 });
        assert!(events.iter().any(|e| matches!(
            e,
            Event::Conflict { command, .. }
                if command == "git rebase --onto origin/main c2 stack-2"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::StepFailed {
                step: Step::Rebase,
                ..
            }
        )));
    }

    #[test]
    fn interactive_run_repairs_after_confirmation() {
        let gw = stack()
            .with_merge_base("stack-2@rebased", "h57", "h56");
        // #56: rebase, push, base update. #57: rebase, then decline the push.
        let (status, _) = run(&gw, Mode::Interactive, &[true, true, true, true, false]);

        let FixStatus::Finished(report) = status.expect("fix") else {
            panic!("expected a finished run");
        };
        assert_eq!(
            report.outcomes,
            vec![
                (56, RepairOutcome::Repaired { base_updated: true }),
                (57, RepairOutcome::Declined { step: Step::Push }),
            ]
        );
    }

    #[test]
    fn push_failure_is_fatal() {
        let gw = stack().failing("push");
        let (status, _) = run(&gw, Mode::Auto, &[]);

        let err = status.expect_err("push fails");
        assert_eq!(err.to_string(), "failed to repair pull requests");
    }
}
