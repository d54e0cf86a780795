//! Repair of one broken PR: rebase, force-push, refresh the ledger, repoint the base.
//!
//! In interactive mode every side-effecting step is preceded by the equivalent manual
//! command and a confirmation. Declining is not an error: it ends the repair of this PR
//! and the run moves on to the next one. A rebase conflict is aborted on the spot and
//! ends the run.

use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{GatewayError, RepairError};
use crate::gateway::{Gateway, RebaseOutcome};
use crate::git::remote_ref;
use crate::ledger::HeadShaLedger;
use crate::report::{Event, Reporter, Step};
use crate::types::RepairAction;

/// How repairs are carried out. Auto-approve and dry run are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    DryRun,
    Interactive,
    Auto,
}

impl Mode {
    pub fn is_dry_run(self) -> bool {
        self == Self::DryRun
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// Dry run: nothing was touched, the ledger holds the sentinel.
    Simulated,
    Repaired { base_updated: bool },
    /// The user declined `step`; later steps were not attempted.
    Declined { step: Step },
}

/// Yes/no confirmation before a side-effecting step.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool, RepairError>;
}

/// Confirmation on the terminal, defaulting to "no".
#[derive(Debug, Default)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool, RepairError> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(RepairError::Prompt)
    }
}

pub struct Executor<'a> {
    gateway: &'a dyn Gateway,
    confirm: &'a mut dyn Confirm,
    reporter: &'a mut dyn Reporter,
    cancel: &'a CancelToken,
    mode: Mode,
}

impl<'a> Executor<'a> {
    pub fn new(
        gateway: &'a dyn Gateway,
        confirm: &'a mut dyn Confirm,
        reporter: &'a mut dyn Reporter,
        cancel: &'a CancelToken,
        mode: Mode,
    ) -> Self {
        Self {
            gateway,
            confirm,
            reporter,
            cancel,
            mode,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn gateway(&self) -> &'a dyn Gateway {
        self.gateway
    }

    pub fn cancel_token(&self) -> &'a CancelToken {
        self.cancel
    }

    pub fn reporter(&mut self) -> &mut (dyn Reporter + 'a) {
        &mut *self.reporter
    }

    pub fn execute(
        &mut self,
        action: &RepairAction,
        ledger: &mut HeadShaLedger,
    ) -> Result<RepairOutcome, RepairError> {
        if self.mode.is_dry_run() {
            self.reporter.report(Event::WouldRepair(action.clone()));
            ledger.mark_simulated(&action.pr.head);
            return Ok(RepairOutcome::Simulated);
        }
        let remote = self.gateway.remote().to_string();
        let pr = &action.pr;

        self.cancel.check()?;
        if self.interactive() {
            let replays = self.replay_count(action, &remote);
            self.reporter.report(Event::RebaseProposed {
                action: action.clone(),
                command: action.rebase_command(&remote),
                replays,
            });
            if !self.ask("Run this command?")? {
                return Ok(self.declined(pr.number, Step::Rebase));
            }
        }
        let message = format!("Rebasing {} onto {}...", pr, action.onto);
        self.started(Step::Rebase, &message);
        let outcome = self
            .gateway
            .rebase(&action.onto, action.upstream.as_deref(), &pr.head)
            .map_err(|e| self.failed(Step::Rebase, &message, e))?;
        if outcome == RebaseOutcome::Conflict {
            self.reporter.report(Event::StepFailed {
                step: Step::Rebase,
                message,
            });
            self.gateway
                .abort_rebase()
                .map_err(|source| RepairError::AbortFailed {
                    branch: pr.head.clone(),
                    source,
                })?;
            return Err(RepairError::RebaseConflict {
                command: action.rebase_command(&remote),
                action: Box::new(action.clone()),
            });
        }
        self.finished(Step::Rebase, message);

        self.cancel.check()?;
        if self.interactive() {
            self.reporter.report(Event::RebaseCompleted);
            if !self.ask("Continue to push the rebased branch and update the PR?")? {
                return Ok(self.declined(pr.number, Step::Push));
            }
        }
        let message = format!("Pushing {}...", pr.number_label());
        self.started(Step::Push, &message);
        self.gateway
            .force_push_with_lease(&pr.head)
            .map_err(|e| self.failed(Step::Push, &message, e))?;
        self.finished(Step::Push, message);

        let new_sha = self.gateway.remote_sha(&pr.head)?;
        debug!("{} is now at {}", remote_ref(&remote, &pr.head), new_sha);
        ledger.record(&pr.head, &new_sha);

        if !action.updates_base() {
            return Ok(RepairOutcome::Repaired {
                base_updated: false,
            });
        }
        self.cancel.check()?;
        if self.interactive() {
            self.reporter.report(Event::BaseUpdateProposed {
                action: action.clone(),
                command: action.base_update_command(),
            });
            if !self.ask("Run this command?")? {
                return Ok(self.declined(pr.number, Step::UpdateBase));
            }
        }
        let message = format!(
            "Updating base branch of {} to {}...",
            pr.number_label(),
            action.onto
        );
        self.started(Step::UpdateBase, &message);
        self.gateway
            .update_pr_base(pr.number, &action.onto)
            .map_err(|e| self.failed(Step::UpdateBase, &message, e))?;
        self.finished(Step::UpdateBase, message);

        Ok(RepairOutcome::Repaired { base_updated: true })
    }

    fn interactive(&self) -> bool {
        self.mode == Mode::Interactive
    }

    fn ask(&mut self, prompt: &str) -> Result<bool, RepairError> {
        let answer = self.confirm.confirm(prompt)?;
        // The prompt may have blocked for a while; honour an interrupt that arrived meanwhile.
        self.cancel.check()?;
        Ok(answer)
    }

    /// Number of commits the rebase will replay, when the gateway can tell.
    fn replay_count(&self, action: &RepairAction, remote: &str) -> Option<usize> {
        let from = action
            .upstream
            .clone()
            .unwrap_or_else(|| remote_ref(remote, &action.onto));
        self.gateway
            .commits_between(&from, &remote_ref(remote, &action.pr.head))
            .map(|commits| commits.len())
            .map_err(|e| debug!("could not count commits to replay: {}", e))
            .ok()
    }

    fn declined(&mut self, pr: u64, step: Step) -> RepairOutcome {
        self.reporter.report(Event::Declined { pr, step });
        RepairOutcome::Declined { step }
    }

    fn started(&mut self, step: Step, message: &str) {
        self.reporter.report(Event::StepStarted {
            step,
            message: message.to_string(),
        });
    }

    fn finished(&mut self, step: Step, message: String) {
        self.reporter.report(Event::StepFinished { step, message });
    }

    fn failed(&mut self, step: Step, message: &str, error: GatewayError) -> RepairError {
        self.reporter.report(Event::StepFailed {
            step,
            message: message.to_string(),
        });
        RepairError::Gateway(error)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gateway::fake::FakeGateway;
    use crate::report::RecordingReporter;
    use crate::types::pr;
    use std::collections::VecDeque;

    /// Answers prompts from a script; panics when it runs out.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedConfirm {
        pub answers: VecDeque<bool>,
        pub prompts: Vec<String>,
    }

    impl ScriptedConfirm {
        pub(crate) fn new(answers: &[bool]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                prompts: vec![],
            }
        }
    }

    impl Confirm for ScriptedConfirm {
        fn confirm(&mut self, prompt: &str) -> Result<bool, RepairError> {
            self.prompts.push(prompt.to_string());
            Ok(self
                .answers
                .pop_front()
                .expect("unexpected confirmation prompt"))
        }
    }

    fn squash_repair() -> RepairAction {
        RepairAction {
            pr: pr(56, "stack-1", "stack-2"),
            onto: "main".to_string(),
            upstream: Some("c2".to_string()),
        }
    }

    fn run(
        gw: &FakeGateway,
        confirm: &mut ScriptedConfirm,
        mode: Mode,
        action: &RepairAction,
        ledger: &mut HeadShaLedger,
    ) -> (Result<RepairOutcome, RepairError>, Vec<Event>) {
        let mut reporter = RecordingReporter::default();
        let cancel = CancelToken::new();
        let result = {
            let mut executor = Executor::new(gw, confirm, &mut reporter, &cancel, mode);
            executor.execute(action, ledger)
        };
        (result, reporter.events)
    }

    #[test]
    fn dry_run_only_marks_the_ledger() {
        let gw = FakeGateway::new("main");
        let mut confirm = ScriptedConfirm::default();
        let mut ledger: HeadShaLedger = [("stack-2", "h56")].into_iter().collect();

        let (result, events) = run(&gw, &mut confirm, Mode::DryRun, &squash_repair(), &mut ledger);
        assert_eq!(result.expect("dry run"), RepairOutcome::Simulated);
        assert!(ledger.is_simulated("stack-2"));
        assert!(gw.calls().is_empty());
        assert_eq!(events, vec![Event::WouldRepair(squash_repair())]);
    }

    #[test]
    fn auto_mode_rebases_pushes_and_updates_base() {
        let gw = FakeGateway::new("main").with_remote_sha("stack-2", "h56");
        let mut confirm = ScriptedConfirm::default();
        let mut ledger: HeadShaLedger = [("stack-2", "h56")].into_iter().collect();

        let (result, events) = run(&gw, &mut confirm, Mode::Auto, &squash_repair(), &mut ledger);
        assert_eq!(
            result.expect("repair"),
            RepairOutcome::Repaired { base_updated: true }
        );
        assert_eq!(
            gw.calls(),
            vec![
                "rebase --onto origin/main c2 stack-2",
                "push --force-with-lease origin stack-2",
                "pr edit 56 --base main",
            ]
        );
        assert_eq!(ledger.get("stack-2"), Some("stack-2@rebased"));
        assert!(confirm.prompts.is_empty());

        let finished: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                Event::StepFinished { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            finished,
            vec![
                "Rebasing #56 pr 56 (stack-1 ← stack-2) onto main...",
                "Pushing #56...",
                "Updating base branch of #56 to main...",
            ]
        );
    }

    #[test]
    fn same_base_repair_skips_base_update() {
        let gw = FakeGateway::new("main").with_remote_sha("stack-3", "h57");
        let mut confirm = ScriptedConfirm::default();
        let mut ledger = HeadShaLedger::new();
        let action = RepairAction {
            pr: pr(57, "stack-2", "stack-3"),
            onto: "stack-2".to_string(),
            upstream: None,
        };

        let (result, _) = run(&gw, &mut confirm, Mode::Auto, &action, &mut ledger);
        assert_eq!(
            result.expect("repair"),
            RepairOutcome::Repaired {
                base_updated: false
            }
        );
        assert_eq!(
            gw.calls(),
            vec![
                "rebase origin/stack-2 stack-3",
                "push --force-with-lease origin stack-3",
            ]
        );
    }

    #[test]
    fn declining_push_stops_after_rebase() {
        let gw = FakeGateway::new("main")
            .with_remote_sha("stack-2", "h56")
            .with_range("c2", "origin/stack-2", &["c3"]);
        let mut confirm = ScriptedConfirm::new(&[true, false]);
        let mut ledger: HeadShaLedger = [("stack-2", "h56")].into_iter().collect();

        let (result, events) =
            run(&gw, &mut confirm, Mode::Interactive, &squash_repair(), &mut ledger);
        assert_eq!(
            result.expect("declined is not an error"),
            RepairOutcome::Declined { step: Step::Push }
        );
        assert_eq!(gw.calls(), vec!["rebase --onto origin/main c2 stack-2"]);
        assert_eq!(ledger.get("stack-2"), Some("h56"));
        assert_eq!(
            confirm.prompts,
            vec![
                "Run this command?",
                "Continue to push the rebased branch and update the PR?",
            ]
        );
        assert!(events.contains(&Event::RebaseProposed {
            action: squash_repair(),
            command: "git rebase --onto origin/main c2 stack-2".to_string(),
            replays: Some(1),
        }));
        assert!(events.contains(&Event::Declined {
            pr: 56,
            step: Step::Push
        }));
    }

    #[test]
    fn declining_rebase_touches_nothing() {
        let gw = FakeGateway::new("main");
        let mut confirm = ScriptedConfirm::new(&[false]);
        let mut ledger = HeadShaLedger::new();

        let (result, events) =
            run(&gw, &mut confirm, Mode::Interactive, &squash_repair(), &mut ledger);
        assert_eq!(
            result.expect("declined"),
            RepairOutcome::Declined { step: Step::Rebase }
        );
        assert!(gw.calls().is_empty());
        // Commit count is best effort; the fake has no range scripted.
        assert!(events.iter().any(|e| matches!(
            e,
            Event::RebaseProposed { replays: None, .. }
        )));
    }

    #[test]
    fn declining_base_update_keeps_push() {
        let gw = FakeGateway::new("main").with_remote_sha("stack-2", "h56");
        let mut confirm = ScriptedConfirm::new(&[true, true, false]);
        let mut ledger = HeadShaLedger::new();

        let (result, events) =
            run(&gw, &mut confirm, Mode::Interactive, &squash_repair(), &mut ledger);
        assert_eq!(
            result.expect("declined"),
            RepairOutcome::Declined {
                step: Step::UpdateBase
            }
        );
        assert_eq!(ledger.get("stack-2"), Some("stack-2@rebased"));
        assert!(events.contains(&Event::BaseUpdateProposed {
            action: squash_repair(),
            command: "gh pr edit 56 --base main".to_string(),
        }));
        assert!(!gw.calls().iter().any(|c| c.starts_with("pr edit")));
    }

    #[test]
    fn conflict_aborts_rebase_and_reports_manual_command() {
        let gw = FakeGateway::new("main").with_conflict("stack-2");
        let mut confirm = ScriptedConfirm::default();
        let mut ledger = HeadShaLedger::new();

        let (result, _) = run(&gw, &mut confirm, Mode::Auto, &squash_repair(), &mut ledger);
        match result {
            Err(RepairError::RebaseConflict { action, command }) => {
                assert_eq!(action.pr.number, 56);
                assert_eq!(command, "git rebase --onto origin/main c2 stack-2");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(
            gw.calls(),
            vec!["rebase --onto origin/main c2 stack-2", "rebase --abort"]
        );
    }

    #[test]
    fn failed_abort_is_surfaced() {
        let gw = FakeGateway::new("main")
            .with_conflict("stack-2")
            .failing("abort_rebase");
        let mut confirm = ScriptedConfirm::default();
        let mut ledger = HeadShaLedger::new();

        let (result, _) = run(&gw, &mut confirm, Mode::Auto, &squash_repair(), &mut ledger);
        assert!(matches!(result, Err(RepairError::AbortFailed { .. })));
    }

    #[test]
    fn push_failure_is_a_gateway_error() {
        let gw = FakeGateway::new("main").failing("push");
        let mut confirm = ScriptedConfirm::default();
        let mut ledger = HeadShaLedger::new();

        let (result, events) = run(&gw, &mut confirm, Mode::Auto, &squash_repair(), &mut ledger);
        assert!(matches!(result, Err(RepairError::Gateway(_))));
        assert!(events.contains(&Event::StepFailed {
            step: Step::Push,
            message: "Pushing #56...".to_string(),
        }));
    }

    #[test]
    fn cancelled_run_issues_no_mutations() {
        let gw = FakeGateway::new("main");
        let mut confirm = ScriptedConfirm::default();
        let mut reporter = RecordingReporter::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut ledger = HeadShaLedger::new();

        let result = Executor::new(&gw, &mut confirm, &mut reporter, &cancel, Mode::Auto)
            .execute(&squash_repair(), &mut ledger);
        assert!(matches!(result, Err(RepairError::Cancelled)));
        assert!(gw.calls().is_empty());
    }
}
