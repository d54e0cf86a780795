//! Progress events emitted by the engine and the terminal surface that renders them.
//!
//! The processor and executor never print. They emit [`Event`]s into a [`Reporter`];
//! [`TerminalReporter`] turns them into lines on stderr with spinners for long-running
//! steps, and tests capture them with `RecordingReporter`.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Write;
use std::time::Duration;
use tracing::warn;

use crate::style::Style;
use crate::tree::StackForest;
use crate::types::RepairAction;

/// Side-effecting step of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetch,
    Rebase,
    Push,
    UpdateBase,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StepStarted { step: Step, message: String },
    StepFinished { step: Step, message: String },
    StepFailed { step: Step, message: String },
    Forest(StackForest),
    DryRunStarted,
    ClassificationFailed { pr: u64, error: String },
    /// Dry run: the repair that would have been performed.
    WouldRepair(RepairAction),
    /// Interactive mode: the rebase about to be confirmed.
    RebaseProposed {
        action: RepairAction,
        command: String,
        replays: Option<usize>,
    },
    RebaseCompleted,
    /// Interactive mode: the base update about to be confirmed.
    BaseUpdateProposed { action: RepairAction, command: String },
    Declined { pr: u64, step: Step },
    NoBrokenPrs,
    Conflict { action: RepairAction, command: String },
    Failed { message: String },
}

pub trait Reporter {
    fn report(&mut self, event: Event);
}

pub struct TerminalReporter<W: Write> {
    out: W,
    style: Style,
    spinners: bool,
    spinner: Option<ProgressBar>,
}

impl TerminalReporter<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr(), Style::stderr(), true)
    }
}

impl<W: Write> TerminalReporter<W> {
    pub fn new(out: W, style: Style, spinners: bool) -> Self {
        Self {
            out,
            style,
            spinners,
            spinner: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            warn!("failed to write output: {}", e);
        }
    }

    fn start_spinner(&mut self, message: &str) {
        if !self.spinners {
            return;
        }
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(bar);
    }

    fn stop_spinner(&mut self) {
        if let Some(bar) = self.spinner.take() {
            bar.finish_and_clear();
        }
    }
}

impl<W: Write> Reporter for TerminalReporter<W> {
    fn report(&mut self, event: Event) {
        let s = self.style;
        match event {
            Event::StepStarted { message, .. } => self.start_spinner(&message),
            Event::StepFinished { message, .. } => {
                self.stop_spinner();
                self.line(&format!("{} {}", s.success(), message));
            }
            Event::StepFailed { message, .. } => {
                self.stop_spinner();
                self.line(&format!("{} {}", s.failure(), message));
            }
            Event::Forest(forest) if forest.is_empty() => {
                self.line("No open pull requests.");
            }
            Event::Forest(forest) => {
                self.line(&forest.render(&s));
                self.line("");
            }
            Event::DryRunStarted => {
                self.line("Dry run mode enabled. The following PRs would be rebased:")
            }
            Event::ClassificationFailed { pr, error } => {
                self.line(&format!("Error determining state for PR #{}: {}", pr, error))
            }
            Event::WouldRepair(action) => {
                let update = if action.updates_base() {
                    format!(" (update base branch to {})", s.base(&action.onto))
                } else {
                    String::new()
                };
                self.line(&format!("  {}{}", s.pr(&action.pr), update));
            }
            Event::RebaseProposed {
                action,
                command,
                replays,
            } => {
                self.line(&format!(
                    "PR {} needs to be rebased onto {}",
                    s.pr(&action.pr),
                    s.base(&action.onto)
                ));
                if let Some(n) = replays {
                    let plural = if n == 1 { "commit" } else { "commits" };
                    self.line(&format!("  {} {} will be replayed", n, plural));
                }
                self.line(&format!("  Suggested command: {}", s.command(&command)));
            }
            Event::RebaseCompleted => self.line("Rebase completed successfully."),
            Event::BaseUpdateProposed { action, command } => {
                self.line(&format!(
                    "Branch {} needs to be updated to base branch {}",
                    s.head(&action.pr.head),
                    s.base(&action.onto)
                ));
                self.line(&format!("  Suggested command: {}", s.command(&command)));
            }
            Event::Declined { step, .. } => match step {
                Step::Push => self.line("Skipping push and PR update."),
                Step::UpdateBase => self.line("Skipping base branch update."),
                Step::Rebase | Step::Fetch => self.line("Skipping."),
            },
            Event::NoBrokenPrs => self.line(&format!("{} No broken PRs found.", s.success())),
            Event::Conflict { action, command } => {
                self.stop_spinner();
                self.line(&format!(
                    "{} Failed to handle broken PR {} due to rebase conflicts.",
                    s.failure(),
                    s.number(&action.pr)
                ));
                self.line("  Please resolve the conflicts manually and re-run the tool if needed.");
                self.line("  You can use the following command to rebase manually:");
                self.line(&format!("      {}", s.command(&command)));
            }
            Event::Failed { message } => {
                self.stop_spinner();
                self.line(&format!("{} {}", s.failure(), message));
            }
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    pub events: Vec<Event>,
}

#[cfg(test)]
impl Reporter for RecordingReporter {
    fn report(&mut self, event: Event) {
        self.events.push(event);
    }
}
