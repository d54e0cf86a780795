//! Terminal colours for PR labels, branch names and status marks.

use owo_colors::{OwoColorize, Stream};

use crate::types::PullRequest;

pub const CHECK: &str = "✔";
pub const CROSS: &str = "✘";

/// Colours are applied only when enabled and stderr supports them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Style {
    color: bool,
}

impl Style {
    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn stderr() -> Self {
        Self { color: true }
    }

    fn paint(&self, text: &str, f: impl Fn(&str) -> String) -> String {
        if self.color {
            text.if_supports_color(Stream::Stderr, |t| f(t)).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint(text, |t| t.bold().to_string())
    }

    pub fn base(&self, text: &str) -> String {
        self.paint(text, |t| t.cyan().to_string())
    }

    pub fn head(&self, text: &str) -> String {
        self.paint(text, |t| t.blue().to_string())
    }

    pub fn command(&self, text: &str) -> String {
        self.paint(text, |t| t.yellow().to_string())
    }

    pub fn success(&self) -> String {
        self.paint(CHECK, |t| t.green().to_string())
    }

    pub fn failure(&self) -> String {
        self.paint(CROSS, |t| t.red().to_string())
    }

    /// `#57`, coloured by state.
    pub fn number(&self, pr: &PullRequest) -> String {
        let label = pr.number_label();
        if pr.is_draft {
            return self.paint(&label, |t| t.bright_black().to_string());
        }
        match pr.state {
            crate::types::PrState::Open => self.paint(&label, |t| t.green().to_string()),
            crate::types::PrState::Closed => self.paint(&label, |t| t.red().to_string()),
            crate::types::PrState::Merged => self.paint(&label, |t| t.purple().to_string()),
        }
    }

    /// `#57 title (base ← head)`.
    pub fn pr(&self, pr: &PullRequest) -> String {
        format!(
            "{} {} ({} ← {})",
            self.number(pr),
            pr.title,
            self.base(&pr.base),
            self.head(&pr.head)
        )
    }
}
