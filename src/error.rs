//! Error types for gateway calls, repairs and configuration.

use thiserror::Error;

use crate::types::RepairAction;

/// Failure of a `git`/`gh` call or of decoding its output.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unable to find {tool} executable in PATH; please install {tool} before retrying")]
    NotInstalled {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn {tool}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run {tool} {args}: {}", summarize(.stderr, .exit_code))]
    Command {
        tool: String,
        args: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to decode {what}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot rebase {branch}: another rebase is already in progress; finish it or run `git rebase --abort` first")]
    RebaseInProgress { branch: String },

    #[error("could not determine default branch of remote {remote}")]
    NoDefaultBranch { remote: String },
}

fn summarize(stderr: &str, exit_code: &Option<i32>) -> String {
    let stderr = stderr.trim();
    match (stderr.is_empty(), exit_code) {
        (false, _) => stderr.to_string(),
        (true, Some(code)) => format!("exit status {}", code),
        (true, None) => "terminated by signal".to_string(),
    }
}

/// Failure while repairing a broken PR. Any of these stops the whole run.
#[derive(Debug, Error)]
pub enum RepairError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to rebase {} onto {}", .action.pr.head, .action.onto)]
    RebaseConflict {
        action: Box<RepairAction>,
        /// Manual command that reproduces the conflicting rebase.
        command: String,
    },

    #[error("rebase conflict on {branch} and `git rebase --abort` failed")]
    AbortFailed {
        branch: String,
        #[source]
        source: GatewayError,
    },

    #[error("failed to read confirmation")]
    Prompt(#[source] dialoguer::Error),

    #[error("interrupted")]
    Cancelled,
}

/// Invalid combination of settings, reported before any gateway call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot use --auto and --dry-run together")]
    AutoWithDryRun,

    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
