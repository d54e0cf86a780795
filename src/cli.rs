use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::FlagOverrides;

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
    /// Find PRs left behind by merged or rebased bases and rebase them (default)
    Fix,
    /// Print the dependency tree of your open PRs
    Tree,
}

#[derive(Parser, Debug)]
#[command(
    name = "gh-domino",
    version,
    about = "Repair stacked pull requests after their bases were merged or rebased"
)]
pub struct Cli {
    /// Verbose output for underlying git/gh commands
    #[arg(long, global = true)]
    pub verbose: bool,
    /// Rebase, push and retarget without asking for confirmation
    #[arg(long, global = true)]
    pub auto: bool,
    /// Only print the PRs that would be rebased
    #[arg(long, global = true)]
    pub dry_run: bool,
    /// Remote that PR branches are pushed to
    #[arg(long, global = true)]
    pub remote: Option<String>,
    /// Number of recently merged PRs to inspect
    #[arg(long, global = true, value_name = "N")]
    pub merged_limit: Option<usize>,
    /// Append every git/gh invocation to a YAML transcript
    #[arg(long, global = true, value_name = "PATH")]
    pub log_commands: Option<PathBuf>,
    #[command(subcommand)]
    pub cmd: Option<Cmd>,
}

impl Cli {
    pub fn command(&self) -> Cmd {
        self.cmd.unwrap_or(Cmd::Fix)
    }

    pub fn overrides(&self) -> FlagOverrides {
        FlagOverrides {
            auto: self.auto,
            dry_run: self.dry_run,
            remote: self.remote.clone(),
            merged_limit: self.merged_limit,
            log_commands: self.log_commands.clone(),
        }
    }
}
