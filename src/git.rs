//! Thin wrappers around `git`/`gh` commands.
//!
//! This module centralizes command execution, verbose command echo and the optional
//! transcript. The `git` plumbing used by the gateway lives here too; the `gh` side is
//! in [`crate::github`].

use regex::Regex;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::transcript::Transcript;

pub fn ensure_tool(name: &str) -> Result<(), GatewayError> {
    let status = Command::new(name)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|source| GatewayError::NotInstalled {
            tool: name.to_string(),
            source,
        })?;
    if !status.success() {
        return Err(GatewayError::Command {
            tool: name.to_string(),
            args: "--version".to_string(),
            exit_code: status.code(),
            stderr: format!("{} appears to be installed but not runnable", name),
        });
    }
    Ok(())
}

/* ------------------ command runners ------------------ */

/// Captured result of one finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Default)]
pub struct Runner {
    transcript: Option<Transcript>,
}

impl Runner {
    pub fn new(transcript: Option<Transcript>) -> Self {
        Self { transcript }
    }

    pub fn git(&self, args: &[&str]) -> Result<String, GatewayError> {
        self.run("git", args)
    }

    pub fn gh(&self, args: &[&str]) -> Result<String, GatewayError> {
        self.run("gh", args)
    }

    /// Run a command and fail unless it exits successfully.
    pub fn run(&self, bin: &str, args: &[&str]) -> Result<String, GatewayError> {
        let out = self.run_raw(bin, args)?;
        if !out.success() {
            debug!(
                "{} {} failed\nstdout:\n{}\nstderr:\n{}",
                bin,
                shellish(args),
                out.stdout,
                out.stderr
            );
            return Err(GatewayError::Command {
                tool: bin.to_string(),
                args: shellish(args),
                exit_code: out.exit_code,
                stderr: out.stderr,
            });
        }
        Ok(out.stdout)
    }

    /// Run a command and hand back its status and output, whatever the exit code.
    pub fn run_raw(&self, bin: &str, args: &[&str]) -> Result<CommandOutput, GatewayError> {
        debug!("{} {}", bin, shellish(args));
        let out = command(bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    GatewayError::NotInstalled {
                        tool: bin.to_string(),
                        source,
                    }
                } else {
                    GatewayError::Spawn {
                        tool: bin.to_string(),
                        source,
                    }
                }
            })?;
        let output = CommandOutput {
            exit_code: out.status.code(),
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        };
        if let Some(transcript) = &self.transcript {
            if let Err(e) = transcript.append(bin, args, &output) {
                warn!("failed to write command transcript: {:#}", e);
            }
        }
        Ok(output)
    }
}

/// `Command` for `bin`, detached from the terminal's foreground process group on unix so
/// a Ctrl-C reaches only gh-domino's own handler and never a running `git`/`gh`.
fn command(bin: &str) -> Command {
    #[allow(unused_mut)]
    let mut cmd = Command::new(bin);
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd
}

pub fn shellish(args: &[&str]) -> String {
    args.iter()
        .map(|a| {
            if a.is_empty()
                || a.chars()
                    .any(|c| c.is_whitespace() || c == '"' || c == '\'')
            {
                format!("{:?}", a)
            } else {
                a.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn remote_ref(remote: &str, branch: &str) -> String {
    let branch = branch.strip_prefix("refs/heads/").unwrap_or(branch);
    format!("{}/{}", remote, branch)
}

/* ------------------ git plumbing ------------------ */

pub fn repo_root(runner: &Runner) -> Option<String> {
    runner
        .git(["rev-parse", "--show-toplevel"].as_slice())
        .ok()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

pub fn fetch(runner: &Runner, remote: &str) -> Result<(), GatewayError> {
    runner.git(["fetch", remote].as_slice())?;
    Ok(())
}

pub fn rev_parse(runner: &Runner, rev: &str) -> Result<String, GatewayError> {
    Ok(runner
        .git(["rev-parse", rev].as_slice())?
        .trim()
        .to_string())
}

pub fn merge_base(runner: &Runner, a: &str, b: &str) -> Result<String, GatewayError> {
    Ok(runner
        .git(["merge-base", a, b].as_slice())?
        .trim()
        .to_string())
}

/// `git merge-base --is-ancestor`: exit 0 is `true`, exit 1 is `false`, anything else fails.
pub fn is_ancestor(runner: &Runner, ancestor: &str, descendant: &str) -> Result<bool, GatewayError> {
    let args = ["merge-base", "--is-ancestor", ancestor, descendant];
    let out = runner.run_raw("git", args.as_slice())?;
    match out.exit_code {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        exit_code => Err(GatewayError::Command {
            tool: "git".to_string(),
            args: shellish(args.as_slice()),
            exit_code,
            stderr: out.stderr,
        }),
    }
}

/// Commits reachable from `head` but not from `base`, oldest first.
pub fn commits_between(runner: &Runner, base: &str, head: &str) -> Result<Vec<String>, GatewayError> {
    let range = format!("{}..{}", base, head);
    let out = runner.git(["log", "--reverse", "--pretty=%H", &range].as_slice())?;
    Ok(out
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Whether a failed `git rebase` stopped on conflicts rather than failing outright.
pub fn is_rebase_conflict(runner: &Runner, out: &CommandOutput) -> bool {
    let text = format!("{}\n{}", out.stdout, out.stderr);
    if text.contains("CONFLICT") || text.contains("could not apply") {
        return true;
    }
    rebase_in_progress(runner)
}

/// Whether the repository has a stopped rebase (`rebase-merge`/`rebase-apply` present).
pub fn rebase_in_progress(runner: &Runner) -> bool {
    ["rebase-merge", "rebase-apply"].iter().any(|dir| {
        runner
            .git(["rev-parse", "--git-path", dir].as_slice())
            .map(|p| Path::new(p.trim()).exists())
            .unwrap_or(false)
    })
}

pub fn abort_rebase(runner: &Runner) -> Result<(), GatewayError> {
    runner.git(["rebase", "--abort"].as_slice())?;
    Ok(())
}

pub fn push_force_with_lease(runner: &Runner, remote: &str, branch: &str) -> Result<(), GatewayError> {
    runner.git(["push", "--force-with-lease", remote, branch].as_slice())?;
    Ok(())
}

/// Discover the remote's default branch from `git remote show <remote>`.
pub fn default_branch(runner: &Runner, remote: &str) -> Result<String, GatewayError> {
    let out = runner.git(["remote", "show", remote].as_slice())?;
    parse_default_branch(&out).ok_or_else(|| GatewayError::NoDefaultBranch {
        remote: remote.to_string(),
    })
}

pub fn parse_default_branch(remote_show: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^\s*HEAD branch:\s*(\S+)\s*$").ok()?;
    let name = re.captures(remote_show)?.get(1)?.as_str();
    if name == "(unknown)" {
        return None;
    }
    Some(name.to_string())
}
