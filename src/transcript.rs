//! Optional YAML transcript of every `git`/`gh` invocation.
//!
//! Each call is appended as its own YAML document so a partially written file from an
//! interrupted run still parses up to the last complete entry.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::git::{shellish, CommandOutput};

#[derive(Debug, Serialize)]
struct Entry<'a> {
    run_id: &'a str,
    at: String,
    command: String,
    stdout: &'a str,
    stderr: &'a str,
    exit_code: Option<i32>,
}

#[derive(Debug)]
pub struct Transcript {
    path: PathBuf,
    run_id: String,
}

impl Transcript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            run_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, bin: &str, args: &[&str], output: &CommandOutput) -> Result<()> {
        let at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .context("format timestamp")?;
        let entry = Entry {
            run_id: &self.run_id,
            at,
            command: format!("{} {}", bin, shellish(args)),
            stdout: &output.stdout,
            stderr: &output.stderr,
            exit_code: output.exit_code,
        };
        let doc = serde_yaml::to_string(&entry).context("serialize transcript entry")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        write!(file, "---\n{}", doc).with_context(|| format!("write {}", self.path.display()))?;
        Ok(())
    }
}
