//! User and repository configuration for `gh-domino`.
//!
//! Configuration is loaded from `$HOME/.gh_domino.yml` and then overridden by
//! `<repo-root>/.gh_domino.yml` when present. Command-line flags win over both.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::git::Runner;
use crate::repair::Mode;

pub const CONFIG_FILE: &str = ".gh_domino.yml";
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_MERGED_LIMIT: usize = 30;

#[derive(Debug, Default, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub remote: Option<String>,
    /// How many recently merged PRs to consider when looking for merged bases.
    pub merged_limit: Option<usize>,
    /// Skips discovery through `git remote show`.
    pub default_branch: Option<String>,
    /// Approve every repair without prompting, unless `--dry-run` is given.
    pub auto: Option<bool>,
    /// Append every `git`/`gh` invocation to this YAML file.
    pub log_commands: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub remote: String,
    pub merged_limit: usize,
    pub default_branch: Option<String>,
    pub auto: bool,
    pub log_commands: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.to_string(),
            merged_limit: DEFAULT_MERGED_LIMIT,
            default_branch: None,
            auto: false,
            log_commands: None,
        }
    }
}

/// Flags given on the command line; `None`/`false` defers to the file configuration.
#[derive(Debug, Default, Clone)]
pub struct FlagOverrides {
    pub auto: bool,
    pub dry_run: bool,
    pub remote: Option<String>,
    pub merged_limit: Option<usize>,
    pub log_commands: Option<PathBuf>,
}

/// Everything a run needs, after layering defaults, files and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mode: Mode,
    pub remote: String,
    pub merged_limit: usize,
    pub default_branch: Option<String>,
    pub log_commands: Option<PathBuf>,
}

/// Reject contradictory flags. Must run before anything touches the repository.
pub fn check_flags(flags: &FlagOverrides) -> Result<(), ConfigError> {
    if flags.auto && flags.dry_run {
        return Err(ConfigError::AutoWithDryRun);
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<Option<FileConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(Some(FileConfig::default()));
    }
    let cfg = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Some(cfg))
}

fn apply_overrides(config: &Config, overrides: FileConfig) -> Config {
    let mut merged = config.clone();
    if let Some(remote) = overrides.remote {
        merged.remote = remote;
    }
    if let Some(merged_limit) = overrides.merged_limit {
        merged.merged_limit = merged_limit;
    }
    if let Some(default_branch) = overrides.default_branch {
        merged.default_branch = Some(default_branch);
    }
    if let Some(auto) = overrides.auto {
        merged.auto = auto;
    }
    if let Some(log_commands) = overrides.log_commands {
        merged.log_commands = Some(log_commands);
    }
    merged
}

fn normalize_config(config: &mut Config) {
    if config.merged_limit == 0 {
        config.merged_limit = DEFAULT_MERGED_LIMIT;
    }
    if config.remote.trim().is_empty() {
        config.remote = DEFAULT_REMOTE.to_string();
    }
    if config
        .default_branch
        .as_deref()
        .is_some_and(|b| b.trim().is_empty())
    {
        config.default_branch = None;
    }
}

/// Layer the config files found in `dirs`, later directories overriding earlier ones.
fn load_from(dirs: &[PathBuf]) -> Result<Config, ConfigError> {
    let mut merged = Config::default();
    for dir in dirs {
        if let Some(cfg) = read_config_file(&dir.join(CONFIG_FILE))? {
            merged = apply_overrides(&merged, cfg);
        }
    }
    normalize_config(&mut merged);
    Ok(merged)
}

pub fn load_config(runner: &Runner) -> Result<Config, ConfigError> {
    let mut dirs = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(PathBuf::from(home));
    }
    // Repo config overrides home
    if let Some(root) = crate::git::repo_root(runner) {
        dirs.push(PathBuf::from(root));
    }
    load_from(&dirs)
}

pub fn resolve(config: Config, flags: &FlagOverrides) -> Result<Settings, ConfigError> {
    check_flags(flags)?;
    let mode = if flags.dry_run {
        Mode::DryRun
    } else if flags.auto || config.auto {
        Mode::Auto
    } else {
        Mode::Interactive
    };
    let mut config = config;
    if let Some(remote) = &flags.remote {
        config.remote = remote.clone();
    }
    if let Some(limit) = flags.merged_limit {
        config.merged_limit = limit;
    }
    if let Some(path) = &flags.log_commands {
        config.log_commands = Some(path.clone());
    }
    normalize_config(&mut config);
    Ok(Settings {
        mode,
        remote: config.remote,
        merged_limit: config.merged_limit,
        default_branch: config.default_branch,
        log_commands: config.log_commands,
    })
}
