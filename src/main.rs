use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cancel;
mod classify;
mod cli;
mod commands;
mod config;
mod error;
mod gateway;
mod git;
mod github;
mod ledger;
mod process;
mod repair;
mod report;
mod style;
mod transcript;
mod tree;
mod types;

use crate::cancel::CancelToken;
use crate::cli::{Cli, Cmd};
use crate::commands::FixStatus;
use crate::gateway::CliGateway;
use crate::git::Runner;
use crate::repair::TerminalConfirm;
use crate::report::{Event, Reporter, TerminalReporter};
use crate::transcript::Transcript;

fn init_tools() -> Result<()> {
    crate::git::ensure_tool("git")?;
    crate::git::ensure_tool("gh")?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = if verbose {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();
    if verbose {
        builder.init();
    } else {
        builder.without_time().init();
    }
}

fn run(cli: &Cli, reporter: &mut dyn Reporter) -> Result<bool> {
    let flags = cli.overrides();
    crate::config::check_flags(&flags)?;
    init_tools()?;

    let file_config = crate::config::load_config(&Runner::default())?;
    let settings = crate::config::resolve(file_config, &flags)?;
    debug!("settings: {:?}", settings);

    let cancel = CancelToken::new();
    crate::cancel::install_ctrl_c(cancel.clone())?;

    let transcript = settings.log_commands.clone().map(Transcript::new);
    if let Some(t) = &transcript {
        debug!("logging commands to {}", t.path().display());
    }
    let gateway = CliGateway::new(
        Runner::new(transcript),
        &settings.remote,
        settings.merged_limit,
        settings.default_branch.clone(),
    );

    match cli.command() {
        Cmd::Tree => {
            crate::commands::show_tree(&gateway, reporter)?;
            Ok(true)
        }
        Cmd::Fix => {
            let mut confirm = TerminalConfirm;
            let status = crate::commands::fix(
                &gateway,
                reporter,
                &mut confirm,
                &cancel,
                settings.mode,
            )?;
            Ok(matches!(status, FixStatus::Finished(_)))
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut reporter = TerminalReporter::stderr();
    match run(&cli, &mut reporter) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            reporter.report(Event::Failed {
                message: format!("{:#}", err),
            });
            ExitCode::FAILURE
        }
    }
}
