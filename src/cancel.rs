//! Cooperative cancellation.
//!
//! The flag is only polled between gateway calls; the engine stops before issuing the
//! next one. Subprocesses are spawned in their own process group (see
//! [`crate::git::Runner`]), so the terminal's SIGINT never reaches a running `git`/`gh`
//! and an in-flight rebase or push always runs to completion.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

use crate::error::RepairError;

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), RepairError> {
        if self.is_cancelled() {
            return Err(RepairError::Cancelled);
        }
        Ok(())
    }
}

/// Cancel `token` on the first Ctrl-C and exit with status 130 on the second.
pub fn install_ctrl_c(token: CancelToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal listener")?;
    std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    if tokio::signal::ctrl_c().await.is_err() {
                        return;
                    }
                    if token.is_cancelled() {
                        std::process::exit(130);
                    }
                    warn!("interrupted; stopping after the current command (Ctrl-C again to quit now)");
                    token.cancel();
                }
            })
        })
        .context("failed to spawn signal listener")?;
    Ok(())
}
