use anyhow::Result;

use crate::commands::common::gather;
use crate::gateway::Gateway;
use crate::report::{Event, Reporter};

/// Print the dependency tree of the user's open PRs without classifying them.
pub fn show_tree(gateway: &dyn Gateway, reporter: &mut dyn Reporter) -> Result<()> {
    let snapshot = gather(gateway, reporter)?;
    reporter.report(Event::Forest(snapshot.forest));
    Ok(())
}
