//! Page-printer (PDF) fallback chain: print utility, then document viewer,
//! then headless browser. Each tier is an operator-configurable command.

use std::sync::Arc;
use tracing::{debug, warn};

use super::command::{CommandStrategy, CommandTemplate};
use super::{DispatchStrategy, DispatchTier};
use crate::config::PdfCommands;

pub fn pdf_chain(commands: &PdfCommands) -> Vec<Arc<dyn DispatchStrategy>> {
    let tiers = [
        (DispatchTier::PrintUtility, commands.utility.as_deref()),
        (DispatchTier::DocumentViewer, commands.viewer.as_deref()),
        (DispatchTier::HeadlessBrowser, commands.browser.as_deref()),
    ];

    let mut chain: Vec<Arc<dyn DispatchStrategy>> = Vec::new();
    for (tier, template) in tiers {
        let Some(template) = template else {
            debug!("{:?} disabled", tier);
            continue;
        };
        match CommandTemplate::parse(template) {
            Ok(command) => chain.push(Arc::new(CommandStrategy::new(tier, command))),
            Err(e) => warn!("Skipping {:?}: {}", tier, e),
        }
    }
    chain
}
