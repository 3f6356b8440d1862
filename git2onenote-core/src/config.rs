use tracing::{debug, info};

use crate::reconcile::PassOptions;
use crate::registry::Link;
use crate::trigger::BusyPolicy;

/// Validated sync configuration handed to the trigger coordinator at
/// startup. Built by the binary crate's config loader; the coordinator
/// consumes it once and the registry takes over link state from there.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub links: Vec<Link>,
    pub options: PassOptions,
    pub busy_policy: BusyPolicy,
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            links = self.links.len(),
            filter = ?self.options.filter,
            staleness_check = self.options.staleness_check,
            busy_policy = ?self.busy_policy,
            "Loaded sync configuration"
        );
        debug!(?self, "Sync configuration (full debug)");
    }
}
