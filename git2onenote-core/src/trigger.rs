//! Trigger coordination: at most one reconciliation pass per link.
//!
//! Three independent trigger sources (CLI, HTTP endpoint, daily timer) can
//! request a pass at any time. The coordinator keys a tokio `Mutex` per link
//! so a second request for a link with a pass in flight is rejected with
//! [`SyncError::Busy`] (default policy) or waits its turn, while passes for
//! *different* links run with no coordination between them. The per-link
//! state machine is simply Idle -> Running -> Idle; a started pass always
//! runs to completion or failure.
//!
//! The coordinator owns the collaborator clients for the process lifetime
//! and is the only component that records pass completions in the registry.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::contract::{NoteSink, RepoSource};
use crate::error::SyncError;
use crate::reconcile::{reconcile, PassOptions, PassResult};
use crate::registry::LinkRegistry;

/// What to do when a pass for the same link is already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusyPolicy {
    /// Reject the request immediately with [`SyncError::Busy`].
    #[default]
    Reject,
    /// Wait for the in-flight pass to release the slot, then run a fresh
    /// pass. A fresh pass recomputes the missing set, so waiting callers
    /// never act on a stale snapshot.
    Wait,
}

/// Serializes pass execution per link and records completions.
pub struct TriggerCoordinator<S, N> {
    source: S,
    sink: N,
    registry: LinkRegistry,
    slots: HashMap<String, Mutex<()>>,
    options: PassOptions,
    policy: BusyPolicy,
}

impl<S, N> TriggerCoordinator<S, N>
where
    S: RepoSource,
    N: NoteSink,
{
    /// Build the coordinator from validated configuration and the two
    /// collaborator clients, which it owns from here on.
    pub fn new(source: S, sink: N, config: SyncConfig) -> Result<Self, SyncError> {
        let registry = LinkRegistry::new(config.links)?;
        let slots = registry
            .link_names()
            .into_iter()
            .map(|name| (name, Mutex::new(())))
            .collect();
        Ok(Self {
            source,
            sink,
            registry,
            slots,
            options: config.options,
            policy: config.busy_policy,
        })
    }

    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    /// Borrow the sink client, e.g. for discovery calls outside a pass.
    pub fn sink(&self) -> &N {
        &self.sink
    }

    /// Run one pass for the named link, holding its execution slot for the
    /// whole pass. An occupied slot follows the configured [`BusyPolicy`]:
    /// fail fast with [`SyncError::Busy`], or wait for the slot and then run
    /// a fresh pass (never reusing the in-flight pass's result). The
    /// completion timestamp is recorded only when the pass ran to
    /// completion; pass-level failures leave the link state untouched.
    pub async fn run_sync(&self, name: &str) -> Result<PassResult, SyncError> {
        let slot = self
            .slots
            .get(name)
            .ok_or_else(|| SyncError::UnknownLink(name.to_string()))?;
        let _guard = match self.policy {
            BusyPolicy::Reject => match slot.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    warn!(link = %name, "[SYNC] Pass already in flight, rejecting trigger");
                    return Err(SyncError::Busy(name.to_string()));
                }
            },
            BusyPolicy::Wait => slot.lock().await,
        };

        let link = self.registry.get(name)?;
        let result = reconcile(&self.source, &self.sink, &link, &self.options).await?;
        self.registry.record_sync(name, Utc::now())?;
        info!(
            link = %name,
            uploaded = result.uploaded.len(),
            failed = result.failed.len(),
            "[SYNC] Pass completed and recorded"
        );
        Ok(result)
    }

    /// Run a pass for every configured link, returning per-link outcomes in
    /// configuration order. Links run concurrently; each is still guarded by
    /// its own slot.
    pub async fn run_all(&self) -> Vec<(String, Result<PassResult, SyncError>)> {
        let passes = self.registry.link_names().into_iter().map(|name| async move {
            let outcome = self.run_sync(&name).await;
            (name, outcome)
        });
        join_all(passes).await
    }
}
