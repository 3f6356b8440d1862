//! In-memory table of configured links and their per-link sync state.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::error::SyncError;

/// A configured pairing between one repository project and one notebook
/// section. `last_sync_at` is the only mutable field and is only advanced by
/// a completed reconciliation pass (see [`LinkRegistry::record_sync`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Unique name; every trigger surface addresses the link by it.
    pub name: String,
    /// Project id on the repository host.
    pub project_id: u64,
    /// Section id on the notebook host.
    pub section_id: String,
    /// Completion instant of the most recent finished pass, if any.
    pub last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct LinkState {
    project_id: u64,
    section_id: String,
    last_sync_at: RwLock<Option<DateTime<Utc>>>,
}

/// Registry of all configured links, built once at startup.
///
/// Reads hand out snapshots; `last_sync_at` mutation is serialized through a
/// per-link lock since triggers commit pass completions from concurrent
/// tasks.
#[derive(Debug)]
pub struct LinkRegistry {
    links: HashMap<String, LinkState>,
    order: Vec<String>,
}

impl LinkRegistry {
    /// Build the registry, rejecting empty link sets and duplicate names as
    /// configuration errors.
    pub fn new(links: Vec<Link>) -> Result<Self, SyncError> {
        if links.is_empty() {
            return Err(SyncError::Configuration(
                "at least one link must be configured".into(),
            ));
        }
        let mut map = HashMap::new();
        let mut order = Vec::with_capacity(links.len());
        for link in links {
            if map.contains_key(&link.name) {
                return Err(SyncError::Configuration(format!(
                    "duplicate link name '{}'",
                    link.name
                )));
            }
            order.push(link.name.clone());
            map.insert(
                link.name,
                LinkState {
                    project_id: link.project_id,
                    section_id: link.section_id,
                    last_sync_at: RwLock::new(link.last_sync_at),
                },
            );
        }
        Ok(Self { links: map, order })
    }

    /// Snapshot of one link including its current `last_sync_at`.
    pub fn get(&self, name: &str) -> Result<Link, SyncError> {
        let state = self
            .links
            .get(name)
            .ok_or_else(|| SyncError::UnknownLink(name.to_string()))?;
        let last_sync_at = *state
            .last_sync_at
            .read()
            .expect("last_sync_at lock poisoned");
        Ok(Link {
            name: name.to_string(),
            project_id: state.project_id,
            section_id: state.section_id.clone(),
            last_sync_at,
        })
    }

    /// Record completion of a pass for the link. Partial per-file failures
    /// still count as completion; pass-level failures must not be recorded.
    pub fn record_sync(&self, name: &str, at: DateTime<Utc>) -> Result<(), SyncError> {
        let state = self
            .links
            .get(name)
            .ok_or_else(|| SyncError::UnknownLink(name.to_string()))?;
        *state
            .last_sync_at
            .write()
            .expect("last_sync_at lock poisoned") = Some(at);
        Ok(())
    }

    /// Link names in configuration order.
    pub fn link_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
