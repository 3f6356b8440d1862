//! Configuration loading: parses the YAML config file into validated,
//! strongly-typed settings for the clients, the coordinator and the trigger
//! surfaces.
//!
//! This is the only place untrusted YAML is parsed. Secrets never live in the
//! file; the client constructors read them from the environment
//! (`GITLAB_TOKEN`, `GRAPH_CLIENT_ID`, `GRAPH_TENANT_ID`, optionally
//! `GRAPH_ACCESS_TOKEN`).
//!
//! # Errors
//! Unreadable files, malformed YAML, empty or duplicate link sets and
//! unparseable schedule strings all fail here, before any network client is
//! built. Errors use `anyhow` for context-rich diagnostics at the CLI
//! boundary.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use tracing::{error, info};

use git2onenote_core::config::SyncConfig;
use git2onenote_core::contract::NameFilter;
use git2onenote_core::reconcile::PassOptions;
use git2onenote_core::registry::Link;
use git2onenote_core::schedule::DailyTime;
use git2onenote_core::trigger::BusyPolicy;

const DEFAULT_SCOPES: &str = "User.Read Notes.ReadWrite";
const DEFAULT_NAME_SUFFIX: &str = ".pdf";
const DEFAULT_DAILY_AT: &str = "07:55";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fully resolved application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub gitlab: GitLabSettings,
    pub graph: GraphSettings,
    /// Links plus pass options, handed to the trigger coordinator.
    pub sync: SyncConfig,
    pub daily_at: DailyTime,
    pub bind_addr: String,
    /// Per-request timeout for both vendor clients.
    pub timeout: Duration,
}

/// GitLab connection settings; the token comes from `GITLAB_TOKEN`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabSettings {
    /// Instance base URL, e.g. `https://gitlab.example.com`.
    pub base_url: String,
    /// Branch whose tree is reconciled.
    pub branch: String,
}

/// Microsoft Graph sign-in settings; client and tenant ids come from the
/// environment.
#[derive(Debug, Clone)]
pub struct GraphSettings {
    /// Space-separated delegated scopes requested at sign-in.
    pub scopes: String,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    gitlab: GitLabSettings,
    #[serde(default)]
    graph: GraphSection,
    #[serde(default)]
    sync: SyncSection,
    #[serde(default)]
    http: HttpSection,
    #[serde(default)]
    links: Vec<LinkEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphSection {
    scopes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SyncSection {
    name_suffix: Option<String>,
    daily_at: Option<String>,
    staleness_check: Option<bool>,
    busy_policy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HttpSection {
    bind_addr: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LinkEntry {
    name: String,
    project_id: u64,
    section_id: String,
}

/// Loads and validates the YAML config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    // Links are validated here so a bad file fails before any client
    // construction (device-code sign-in included).
    if raw.links.is_empty() {
        error!("Config contains no links");
        return Err(anyhow::anyhow!("config must define at least one link"));
    }
    let mut seen = HashSet::new();
    for link in &raw.links {
        if !seen.insert(link.name.as_str()) {
            error!(link = %link.name, "Duplicate link name in config");
            return Err(anyhow::anyhow!("duplicate link name '{}'", link.name));
        }
    }

    let daily_at = DailyTime::parse(raw.sync.daily_at.as_deref().unwrap_or(DEFAULT_DAILY_AT))?;

    let busy_policy = match raw.sync.busy_policy.as_deref() {
        None | Some("reject") => BusyPolicy::Reject,
        Some("wait") => BusyPolicy::Wait,
        Some(other) => {
            error!(value = %other, "Unknown busy_policy in config");
            return Err(anyhow::anyhow!(
                "unknown busy_policy '{other}', expected 'reject' or 'wait'"
            ));
        }
    };

    // An explicitly empty suffix means no name filtering at all.
    let suffix = raw
        .sync
        .name_suffix
        .unwrap_or_else(|| DEFAULT_NAME_SUFFIX.to_string());
    let filter = if suffix.is_empty() {
        NameFilter::Any
    } else {
        NameFilter::suffix(suffix)
    };

    let options = PassOptions {
        filter,
        staleness_check: raw.sync.staleness_check.unwrap_or(false),
        ..PassOptions::default()
    };

    let links = raw
        .links
        .into_iter()
        .map(|entry| Link {
            name: entry.name,
            project_id: entry.project_id,
            section_id: entry.section_id,
            last_sync_at: None,
        })
        .collect();

    let config = AppConfig {
        gitlab: raw.gitlab,
        graph: GraphSettings {
            scopes: raw
                .graph
                .scopes
                .unwrap_or_else(|| DEFAULT_SCOPES.to_string()),
        },
        sync: SyncConfig {
            links,
            options,
            busy_policy,
        },
        daily_at,
        bind_addr: raw
            .http
            .bind_addr
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        timeout: Duration::from_secs(raw.http.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
    };
    info!(
        links = config.sync.links.len(),
        daily_at = %config.daily_at,
        bind_addr = %config.bind_addr,
        "Configuration resolved"
    );
    Ok(config)
}
