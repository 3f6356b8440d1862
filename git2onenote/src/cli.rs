//! Command-line surface for git2onenote: command parsing, argument
//! validation and orchestration glue.
//!
//! All reconciliation logic lives in the `git2onenote-core` crate; this
//! module wires configuration, the two vendor clients and the trigger
//! coordinator together per subcommand.
//!
//! - For command-line users: run the installed `git2onenote` binary with
//!   `--help`.
//! - For programmatic and integration-test use: call [`run`] with a
//!   constructed [`Cli`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use git2onenote_core::contract::NoteSink;
use git2onenote_core::schedule::run_daily;
use git2onenote_core::trigger::TriggerCoordinator;

use crate::gitlab::GitLabSource;
use crate::graph::GraphClient;
use crate::load_config::{load_config, AppConfig};
use crate::server;

/// CLI for git2onenote: mirror repository PDFs into OneNote sections.
#[derive(Parser)]
#[clap(
    name = "git2onenote",
    version,
    about = "Mirror GitLab repository PDFs into OneNote sections as attachment pages"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one reconciliation pass for every configured link, then exit
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Only reconcile the named link
        #[clap(long)]
        link: Option<String>,
    },
    /// Run the HTTP trigger server and the daily scheduler until interrupted
    Serve {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// List notebooks, sections and page counts for config discovery
    Sections {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// List owned GitLab projects for config discovery
    Projects {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Show the signed-in Graph user
    Whoami {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config, link } => sync(config, link).await,
        Commands::Serve { config } => serve(config).await,
        Commands::Sections { config } => sections(config).await,
        Commands::Projects { config } => projects(config).await,
        Commands::Whoami { config } => whoami(config).await,
    }
}

/// Build the coordinator from a loaded config: GitLab client from env
/// settings, Graph client via sign-in, links validated by the registry.
async fn build_coordinator(
    config: AppConfig,
) -> Result<TriggerCoordinator<GitLabSource, GraphClient>> {
    config.sync.trace_loaded();
    let source = GitLabSource::from_env(&config.gitlab, config.timeout)
        .map_err(|e| anyhow::Error::msg(format!("GitLab client setup failed: {e}")))?;
    let sink = GraphClient::sign_in(&config.graph, config.timeout)
        .await
        .map_err(|e| anyhow::Error::msg(format!("Graph sign-in failed: {e}")))?;
    Ok(TriggerCoordinator::new(source, sink, config.sync)?)
}

async fn sync(config_path: PathBuf, only_link: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    tracing::info!(command = "sync", "Starting reconciliation");
    let coordinator = build_coordinator(config).await?;

    let outcomes = match only_link {
        Some(name) => {
            let outcome = coordinator.run_sync(&name).await;
            vec![(name, outcome)]
        }
        None => coordinator.run_all().await,
    };

    let mut failed_links = 0usize;
    for (name, outcome) in &outcomes {
        match outcome {
            Ok(result) if result.stale_skip => {
                println!("{name}: no new commits since last sync, skipped");
            }
            Ok(result) => {
                println!(
                    "{name}: uploaded {}, skipped {}, failed {}",
                    result.uploaded.len(),
                    result.skipped.len(),
                    result.failed.len()
                );
            }
            Err(e) => {
                failed_links += 1;
                eprintln!("{name}: {e}");
            }
        }
    }
    if failed_links > 0 {
        anyhow::bail!("{failed_links} link(s) failed at pass level");
    }
    Ok(())
}

async fn serve(config_path: PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    let daily_at = config.daily_at;
    let bind_addr = config.bind_addr.clone();
    let coordinator = Arc::new(build_coordinator(config).await?);

    greet(coordinator.sink()).await;

    tokio::spawn(run_daily(Arc::clone(&coordinator), daily_at));
    server::run_server(coordinator, &bind_addr).await
}

async fn sections(config_path: PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    let sink = GraphClient::sign_in(&config.graph, config.timeout)
        .await
        .map_err(|e| anyhow::Error::msg(format!("Graph sign-in failed: {e}")))?;

    let notebooks = sink
        .get_notebooks()
        .await
        .map_err(|e| anyhow::Error::msg(format!("Listing notebooks failed: {e}")))?;
    if notebooks.is_empty() {
        println!("No notebooks found.");
        return Ok(());
    }

    for notebook in notebooks {
        println!("{} - {}", notebook.display_name, notebook.id);
        let sections = sink
            .get_sections(&notebook.id)
            .await
            .map_err(|e| anyhow::Error::msg(format!("Listing sections failed: {e}")))?;
        for section in sections {
            let pages = sink
                .list_pages(&section.id)
                .await
                .map_err(|e| anyhow::Error::msg(format!("Listing pages failed: {e}")))?;
            println!(
                "  {} - {} ({} pages)",
                section.display_name,
                section.id,
                pages.len()
            );
        }
    }
    Ok(())
}

async fn projects(config_path: PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    let source = GitLabSource::from_env(&config.gitlab, config.timeout)
        .map_err(|e| anyhow::Error::msg(format!("GitLab client setup failed: {e}")))?;

    let projects = source
        .list_owned_projects()
        .await
        .map_err(|e| anyhow::Error::msg(format!("Listing projects failed: {e}")))?;
    if projects.is_empty() {
        println!("No owned projects found.");
        return Ok(());
    }
    for project in projects {
        println!("{} - {}", project.id, project.path_with_namespace);
    }
    Ok(())
}

async fn whoami(config_path: PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    let sink = GraphClient::sign_in(&config.graph, config.timeout)
        .await
        .map_err(|e| anyhow::Error::msg(format!("Graph sign-in failed: {e}")))?;
    greet(&sink).await;
    Ok(())
}

/// Print the signed-in user the way the console surfaces always have:
/// greeting line plus the best-known email address.
async fn greet(sink: &GraphClient) {
    match sink.get_user().await {
        Ok(user) => {
            println!(
                "Hello, {}",
                user.display_name.as_deref().unwrap_or("unknown user")
            );
            if let Some(email) = user.email() {
                println!("Email: {email}");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not fetch the signed-in user");
        }
    }
}
