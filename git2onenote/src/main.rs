use anyhow::Result;
use clap::Parser;

use git2onenote::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    tracing::info!("git2onenote starting");

    let result = run(cli).await;
    match &result {
        Ok(()) => tracing::info!("Done"),
        Err(e) => tracing::error!(error = %e, "Command failed"),
    }
    result
}
