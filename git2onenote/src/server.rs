//! HTTP trigger server: a minimal status page plus GET endpoints that fire
//! reconciliation passes through the shared coordinator.
//!
//! The handlers await the pass they trigger; non-overlap is the
//! coordinator's job, so a second request for a busy link gets an immediate
//! 409 rather than queueing.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use git2onenote_core::contract::{NoteSink, RepoSource};
use git2onenote_core::error::SyncError;
use git2onenote_core::reconcile::PassResult;
use git2onenote_core::trigger::TriggerCoordinator;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>Git2OneNote</title>
  </head>
  <body>
    <h1>Git2OneNote</h1>
    <a href="/sync">Sync now</a>
  </body>
</html>"#;

/// JSON body for `GET /sync`: the aggregate verdict plus one entry per link.
#[derive(Serialize)]
struct SyncStatus {
    status: &'static str,
    links: Vec<LinkOutcome>,
}

/// One link's outcome, shared by both sync endpoints.
#[derive(Serialize)]
struct LinkOutcome {
    link: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<PassResult>,
}

impl LinkOutcome {
    fn from_outcome(link: String, outcome: Result<PassResult, SyncError>) -> Self {
        match outcome {
            Ok(result) => LinkOutcome {
                link,
                status: "success",
                detail: None,
                result: Some(result),
            },
            Err(e) => LinkOutcome {
                link,
                status: if e.is_busy() { "busy" } else { "error" },
                detail: Some(e.to_string()),
                result: None,
            },
        }
    }
}

/// Build the trigger router around a shared coordinator. Split from
/// [`run_server`] so tests can drive it on an ephemeral port.
pub fn router<S, N>(coordinator: Arc<TriggerCoordinator<S, N>>) -> Router
where
    S: RepoSource + 'static,
    N: NoteSink + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/sync", get(sync_all::<S, N>))
        .route("/sync/{name}", get(sync_one::<S, N>))
        .with_state(coordinator)
}

/// Bind and serve until the process is terminated.
pub async fn run_server<S, N>(
    coordinator: Arc<TriggerCoordinator<S, N>>,
    bind_addr: &str,
) -> anyhow::Result<()>
where
    S: RepoSource + 'static,
    N: NoteSink + 'static,
{
    let app = router(coordinator);
    info!(bind_addr, "HTTP trigger server listening");
    println!("Listening on http://{bind_addr}");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Handler for `GET /sync`: one pass for every configured link. Any hard
/// failure makes the aggregate `error`, else any busy link makes it `busy`.
async fn sync_all<S, N>(
    State(coordinator): State<Arc<TriggerCoordinator<S, N>>>,
) -> Json<SyncStatus>
where
    S: RepoSource + 'static,
    N: NoteSink + 'static,
{
    let outcomes = coordinator.run_all().await;

    let mut status = "success";
    for (_, outcome) in &outcomes {
        match outcome {
            Err(e) if !e.is_busy() => {
                status = "error";
                break;
            }
            Err(_) => status = "busy",
            Ok(_) => {}
        }
    }

    let links = outcomes
        .into_iter()
        .map(|(name, outcome)| LinkOutcome::from_outcome(name, outcome))
        .collect();
    Json(SyncStatus { status, links })
}

/// Handler for `GET /sync/{name}`: one pass for one link. 200 on success,
/// 409 while a pass for the link is in flight, 404 for unknown names, 502
/// when a collaborator listing failed.
async fn sync_one<S, N>(
    State(coordinator): State<Arc<TriggerCoordinator<S, N>>>,
    Path(name): Path<String>,
) -> impl IntoResponse
where
    S: RepoSource + 'static,
    N: NoteSink + 'static,
{
    let outcome = coordinator.run_sync(&name).await;
    let status = match &outcome {
        Ok(_) => StatusCode::OK,
        Err(SyncError::Busy(_)) => StatusCode::CONFLICT,
        Err(SyncError::UnknownLink(_)) => StatusCode::NOT_FOUND,
        Err(SyncError::SourceUnavailable(_)) | Err(SyncError::SinkUnavailable(_)) => {
            StatusCode::BAD_GATEWAY
        }
        Err(SyncError::Configuration(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(LinkOutcome::from_outcome(name, outcome)))
}
