//! Reconciliation engine: computes and uploads the missing-artifact set for
//! one link.
//!
//! This module provides the core pass logic for reconciling one configured
//! link. A pass:
//!   - Enumerates file state from the repository source, filtered by a pure
//!     name predicate
//!   - Enumerates existing page state from the notebook sink
//!   - Computes the missing set under the stem/title identity rule
//!   - Uploads each missing file (fetch bytes, encode multipart body, create
//!     page), accumulating per-file outcomes
//!
//! # Major Types
//! - [`PassOptions`]: per-process knobs for a pass (filter, recursion,
//!   staleness short-circuit, attachment content type)
//! - [`PassResult`]: what one pass uploaded, skipped and failed
//!
//! # Responsibilities
//! - Pass-level failures (either listing call) abort the pass; per-file
//!   failures never do: the remaining files still get their attempt, and
//!   failures land in [`PassResult::failed`]
//! - A file that failed is naturally retried on the next pass: it is still
//!   missing, and the missing set is recomputed fresh every pass
//! - The engine never mutates link state; recording pass completion is the
//!   caller's job (see the trigger coordinator)
//!
//! # Callable From
//! - The trigger coordinator (CLI, HTTP and timer triggers all funnel
//!   through it) and integration tests with mocked collaborators
//!
//! # Navigation
//! - Main entrypoint: [`reconcile`]
//! - Identity rule: [`stem`]

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use crate::contract::{FileEntry, NameFilter, NewPage, NoteSink, RepoSource};
use crate::encode::PageEncoder;
use crate::error::{FileErrorKind, SyncError};
use crate::registry::Link;

/// Options applied to every pass, fixed at process start.
#[derive(Debug, Clone)]
pub struct PassOptions {
    /// Name predicate applied by the source during listing.
    pub filter: NameFilter,
    /// Whether the repository tree listing descends into subdirectories.
    pub recursive: bool,
    /// When true, probe the newest commit and skip the pass if nothing was
    /// committed since the link's last completed sync.
    pub staleness_check: bool,
    /// Content type of the binary attachment part (e.g. `application/pdf`).
    pub attachment_content_type: String,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            filter: NameFilter::suffix(".pdf"),
            recursive: true,
            staleness_check: false,
            attachment_content_type: "application/pdf".into(),
        }
    }
}

/// Outcome of one reconciliation pass for one link.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct PassResult {
    /// File names uploaded as new pages this pass, in listing order.
    pub uploaded: Vec<String>,
    /// File names whose stem already had a matching page title.
    pub skipped: Vec<String>,
    /// Per-file failures; these did not abort the pass.
    pub failed: Vec<FailedFile>,
    /// True when the staleness probe short-circuited the pass entirely.
    pub stale_skip: bool,
}

impl PassResult {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// One per-file failure inside an otherwise-continuing pass.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FailedFile {
    pub name: String,
    pub kind: FileErrorKind,
    pub detail: String,
}

/// The cross-system matching key: the file name with its final extension
/// segment removed. Names without an extension (or starting with their only
/// dot, like `.env`) are their own stem.
pub fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Run one reconciliation pass for `link`.
///
/// Network write calls are only issued for files in the missing set; an
/// empty missing set completes the pass without touching the sink. The
/// caller decides whether a completed pass updates the link's sync state.
pub async fn reconcile<S, N>(
    source: &S,
    sink: &N,
    link: &Link,
    options: &PassOptions,
) -> Result<PassResult, SyncError>
where
    S: RepoSource,
    N: NoteSink,
{
    info!(
        link = %link.name,
        project_id = link.project_id,
        section_id = %link.section_id,
        "[SYNC] Starting reconciliation pass"
    );

    if options.staleness_check {
        if let Some(result) = staleness_short_circuit(source, link).await {
            return Ok(result);
        }
    }

    // --- Step 1: Enumerate both sides ---
    let files = match source
        .list_files(link.project_id, options.recursive, options.filter.clone())
        .await
    {
        Ok(files) => {
            info!(count = files.len(), "[SYNC] Listed source files");
            files
        }
        Err(e) => {
            error!(error = ?e, "[SYNC][ERROR] Failed to list source files");
            return Err(SyncError::SourceUnavailable(e));
        }
    };

    let pages = match sink.list_pages(&link.section_id).await {
        Ok(pages) => {
            info!(count = pages.len(), "[SYNC] Listed existing pages");
            pages
        }
        Err(e) => {
            error!(error = ?e, "[SYNC][ERROR] Failed to list existing pages");
            return Err(SyncError::SinkUnavailable(e));
        }
    };

    // --- Step 2: Compute the missing set under the stem/title rule ---
    let titles: HashSet<&str> = pages.iter().map(|p| p.title.as_str()).collect();
    let mut result = PassResult::default();
    let mut missing: Vec<&FileEntry> = Vec::new();
    for file in &files {
        if titles.contains(stem(&file.name)) {
            result.skipped.push(file.name.clone());
        } else {
            missing.push(file);
        }
    }

    if missing.is_empty() {
        info!(
            link = %link.name,
            skipped = result.skipped.len(),
            "[SYNC] No missing files to upload"
        );
        return Ok(result);
    }
    info!(
        count = missing.len(),
        names = ?missing.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
        "[SYNC] Uploading missing files"
    );

    // --- Step 3: Upload each missing file, continuing on per-file failure ---
    let encoder = PageEncoder::new(options.attachment_content_type.as_str());
    for file in missing {
        let title = stem(&file.name);
        info!(file = %file.name, title = %title, "[SYNC][UPLOAD] Fetching file content");
        let payload = match source.get_file_bytes(link.project_id, &file.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(
                    file = %file.name,
                    error = ?e,
                    "[SYNC][ERROR][UPLOAD] Fetch failed, continuing with remaining files"
                );
                result.failed.push(FailedFile {
                    name: file.name.clone(),
                    kind: FileErrorKind::Fetch,
                    detail: e.to_string(),
                });
                continue;
            }
        };

        let body = encoder.encode(title, &payload);
        let page = NewPage {
            title,
            content_type: &body.content_type,
            body: &body.bytes,
        };
        match sink.create_page(&link.section_id, page).await {
            Ok(()) => {
                info!(file = %file.name, title = %title, "[SYNC][UPLOAD] Page created");
                result.uploaded.push(file.name.clone());
            }
            Err(e) => {
                error!(
                    file = %file.name,
                    error = ?e,
                    "[SYNC][ERROR][UPLOAD] Page creation failed, continuing with remaining files"
                );
                result.failed.push(FailedFile {
                    name: file.name.clone(),
                    kind: FileErrorKind::Upload,
                    detail: e.to_string(),
                });
            }
        }
    }

    info!(
        link = %link.name,
        uploaded = result.uploaded.len(),
        skipped = result.skipped.len(),
        failed = result.failed.len(),
        "[SYNC] Pass finished"
    );
    match serde_json::to_string_pretty(&result) {
        Ok(json) => debug!(json = %json, "[SYNC] Pass result detail"),
        Err(e) => error!(error = ?e, "[SYNC] Failed to serialize pass result"),
    }
    Ok(result)
}

/// Probe the newest commit; `Some(no-op result)` when nothing was committed
/// since the link's last completed sync. Probe failures and empty histories
/// degrade to a full pass.
async fn staleness_short_circuit<S>(source: &S, link: &Link) -> Option<PassResult>
where
    S: RepoSource,
{
    let last_sync = link.last_sync_at?;
    match source.list_commits(link.project_id).await {
        Ok(commits) => match commits.first() {
            Some(newest) if newest.created_at < last_sync => {
                info!(
                    link = %link.name,
                    newest_commit = %newest.created_at,
                    last_sync = %last_sync,
                    "[SYNC] No commits since last sync, skipping pass"
                );
                Some(PassResult {
                    stale_skip: true,
                    ..PassResult::default()
                })
            }
            Some(_) => None,
            None => {
                warn!(link = %link.name, "[SYNC] Commit history is empty, running full pass");
                None
            }
        },
        Err(e) => {
            warn!(
                link = %link.name,
                error = ?e,
                "[SYNC] Commit probe failed, running full pass"
            );
            None
        }
    }
}
