//! # contract: collaborator interfaces for reconciliation
//!
//! This module defines the two traits the reconciliation engine consumes
//! ([`RepoSource`], [`NoteSink`]) and the plain data types that cross those
//! seams. Concrete implementations live in the binary crate (GitLab REST and
//! Microsoft Graph clients); everything here is transport-agnostic.
//!
//! ## Interface & Extensibility
//! - Implement [`RepoSource`] for a repository host that can enumerate a
//!   branch tree, serve raw file bytes, and list commit history newest-first.
//! - Implement [`NoteSink`] for a document store that can enumerate page
//!   titles in a section and accept a new page as an encoded multipart body.
//! - All methods are async and return boxed errors ([`ClientError`]); the
//!   engine classifies them into its own taxonomy, so implementations just
//!   propagate whatever their transport produced.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`; with the `test-export-mocks`
//!   feature (on by default) the generated `MockRepoSource` / `MockNoteSink`
//!   are exported for integration tests here and in dependent crates.

use async_trait::async_trait;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::ClientError;

/// One file in the repository tree, as observed by a single listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Base name including extension (e.g. `report.pdf`).
    pub name: String,
    /// Full path within the repository, used to fetch the raw bytes.
    pub path: String,
    /// Host-side identifier (tree entry id); opaque to the engine.
    pub identifier: String,
}

/// One existing page in the notebook section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    /// Page title; compared verbatim against file stems.
    pub title: String,
    /// Host-side page id; opaque to the engine.
    pub identifier: String,
}

/// One commit in the repository history.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A new page to create, borrowing the encoder's output for one upload.
#[derive(Debug, Clone, Copy)]
pub struct NewPage<'a> {
    /// Page title (the file stem).
    pub title: &'a str,
    /// Full content-type header value (`multipart/form-data; boundary=...`).
    pub content_type: &'a str,
    /// The encoded multipart body.
    pub body: &'a [u8],
}

/// Pure predicate over file names, applied by the source during listing.
///
/// Kept as a first-class value rather than a closure so configurations are
/// inspectable and the predicate is testable in isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    /// Accept every entry.
    Any,
    /// Accept names ending in the given suffix (case-sensitive), e.g. `.pdf`.
    Suffix(String),
}

impl NameFilter {
    pub fn suffix(suffix: impl Into<String>) -> Self {
        NameFilter::Suffix(suffix.into())
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameFilter::Any => true,
            NameFilter::Suffix(suffix) => name.ends_with(suffix.as_str()),
        }
    }
}

/// Read-only view of a repository host.
///
/// Implementations hold their own authenticated transport handle; the engine
/// never constructs or re-authenticates clients mid-pass.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// List files on the tracked branch of the given project, filtered by
    /// `filter` over the base name. Only blob entries are returned.
    async fn list_files(
        &self,
        project_id: u64,
        recursive: bool,
        filter: NameFilter,
    ) -> Result<Vec<FileEntry>, ClientError>;

    /// Fetch the raw bytes of one file by repository path.
    async fn get_file_bytes(&self, project_id: u64, path: &str) -> Result<Vec<u8>, ClientError>;

    /// List commits on the tracked branch, newest first.
    async fn list_commits(&self, project_id: u64) -> Result<Vec<CommitInfo>, ClientError>;
}

/// Write-capable view of a notebook section.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait NoteSink: Send + Sync {
    /// List existing pages (title + id) in the section.
    async fn list_pages(&self, section_id: &str) -> Result<Vec<PageEntry>, ClientError>;

    /// Create a new page from an encoded multipart body. Implementations
    /// fail on any non-2xx response.
    async fn create_page<'a>(
        &self,
        section_id: &str,
        page: NewPage<'a>,
    ) -> Result<(), ClientError>;
}
