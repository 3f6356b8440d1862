//! GitLab REST v4 client: the repository side of a link.
//!
//! Implements [`RepoSource`] over the instance's REST API with one
//! authenticated reqwest handle built at startup. Tree listings paginate
//! until a short page; raw file fetches percent-encode the repository path
//! into a single URL segment.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use git2onenote_core::contract::{CommitInfo, FileEntry, NameFilter, RepoSource};
use git2onenote_core::error::ClientError;

use crate::load_config::GitLabSettings;

const TREE_PAGE_SIZE: usize = 100;
const COMMIT_PROBE_SIZE: usize = 20;

pub struct GitLabSource {
    client: reqwest::Client,
    base_url: Url,
    branch: String,
}

/// One owned project, as listed for config discovery.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSummary {
    pub id: u64,
    pub path_with_namespace: String,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct Commit {
    id: String,
    created_at: DateTime<Utc>,
}

impl GitLabSource {
    /// Build the client from settings plus the `GITLAB_TOKEN` env secret.
    pub fn from_env(settings: &GitLabSettings, timeout: Duration) -> Result<Self, ClientError> {
        let token =
            std::env::var("GITLAB_TOKEN").map_err(|_| "GITLAB_TOKEN is not set in the environment")?;
        Self::new(settings, &token, timeout)
    }

    /// Build the client with an explicit token.
    pub fn new(
        settings: &GitLabSettings,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let mut token_value = HeaderValue::from_str(token)?;
        token_value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert("PRIVATE-TOKEN", token_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        let base_url = Url::parse(&settings.base_url)?;
        info!(base_url = %base_url, branch = %settings.branch, "GitLab client ready");

        Ok(Self {
            client,
            base_url,
            branch: settings.branch.clone(),
        })
    }

    /// List projects owned by the token's user, for config discovery.
    pub async fn list_owned_projects(&self) -> Result<Vec<ProjectSummary>, ClientError> {
        let mut url = self.api_url(&["projects"])?;
        url.query_pairs_mut()
            .append_pair("owned", "true")
            .append_pair("per_page", "100");
        let projects: Vec<ProjectSummary> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        info!(count = projects.len(), "Listed owned projects");
        Ok(projects)
    }

    /// `{base}/api/v4/{segments...}` with every segment percent-encoded, so
    /// repository paths containing `/` survive as one segment. A trailing
    /// slash on the configured base URL must not produce an empty segment.
    fn api_url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| "GitLab base URL does not accept path segments")?
            .pop_if_empty()
            .extend(["api", "v4"])
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl RepoSource for GitLabSource {
    async fn list_files(
        &self,
        project_id: u64,
        recursive: bool,
        filter: NameFilter,
    ) -> Result<Vec<FileEntry>, ClientError> {
        let project = project_id.to_string();
        let mut files = Vec::new();
        let mut page = 1u32;
        loop {
            let mut url = self.api_url(&["projects", &project, "repository", "tree"])?;
            url.query_pairs_mut()
                .append_pair("ref", &self.branch)
                .append_pair("recursive", if recursive { "true" } else { "false" })
                .append_pair("per_page", &TREE_PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let entries: Vec<TreeEntry> = self
                .client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let fetched = entries.len();

            for entry in entries {
                if entry.kind == "blob" && filter.matches(&entry.name) {
                    files.push(FileEntry {
                        name: entry.name,
                        path: entry.path,
                        identifier: entry.id,
                    });
                }
            }

            // A short page is the last page.
            if fetched < TREE_PAGE_SIZE {
                break;
            }
            page += 1;
        }
        info!(project_id, count = files.len(), "Listed repository files");
        Ok(files)
    }

    async fn get_file_bytes(&self, project_id: u64, path: &str) -> Result<Vec<u8>, ClientError> {
        let project = project_id.to_string();
        let mut url = self.api_url(&["projects", &project, "repository", "files", path, "raw"])?;
        url.query_pairs_mut().append_pair("ref", &self.branch);

        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        debug!(project_id, path, size = bytes.len(), "Fetched raw file");
        Ok(bytes.to_vec())
    }

    async fn list_commits(&self, project_id: u64) -> Result<Vec<CommitInfo>, ClientError> {
        let project = project_id.to_string();
        let mut url = self.api_url(&["projects", &project, "repository", "commits"])?;
        url.query_pairs_mut()
            .append_pair("ref_name", &self.branch)
            .append_pair("per_page", &COMMIT_PROBE_SIZE.to_string());

        let commits: Vec<Commit> = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(project_id, count = commits.len(), "Listed branch commits");
        Ok(commits
            .into_iter()
            .map(|commit| CommitInfo {
                id: commit.id,
                created_at: commit.created_at,
            })
            .collect())
    }
}
