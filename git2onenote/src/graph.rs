//! Microsoft Graph client: device-code sign-in plus the OneNote calls behind
//! the note sink seam.
//!
//! The token is acquired once at startup (or taken from `GRAPH_ACCESS_TOKEN`
//! when set, which CI and tests use) and held for the process lifetime; no
//! re-authentication happens mid-pass.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use git2onenote_core::contract::{NewPage, NoteSink, PageEntry};
use git2onenote_core::error::ClientError;

use crate::load_config::GraphSettings;

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const LOGIN_BASE: &str = "https://login.microsoftonline.com";

pub struct GraphClient {
    client: reqwest::Client,
    access_token: String,
}

/// The signed-in user, as far as the CLI needs it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub display_name: Option<String>,
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
}

impl UserProfile {
    /// Work/school accounts carry the address in `mail`, personal accounts in
    /// `userPrincipalName`.
    pub fn email(&self) -> Option<&str> {
        self.mail.as_deref().or(self.user_principal_name.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageRecord {
    id: String,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeGrant {
    device_code: String,
    user_code: String,
    verification_uri: String,
    interval: Option<u64>,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenDenial {
    error: String,
}

impl GraphClient {
    /// Sign in and build the client. `GRAPH_ACCESS_TOKEN` bypasses the
    /// device-code flow when set; otherwise `GRAPH_CLIENT_ID` and
    /// `GRAPH_TENANT_ID` drive an interactive console sign-in.
    pub async fn sign_in(settings: &GraphSettings, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        if let Ok(token) = std::env::var("GRAPH_ACCESS_TOKEN") {
            info!("Using access token from environment, skipping device-code sign-in");
            return Ok(Self {
                client,
                access_token: token,
            });
        }

        let client_id = std::env::var("GRAPH_CLIENT_ID")
            .map_err(|_| "GRAPH_CLIENT_ID is not set in the environment")?;
        let tenant_id = std::env::var("GRAPH_TENANT_ID")
            .map_err(|_| "GRAPH_TENANT_ID is not set in the environment")?;

        let access_token =
            device_code_sign_in(&client, &client_id, &tenant_id, &settings.scopes).await?;
        Ok(Self {
            client,
            access_token,
        })
    }

    /// Fetch the signed-in user's profile.
    pub async fn get_user(&self) -> Result<UserProfile, ClientError> {
        let user = self
            .client
            .get(format!(
                "{GRAPH_BASE}/me?$select=displayName,mail,userPrincipalName"
            ))
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(user)
    }

    pub async fn get_notebooks(&self) -> Result<Vec<Notebook>, ClientError> {
        let collection: Collection<Notebook> = self
            .client
            .get(format!(
                "{GRAPH_BASE}/me/onenote/notebooks?$select=id,displayName"
            ))
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(collection.value)
    }

    pub async fn get_sections(&self, notebook_id: &str) -> Result<Vec<Section>, ClientError> {
        let collection: Collection<Section> = self
            .client
            .get(format!(
                "{GRAPH_BASE}/me/onenote/notebooks/{notebook_id}/sections?$select=id,displayName"
            ))
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(collection.value)
    }
}

#[async_trait]
impl NoteSink for GraphClient {
    async fn list_pages(&self, section_id: &str) -> Result<Vec<PageEntry>, ClientError> {
        let mut pages = Vec::new();
        let mut url =
            format!("{GRAPH_BASE}/me/onenote/sections/{section_id}/pages?$select=id,title");
        loop {
            let collection: Collection<PageRecord> = self
                .client
                .get(&url)
                .bearer_auth(&self.access_token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            pages.extend(collection.value.into_iter().map(|record| PageEntry {
                title: record.title.unwrap_or_default(),
                identifier: record.id,
            }));
            match collection.next_link {
                Some(next) => url = next,
                None => break,
            }
        }
        debug!(section_id, count = pages.len(), "Listed section pages");
        Ok(pages)
    }

    async fn create_page<'a>(
        &self,
        section_id: &str,
        page: NewPage<'a>,
    ) -> Result<(), ClientError> {
        let response = self
            .client
            .post(format!("{GRAPH_BASE}/me/onenote/sections/{section_id}/pages"))
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, page.content_type)
            .body(page.body.to_vec())
            .send()
            .await?;

        if response.status() != StatusCode::CREATED {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            warn!(section_id, %status, "Page creation rejected");
            return Err(format!("page creation returned {status}: {detail}").into());
        }
        info!(section_id, title = page.title, "Created page");
        Ok(())
    }
}

/// Run the OAuth device-code flow on the console: request a user code, tell
/// the operator where to enter it, poll the token endpoint until granted,
/// denied or expired.
async fn device_code_sign_in(
    client: &reqwest::Client,
    client_id: &str,
    tenant_id: &str,
    scopes: &str,
) -> Result<String, ClientError> {
    let grant: DeviceCodeGrant = client
        .post(format!("{LOGIN_BASE}/{tenant_id}/oauth2/v2.0/devicecode"))
        .form(&[("client_id", client_id), ("scope", scopes)])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    println!(
        "To sign in, open {} and enter the code {}",
        grant.verification_uri, grant.user_code
    );

    let interval = Duration::from_secs(grant.interval.unwrap_or(5));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(grant.expires_in);
    loop {
        if tokio::time::Instant::now() >= deadline {
            return Err("device-code sign-in expired before completion".into());
        }
        tokio::time::sleep(interval).await;

        let response = client
            .post(format!("{LOGIN_BASE}/{tenant_id}/oauth2/v2.0/token"))
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ("client_id", client_id),
                ("device_code", grant.device_code.as_str()),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            let token: TokenGrant = response.json().await?;
            info!("Device-code sign-in complete");
            return Ok(token.access_token);
        }

        let denial: TokenDenial = response.json().await?;
        match denial.error.as_str() {
            // Pending means the operator has not finished entering the code.
            "authorization_pending" => continue,
            "slow_down" => {
                tokio::time::sleep(interval).await;
                continue;
            }
            other => return Err(format!("device-code sign-in failed: {other}").into()),
        }
    }
}
