//! Azure DevOps adapter
//!
//! Repositories live inside a team project which has to exist first. Project
//! creation is asynchronous on the Azure side: the create call returns an
//! operation reference that is polled until it settles. The push URL carries
//! the personal access token in its authority because Azure Repos does not
//! accept the credential-pair flow used for the other platforms.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    api_error, http_client, read_json, recover_existing, Credentials, Platform, PlatformAdapter,
    PollPolicy, PushTarget, RemoteRepository,
};
use crate::error::{MirrorError, Result};

const AZURE_DEVOPS: &str = "https://dev.azure.com";
const API_VERSION: &str = "7.0";
/// Agile process template
const PROCESS_TEMPLATE_ID: &str = "b8a3a935-7e91-48b8-a94c-606d37c3e9f2";

pub struct AzureAdapter {
    client: Client,
    /// Organization root, e.g. `https://dev.azure.com/contoso`
    org_url: String,
    credentials: Credentials,
    project: String,
    poll: PollPolicy,
    project_ready: AtomicBool,
}

/// State of an asynchronous Azure DevOps operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Succeeded,
    Failed(String),
}

impl OperationState {
    fn from_status(status: &str) -> Self {
        match status {
            "succeeded" => OperationState::Succeeded,
            "failed" | "cancelled" => OperationState::Failed(status.to_string()),
            // notSet, queued, inProgress
            _ => OperationState::Pending,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TeamProject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OperationReference {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Operation {
    status: String,
    #[serde(default, rename = "detailedMessage")]
    detailed_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GitRepository {
    name: String,
    remote_url: String,
    web_url: String,
}

impl From<GitRepository> for RemoteRepository {
    fn from(repo: GitRepository) -> Self {
        Self {
            name: repo.name,
            clone_url: repo.remote_url,
            web_url: repo.web_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateRepository<'a> {
    name: &'a str,
}

impl AzureAdapter {
    /// Adapter for `https://dev.azure.com/<organization>`
    pub fn new(
        credentials: Credentials,
        project: &str,
        poll: PollPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        let org_url = format!("{}/{}", AZURE_DEVOPS, credentials.principal);
        Self::with_org_url(credentials, project, poll, &org_url, timeout)
    }

    /// Adapter against an explicit organization root
    pub fn with_org_url(
        credentials: Credentials,
        project: &str,
        poll: PollPolicy,
        org_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(Platform::Azure, timeout)?,
            org_url: org_url.trim_end_matches('/').to_string(),
            credentials,
            project: project.to_string(),
            poll,
            project_ready: AtomicBool::new(false),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!("GET {}", url);
        self.client
            .get(url)
            .query(&[("api-version", API_VERSION)])
            .basic_auth("", Some(&self.credentials.secret))
            .send()
            .await
            .map_err(|e| MirrorError::http(Platform::Azure, e))
    }

    async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<reqwest::Response> {
        debug!("POST {}", url);
        self.client
            .post(url)
            .query(&[("api-version", API_VERSION)])
            .basic_auth("", Some(&self.credentials.secret))
            .json(body)
            .send()
            .await
            .map_err(|e| MirrorError::http(Platform::Azure, e))
    }

    async fn find_project(&self) -> Result<Option<TeamProject>> {
        let url = format!("{}/_apis/projects/{}", self.org_url, self.project);
        let response = self.get(&url).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(read_json(Platform::Azure, response).await?)),
            _ => Err(api_error(Platform::Azure, response).await),
        }
    }

    async fn queue_project_creation(&self) -> Result<OperationReference> {
        let url = format!("{}/_apis/projects", self.org_url);
        let body = json!({
            "name": self.project,
            "description": "Mirrored upstream repositories",
            "visibility": "public",
            "capabilities": {
                "versioncontrol": { "sourceControlType": "Git" },
                "processTemplate": { "templateTypeId": PROCESS_TEMPLATE_ID },
            },
        });

        let response = self.post(&url, &body).await?;
        if !response.status().is_success() {
            return Err(api_error(Platform::Azure, response).await);
        }
        read_json(Platform::Azure, response).await
    }

    async fn operation_state(&self, id: &str) -> Result<OperationState> {
        let url = format!("{}/_apis/operations/{}", self.org_url, id);
        let response = self.get(&url).await?;
        if !response.status().is_success() {
            return Err(api_error(Platform::Azure, response).await);
        }

        let operation: Operation = read_json(Platform::Azure, response).await?;
        Ok(match OperationState::from_status(&operation.status) {
            OperationState::Failed(status) => OperationState::Failed(
                operation
                    .detailed_message
                    .map(|msg| format!("{}: {}", status, msg))
                    .unwrap_or(status),
            ),
            state => state,
        })
    }

    /// Poll an operation until it settles or the budget runs out
    async fn wait_for_operation(&self, id: &str) -> Result<()> {
        for attempt in 1..=self.poll.max_attempts {
            match self.operation_state(id).await? {
                OperationState::Succeeded => return Ok(()),
                OperationState::Failed(reason) => {
                    return Err(MirrorError::platform(
                        Platform::Azure,
                        None,
                        format!("creation of project {} {}", self.project, reason),
                    ));
                }
                OperationState::Pending => {
                    info!(
                        "Creating project {}... ({}/{})",
                        self.project, attempt, self.poll.max_attempts
                    );
                    if attempt < self.poll.max_attempts {
                        tokio::time::sleep(self.poll.interval).await;
                    }
                }
            }
        }

        Err(MirrorError::Timeout {
            operation: format!("Azure DevOps project creation for {}", self.project),
            attempts: self.poll.max_attempts,
        })
    }

    /// Make sure the team project exists; only checked once per adapter
    async fn ensure_project(&self) -> Result<()> {
        if self.project_ready.load(Ordering::SeqCst) {
            return Ok(());
        }

        if self.find_project().await?.is_none() {
            info!(
                "Creating project {} in Azure DevOps org {}",
                self.project, self.credentials.principal
            );
            let operation = self.queue_project_creation().await?;
            self.wait_for_operation(&operation.id).await?;

            let project = self.find_project().await?.ok_or_else(|| MirrorError::NotFound {
                what: "Azure DevOps project",
                name: self.project.clone(),
            })?;
            info!(
                "Created project {} in Azure DevOps org {}",
                project.name, self.credentials.principal
            );
        }

        self.project_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn repositories_url(&self) -> String {
        format!("{}/{}/_apis/git/repositories", self.org_url, self.project)
    }
}

/// Embed a token into the authority of an HTTPS remote URL
pub fn embed_token(remote_url: &str, token: &str) -> Result<String> {
    let invalid = |reason: &str| {
        MirrorError::platform(
            Platform::Azure,
            None,
            format!("cannot embed token into remote URL: {}", reason),
        )
    };

    let mut url = Url::parse(remote_url).map_err(|e| invalid(&e.to_string()))?;
    let embedded = if url.username().is_empty() {
        url.set_username(token)
    } else {
        url.set_password(Some(token))
    };
    embedded.map_err(|_| invalid("URL has no host"))?;

    Ok(url.to_string())
}

#[async_trait]
impl PlatformAdapter for AzureAdapter {
    fn platform(&self) -> Platform {
        Platform::Azure
    }

    async fn find_repository(&self, name: &str) -> Result<Option<RemoteRepository>> {
        self.ensure_project().await?;

        let url = format!("{}/{}", self.repositories_url(), name);
        let response = self.get(&url).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let repo: GitRepository = read_json(Platform::Azure, response).await?;
                Ok(Some(repo.into()))
            }
            _ => Err(api_error(Platform::Azure, response).await),
        }
    }

    async fn create_repository(&self, name: &str) -> Result<RemoteRepository> {
        self.ensure_project().await?;

        let response = self
            .post(&self.repositories_url(), &CreateRepository { name })
            .await?;

        match response.status() {
            status if status.is_success() => {
                let repo: GitRepository = read_json(Platform::Azure, response).await?;
                Ok(repo.into())
            }
            StatusCode::CONFLICT => {
                let error = api_error(Platform::Azure, response).await;
                recover_existing(self, name, error).await
            }
            _ => Err(api_error(Platform::Azure, response).await),
        }
    }

    fn push_target(&self, repository: &RemoteRepository) -> Result<PushTarget> {
        Ok(PushTarget {
            url: embed_token(&repository.clone_url, &self.credentials.secret)?,
            credentials: None,
        })
    }
}
