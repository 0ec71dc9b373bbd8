use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{
    api_error, http_client, read_json, recover_existing, Credentials, Platform, PlatformAdapter,
    PushTarget, RemoteRepository,
};
use crate::error::{MirrorError, Result};

const GITLAB_API: &str = "https://gitlab.com/api/v4";
const NAME_TAKEN: &str = "has already been taken";

/// GitLab adapter using the v4 REST API
pub struct GitLabAdapter {
    client: Client,
    api_url: String,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct Project {
    name: String,
    http_url_to_repo: String,
    web_url: String,
}

impl From<Project> for RemoteRepository {
    fn from(project: Project) -> Self {
        Self {
            name: project.name,
            clone_url: project.http_url_to_repo,
            web_url: project.web_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateProject<'a> {
    name: &'a str,
    visibility: &'a str,
}

/// Validation failures come back as `{"message": {"<field>": ["<problem>", ...]}}`
#[derive(Debug, Deserialize)]
struct ValidationBody {
    message: serde_json::Value,
}

impl ValidationBody {
    fn name_taken(&self) -> bool {
        ["name", "path"].iter().any(|field| {
            self.message
                .get(field)
                .and_then(|problems| problems.as_array())
                .map(|problems| {
                    problems
                        .iter()
                        .filter_map(|p| p.as_str())
                        .any(|p| p == NAME_TAKEN)
                })
                .unwrap_or(false)
        })
    }
}

impl GitLabAdapter {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self> {
        Self::with_api_url(credentials, GITLAB_API, timeout)
    }

    pub fn with_api_url(credentials: Credentials, api_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(Platform::GitLab, timeout)?,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// URL-encoded `namespace/name` project id
    fn project_id(&self, name: &str) -> String {
        format!("{}%2F{}", self.credentials.principal, name)
    }
}

#[async_trait]
impl PlatformAdapter for GitLabAdapter {
    fn platform(&self) -> Platform {
        Platform::GitLab
    }

    async fn find_repository(&self, name: &str) -> Result<Option<RemoteRepository>> {
        let url = format!("{}/projects/{}", self.api_url, self.project_id(name));
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("PRIVATE-TOKEN", &self.credentials.secret)
            .send()
            .await
            .map_err(|e| MirrorError::http(Platform::GitLab, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let project: Project = read_json(Platform::GitLab, response).await?;
                Ok(Some(project.into()))
            }
            _ => Err(api_error(Platform::GitLab, response).await),
        }
    }

    async fn create_repository(&self, name: &str) -> Result<RemoteRepository> {
        let url = format!("{}/projects", self.api_url);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("PRIVATE-TOKEN", &self.credentials.secret)
            .json(&CreateProject {
                name,
                visibility: "public",
            })
            .send()
            .await
            .map_err(|e| MirrorError::http(Platform::GitLab, e))?;

        let status = response.status();
        if status.is_success() {
            let project: Project = read_json(Platform::GitLab, response).await?;
            return Ok(project.into());
        }

        let body = response.text().await.unwrap_or_default();
        let error = MirrorError::platform(Platform::GitLab, Some(status.as_u16()), body.clone());

        let taken = status == StatusCode::BAD_REQUEST
            && serde_json::from_str::<ValidationBody>(&body)
                .map(|b| b.name_taken())
                .unwrap_or(false);

        if taken {
            recover_existing(self, name, error).await
        } else {
            Err(error)
        }
    }

    fn push_target(&self, repository: &RemoteRepository) -> Result<PushTarget> {
        Ok(PushTarget {
            url: repository.clone_url.clone(),
            credentials: Some(self.credentials.clone()),
        })
    }
}
