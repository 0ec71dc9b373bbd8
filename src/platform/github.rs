use async_trait::async_trait;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{recover_existing, Credentials, Platform, PlatformAdapter, PushTarget, RemoteRepository};
use crate::error::{MirrorError, Result};

/// Status GitHub answers with when a repository name is already taken
const UNPROCESSABLE_ENTITY: u16 = 422;
const NOT_FOUND: u16 = 404;

/// GitHub adapter backed by octocrab
pub struct GitHubAdapter {
    client: Octocrab,
    credentials: Credentials,
    org: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    name: String,
    clone_url: String,
    html_url: String,
}

impl From<GitHubRepo> for RemoteRepository {
    fn from(repo: GitHubRepo) -> Self {
        Self {
            name: repo.name,
            clone_url: repo.clone_url,
            web_url: repo.html_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateRepo<'a> {
    name: &'a str,
    private: bool,
    description: &'a str,
}

impl GitHubAdapter {
    /// Create an adapter for the public GitHub API
    pub fn new(credentials: Credentials, org: Option<String>) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(credentials.secret.clone())
            .build()
            .map_err(|e| github_error(&e))?;

        Ok(Self::with_client(client, credentials, org))
    }

    /// Create an adapter against a custom API root (GitHub Enterprise, tests)
    pub fn with_base_uri(credentials: Credentials, org: Option<String>, base_uri: &str) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(credentials.secret.clone())
            .base_uri(base_uri)
            .map_err(|e| github_error(&e))?
            .build()
            .map_err(|e| github_error(&e))?;

        Ok(Self::with_client(client, credentials, org))
    }

    fn with_client(client: Octocrab, credentials: Credentials, org: Option<String>) -> Self {
        Self {
            client,
            credentials,
            org: org.filter(|o| !o.trim().is_empty()),
        }
    }

    /// Account that owns mirrored repositories
    fn owner(&self) -> &str {
        self.org.as_deref().unwrap_or(&self.credentials.principal)
    }

    fn create_route(&self) -> String {
        match &self.org {
            Some(org) => format!("/orgs/{}/repos", org),
            None => "/user/repos".to_string(),
        }
    }
}

fn status_of(err: &octocrab::Error) -> Option<u16> {
    match err {
        octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
        _ => None,
    }
}

fn github_error(err: &octocrab::Error) -> MirrorError {
    let message = match err {
        octocrab::Error::GitHub { source, .. } => source.message.clone(),
        other => other.to_string(),
    };
    MirrorError::platform(Platform::GitHub, status_of(err), message)
}

#[async_trait]
impl PlatformAdapter for GitHubAdapter {
    fn platform(&self) -> Platform {
        Platform::GitHub
    }

    async fn find_repository(&self, name: &str) -> Result<Option<RemoteRepository>> {
        let route = format!("/repos/{}/{}", self.owner(), name);
        debug!("GET {}", route);

        match self.client.get::<GitHubRepo, _, ()>(&route, None).await {
            Ok(repo) => Ok(Some(repo.into())),
            Err(e) if status_of(&e) == Some(NOT_FOUND) => Ok(None),
            Err(e) => Err(github_error(&e)),
        }
    }

    async fn create_repository(&self, name: &str) -> Result<RemoteRepository> {
        let route = self.create_route();
        debug!("POST {}", route);

        let body = CreateRepo {
            name,
            private: false,
            description: "",
        };

        match self.client.post::<_, GitHubRepo>(&route, Some(&body)).await {
            Ok(repo) => Ok(repo.into()),
            Err(e) if status_of(&e) == Some(UNPROCESSABLE_ENTITY) => {
                recover_existing(self, name, github_error(&e)).await
            }
            Err(e) => Err(github_error(&e)),
        }
    }

    fn push_target(&self, repository: &RemoteRepository) -> Result<PushTarget> {
        Ok(PushTarget {
            url: repository.clone_url.clone(),
            credentials: Some(self.credentials.clone()),
        })
    }
}
