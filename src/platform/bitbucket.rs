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

const BITBUCKET_API: &str = "https://api.bitbucket.org/2.0";

/// Bitbucket Cloud adapter using the 2.0 REST API with basic auth
pub struct BitbucketAdapter {
    client: Client,
    api_url: String,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct BitbucketRepo {
    slug: String,
    links: RepoLinks,
}

#[derive(Debug, Deserialize)]
struct RepoLinks {
    html: Link,
    #[serde(default)]
    clone: Vec<CloneLink>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Deserialize)]
struct CloneLink {
    name: String,
    href: String,
}

#[derive(Debug, Serialize)]
struct CreateRepo<'a> {
    scm: &'a str,
    is_private: bool,
}

impl TryFrom<BitbucketRepo> for RemoteRepository {
    type Error = MirrorError;

    fn try_from(repo: BitbucketRepo) -> Result<Self> {
        let clone_url = repo
            .links
            .clone
            .into_iter()
            .find(|link| link.name == "https")
            .map(|link| link.href)
            .ok_or_else(|| {
                MirrorError::platform(
                    Platform::Bitbucket,
                    None,
                    format!("no https clone link for repository {}", repo.slug),
                )
            })?;

        Ok(Self {
            name: repo.slug,
            clone_url,
            web_url: repo.links.html.href,
        })
    }
}

impl BitbucketAdapter {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self> {
        Self::with_api_url(credentials, BITBUCKET_API, timeout)
    }

    pub fn with_api_url(credentials: Credentials, api_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(Platform::Bitbucket, timeout)?,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn repo_url(&self, name: &str) -> String {
        format!(
            "{}/repositories/{}/{}",
            self.api_url, self.credentials.principal, name
        )
    }
}

#[async_trait]
impl PlatformAdapter for BitbucketAdapter {
    fn platform(&self) -> Platform {
        Platform::Bitbucket
    }

    async fn find_repository(&self, name: &str) -> Result<Option<RemoteRepository>> {
        let url = self.repo_url(name);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.principal, Some(&self.credentials.secret))
            .send()
            .await
            .map_err(|e| MirrorError::http(Platform::Bitbucket, e))?;

        match response.status() {
            // absent, not an error
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let repo: BitbucketRepo = read_json(Platform::Bitbucket, response).await?;
                Ok(Some(repo.try_into()?))
            }
            _ => Err(api_error(Platform::Bitbucket, response).await),
        }
    }

    async fn create_repository(&self, name: &str) -> Result<RemoteRepository> {
        let url = self.repo_url(name);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.credentials.principal, Some(&self.credentials.secret))
            .json(&CreateRepo {
                scm: "git",
                is_private: false,
            })
            .send()
            .await
            .map_err(|e| MirrorError::http(Platform::Bitbucket, e))?;

        match response.status() {
            status if status.is_success() => {
                let repo: BitbucketRepo = read_json(Platform::Bitbucket, response).await?;
                repo.try_into()
            }
            // duplicate slug for this owner
            StatusCode::BAD_REQUEST => {
                let error = api_error(Platform::Bitbucket, response).await;
                recover_existing(self, name, error).await
            }
            _ => Err(api_error(Platform::Bitbucket, response).await),
        }
    }

    fn push_target(&self, repository: &RemoteRepository) -> Result<PushTarget> {
        Ok(PushTarget {
            url: repository.clone_url.clone(),
            credentials: Some(self.credentials.clone()),
        })
    }
}
