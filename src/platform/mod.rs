//! Platform adapter abstraction layer
//!
//! Every hosting service implements [`PlatformAdapter`]: look a repository up,
//! create it, and describe how to push to it. The create-or-reuse state machine
//! lives in [`ensure_remote_repository`] so each backend only has to classify
//! its own "absent" and "already exists" signals.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::error::{MirrorError, Result};

pub mod azure;
pub mod bitbucket;
pub mod github;
pub mod gitlab;

pub use azure::AzureAdapter;
pub use bitbucket::BitbucketAdapter;
pub use github::GitHubAdapter;
pub use gitlab::GitLabAdapter;

/// Supported hosting services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    GitHub,
    GitLab,
    Bitbucket,
    Azure,
}

impl Platform {
    /// Fixed order in which platforms are synced
    pub const ALL: [Platform; 4] = [
        Platform::GitHub,
        Platform::GitLab,
        Platform::Bitbucket,
        Platform::Azure,
    ];

    /// Identifier used as the git remote name on local mirrors
    pub fn id(self) -> &'static str {
        match self {
            Platform::GitHub => "github",
            Platform::GitLab => "gitlab",
            Platform::Bitbucket => "bitbucket",
            Platform::Azure => "azure",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::GitHub => "GitHub",
            Platform::GitLab => "GitLab",
            Platform::Bitbucket => "Bitbucket",
            Platform::Azure => "Azure DevOps",
        };
        f.write_str(name)
    }
}

/// Principal/secret pair used for authenticated pushes
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub principal: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(principal: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("principal", &self.principal)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// A repository hosted on one of the platforms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    pub name: String,
    /// HTTPS URL suitable for an authenticated push
    pub clone_url: String,
    /// Browser URL, for reporting
    pub web_url: String,
}

/// Result of [`ensure_remote_repository`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredRepository {
    pub repository: RemoteRepository,
    /// Whether the repository was found rather than created during this call
    pub existed: bool,
}

/// Where and how a local mirror pushes to a platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub url: String,
    /// `None` when the URL already carries its credentials
    pub credentials: Option<Credentials>,
}

/// Contract every hosting backend implements
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Which platform this adapter talks to
    fn platform(&self) -> Platform;

    /// Look up a repository; `Ok(None)` means the backend reported it absent
    async fn find_repository(&self, name: &str) -> Result<Option<RemoteRepository>>;

    /// Create a repository. An "already exists" answer from the backend must
    /// resolve to the existing repository instead of an error.
    async fn create_repository(&self, name: &str) -> Result<RemoteRepository>;

    /// Push URL and credentials for a repository returned by this adapter
    fn push_target(&self, repository: &RemoteRepository) -> Result<PushTarget>;
}

/// Make sure `name` exists on the adapter's platform, creating it if needed
pub async fn ensure_remote_repository(
    adapter: &dyn PlatformAdapter,
    name: &str,
) -> Result<EnsuredRepository> {
    let platform = adapter.platform();

    if let Some(repository) = adapter.find_repository(name).await? {
        info!("{} already exists in {}", name, platform);
        return Ok(EnsuredRepository {
            repository,
            existed: true,
        });
    }

    info!("Creating {} in {}", name, platform);
    let repository = adapter.create_repository(name).await?;
    info!("{} available at {}", repository.name, repository.web_url);

    Ok(EnsuredRepository {
        repository,
        existed: false,
    })
}

/// Resolve an "already exists" answer from a create call into the existing repository
pub(crate) async fn recover_existing<A>(
    adapter: &A,
    name: &str,
    create_error: MirrorError,
) -> Result<RemoteRepository>
where
    A: PlatformAdapter + ?Sized,
{
    info!(
        "{} already exists in {}, fetching its metadata",
        name,
        adapter.platform()
    );
    match adapter.find_repository(name).await? {
        Some(repository) => Ok(repository),
        None => Err(create_error),
    }
}

/// Build all four adapters in sync order from a validated configuration
pub fn adapters_from_config(config: &Config) -> Result<Vec<Box<dyn PlatformAdapter>>> {
    let timeout = config.settings.request_timeout();

    Ok(vec![
        Box::new(GitHubAdapter::new(
            config.credentials(Platform::GitHub),
            config.github_org().map(str::to_string),
        )?),
        Box::new(GitLabAdapter::new(config.credentials(Platform::GitLab), timeout)?),
        Box::new(BitbucketAdapter::new(
            config.credentials(Platform::Bitbucket),
            timeout,
        )?),
        Box::new(AzureAdapter::new(
            config.credentials(Platform::Azure),
            &config.settings.az_project,
            PollPolicy {
                interval: config.settings.poll_interval(),
                max_attempts: config.settings.az_max_poll_attempts,
            },
            timeout,
        )?),
    ])
}

/// Fixed-interval, bounded polling budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

pub(crate) fn http_client(platform: Platform, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("repomirror/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| MirrorError::http(platform, e))
}

/// Turn a non-success response into a platform error, keeping the body as the message
pub(crate) async fn api_error(platform: Platform, response: reqwest::Response) -> MirrorError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_string()
    } else {
        body
    };
    MirrorError::platform(platform, Some(status.as_u16()), message)
}

/// Decode a JSON body from a successful response
pub(crate) async fn read_json<T>(platform: Platform, response: reqwest::Response) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    response
        .json::<T>()
        .await
        .map_err(|e| MirrorError::http(platform, e))
}
