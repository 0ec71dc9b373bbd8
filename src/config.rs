use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MirrorError, Result};
use crate::platform::{Credentials, Platform};

/// File name of the configuration store inside the base path
pub const CONFIG_FILE_NAME: &str = ".config.yaml";

/// Marker file present inside Docker containers
const DOCKER_ENV_MARKER: &str = "/.dockerenv";

/// Credentials and run settings for repomirror.
///
/// Keys keep the short camelCase names of the on-disk store
/// (`ghUser`, `ghKey`, ...). Everything below the credentials is optional.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// GitHub username
    #[serde(default)]
    pub gh_user: String,

    /// GitHub organization; repositories are created in the user account when empty
    #[serde(default)]
    pub gh_org: String,

    /// GitHub API token
    #[serde(default)]
    pub gh_key: String,

    /// GitLab username
    #[serde(default)]
    pub gl_user: String,

    /// GitLab API token
    #[serde(default)]
    pub gl_key: String,

    /// Bitbucket username
    #[serde(default)]
    pub bb_user: String,

    /// Bitbucket app password
    #[serde(default)]
    pub bb_key: String,

    /// Azure DevOps organization
    #[serde(default)]
    pub az_org: String,

    /// Azure DevOps personal access token
    #[serde(default)]
    pub az_key: String,

    #[serde(flatten)]
    pub settings: RunSettings,
}

/// Optional knobs that tune a run
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSettings {
    /// Azure DevOps project that holds the mirrored repositories
    #[serde(default = "default_az_project")]
    pub az_project: String,

    /// Seconds between Azure project-creation status polls
    #[serde(default = "default_poll_interval")]
    pub az_poll_interval_secs: u64,

    /// Poll budget before project creation is reported as timed out
    #[serde(default = "default_max_poll_attempts")]
    pub az_max_poll_attempts: u32,

    /// Name of the git remote that tracks the upstream repository
    #[serde(default = "default_upstream_remote")]
    pub upstream_remote: String,

    /// Abort the whole run on the first failing repository
    #[serde(default)]
    pub fail_fast: bool,

    /// Timeout for individual platform API requests
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_az_project() -> String {
    "Mirrors".to_string()
}
fn default_poll_interval() -> u64 {
    5
}
fn default_max_poll_attempts() -> u32 {
    60
}
fn default_upstream_remote() -> String {
    "upstream".to_string()
}
fn default_request_timeout() -> u64 {
    60
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            az_project: default_az_project(),
            az_poll_interval_secs: default_poll_interval(),
            az_max_poll_attempts: default_max_poll_attempts(),
            upstream_remote: default_upstream_remote(),
            fail_fast: false,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl RunSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.az_poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Minimum token lengths accepted for each platform
const GITHUB_KEY_MIN: usize = 40;
const GITLAB_KEY_MIN: usize = 20;
const BITBUCKET_KEY_MIN: usize = 20;
const AZURE_KEY_MIN: usize = 52;

impl Config {
    /// Load the config at `path`, writing an empty template first if it is missing
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| MirrorError::io(parent, e))?;
            }
        }

        let config = Self::default();
        config.save(path)?;
        tracing::info!("Created configuration template at: {}", path.display());
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;

        serde_yaml::from_str(&content).map_err(|source| MirrorError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration with owner-only permissions
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|source| MirrorError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;

        std::fs::write(path, content).map_err(|e| MirrorError::io(path, e))?;
        restrict_permissions(path)?;

        Ok(())
    }

    /// Check every credential for presence and plausible shape
    pub fn validate(&self) -> Result<()> {
        non_empty("ghUser", &self.gh_user)?;
        min_length("ghKey", &self.gh_key, GITHUB_KEY_MIN, "GitHub tokens")?;
        non_empty("glUser", &self.gl_user)?;
        min_length("glKey", &self.gl_key, GITLAB_KEY_MIN, "GitLab tokens")?;
        non_empty("bbUser", &self.bb_user)?;
        min_length("bbKey", &self.bb_key, BITBUCKET_KEY_MIN, "Bitbucket tokens")?;
        non_empty("azOrg", &self.az_org)?;
        min_length("azKey", &self.az_key, AZURE_KEY_MIN, "Azure DevOps tokens")?;

        if self.settings.az_project.trim().is_empty() {
            return Err(MirrorError::validation("azProject", "Cannot be blank"));
        }
        if self.settings.upstream_remote.trim().is_empty() {
            return Err(MirrorError::validation("upstreamRemote", "Cannot be blank"));
        }
        if self.settings.az_max_poll_attempts == 0 {
            return Err(MirrorError::validation(
                "azMaxPollAttempts",
                "Must allow at least one poll",
            ));
        }

        Ok(())
    }

    /// Principal/secret pair for a platform
    pub fn credentials(&self, platform: Platform) -> Credentials {
        match platform {
            Platform::GitHub => Credentials::new(&self.gh_user, &self.gh_key),
            Platform::GitLab => Credentials::new(&self.gl_user, &self.gl_key),
            Platform::Bitbucket => Credentials::new(&self.bb_user, &self.bb_key),
            Platform::Azure => Credentials::new(&self.az_org, &self.az_key),
        }
    }

    /// GitHub organization, if one is configured
    pub fn github_org(&self) -> Option<&str> {
        let org = self.gh_org.trim();
        (!org.is_empty()).then_some(org)
    }
}

fn non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MirrorError::validation(field, "Cannot be blank"));
    }
    Ok(())
}

fn min_length(field: &str, value: &str, min: usize, label: &str) -> Result<()> {
    if value.len() < min {
        return Err(MirrorError::validation(
            field,
            format!("{} must be at least {} characters", label, min),
        ));
    }
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| MirrorError::io(path, e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Filesystem locations resolved once at startup and injected everywhere
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Directory holding every local mirror
    pub base_path: PathBuf,

    /// Location of the configuration store
    pub config_file: PathBuf,
}

impl RuntimePaths {
    /// Resolve paths from optional CLI overrides and container detection
    pub fn resolve(base_dir: Option<&str>, config_file: Option<&Path>) -> Result<Self> {
        let in_container = Path::new(DOCKER_ENV_MARKER).exists();
        Self::resolve_with(base_dir, config_file, in_container)
    }

    fn resolve_with(
        base_dir: Option<&str>,
        config_file: Option<&Path>,
        in_container: bool,
    ) -> Result<Self> {
        let raw = match base_dir {
            Some(dir) => shellexpand::full(dir)
                .map_err(|e| MirrorError::validation("base directory", e.to_string()))?
                .into_owned(),
            None if in_container => "/repos".to_string(),
            None => "repos".to_string(),
        };
        let base_path = path_clean::clean(&raw);

        let config_file = match config_file {
            Some(path) => path.to_path_buf(),
            None => base_path.join(CONFIG_FILE_NAME),
        };

        Ok(Self {
            base_path,
            config_file,
        })
    }
}
