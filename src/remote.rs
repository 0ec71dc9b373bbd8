//! Remote Sync Orchestrator - registers a platform remote on a local mirror
//! and force-pushes every branch and tag to it.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{MirrorError, Result};
use crate::git::GitClient;
use crate::platform::Credentials;

/// Outcome of pushing a mirror to one platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// At least one ref changed on the remote
    Pushed { refs: usize },
    /// Nothing to push
    AlreadyUpToDate,
}

#[derive(Debug, Clone)]
pub struct RemoteSync {
    base_path: PathBuf,
    git: GitClient,
}

impl RemoteSync {
    pub fn new(base_path: impl Into<PathBuf>, git: GitClient) -> Self {
        Self {
            base_path: base_path.into(),
            git,
        }
    }

    /// Point remote `platform_id` of mirror `name` at `remote_url` and push
    pub async fn push_to_platform(
        &self,
        name: &str,
        platform_id: &str,
        remote_url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<PushOutcome> {
        let path = self.base_path.join(name);
        if !GitClient::is_repository(&path) {
            return Err(MirrorError::NotFound {
                what: "local mirror",
                name: name.to_string(),
            });
        }

        info!("Pushing latest {} to remote \"{}\"", name, platform_id);
        self.register_remote(&path, platform_id, remote_url).await?;

        let refs = self.git.push_all(&path, platform_id, credentials).await?;
        let updated = refs.iter().filter(|r| r.is_update()).count();

        if updated == 0 {
            info!("{} on remote \"{}\" already up to date", name, platform_id);
            return Ok(PushOutcome::AlreadyUpToDate);
        }

        info!(
            "{} on remote \"{}\" up to date ({} ref(s) pushed)",
            name, platform_id, updated
        );
        Ok(PushOutcome::Pushed { refs: updated })
    }

    /// Add the remote, replacing any existing entry so it never keeps a stale URL
    async fn register_remote(&self, path: &std::path::Path, name: &str, url: &str) -> Result<()> {
        let add_error = match self.git.add_remote(path, name, url).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if self.git.remote_url(path, name).await?.is_none() {
            return Err(add_error);
        }

        debug!("Remote \"{}\" already exists, recreating it", name);
        self.git.remove_remote(path, name).await?;
        self.git.add_remote(path, name, url).await
    }
}
