//! Local Mirror Manager - clones upstream repositories on first sight and
//! fast-forwards them on later runs.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{MirrorError, Result};
use crate::git::GitClient;

/// Outcome of synchronizing one local mirror with its upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// Mirror did not exist and was cloned
    Cloned { path: PathBuf },
    /// Mirror was fast-forwarded
    Updated { path: PathBuf, commits: u32 },
    /// Nothing new upstream
    AlreadyUpToDate { path: PathBuf },
    /// Local state prevents a fast-forward; the mirror was left untouched
    Diverged { path: PathBuf, reason: String },
}

impl MirrorOutcome {
    pub fn path(&self) -> &Path {
        match self {
            MirrorOutcome::Cloned { path }
            | MirrorOutcome::Updated { path, .. }
            | MirrorOutcome::AlreadyUpToDate { path }
            | MirrorOutcome::Diverged { path, .. } => path,
        }
    }
}

/// Keeps `<base_path>/<name>` working copies in step with their upstreams
#[derive(Debug, Clone)]
pub struct MirrorManager {
    base_path: PathBuf,
    upstream_remote: String,
    git: GitClient,
}

impl MirrorManager {
    pub fn new(base_path: impl Into<PathBuf>, upstream_remote: impl Into<String>, git: GitClient) -> Self {
        Self {
            base_path: base_path.into(),
            upstream_remote: upstream_remote.into(),
            git,
        }
    }

    /// Directory holding the mirror for `name`
    pub fn mirror_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    /// Clone `url` as `name`, or bring an existing clone up to date
    pub async fn sync_mirror(&self, name: &str, url: &str) -> Result<MirrorOutcome> {
        let path = self.mirror_path(name);

        if !GitClient::is_repository(&path) {
            info!("Cloning repository: {} -> {}", url, path.display());
            tokio::fs::create_dir_all(&self.base_path)
                .await
                .map_err(|e| MirrorError::io(&self.base_path, e))?;

            self.git
                .clone_repository(url, &path, &self.upstream_remote)
                .await?;

            self.mirror_branches(&path).await?;
            info!("Successfully cloned: {}", name);
            return Ok(MirrorOutcome::Cloned { path });
        }

        info!("{} already cloned, pulling from {}", name, self.upstream_remote);
        self.git.fetch(&path, &self.upstream_remote).await?;
        self.mirror_branches(&path).await?;

        let outcome = self.fast_forward(path).await?;
        match &outcome {
            MirrorOutcome::AlreadyUpToDate { .. } => {
                info!("{} already up to date, nothing to pull", name)
            }
            MirrorOutcome::Diverged { reason, .. } => {
                warn!("{} cannot be fast-forwarded from upstream: {}", name, reason)
            }
            MirrorOutcome::Updated { commits, .. } => {
                info!("Pulled {} commit(s) into {}", commits, name)
            }
            MirrorOutcome::Cloned { .. } => {}
        }

        Ok(outcome)
    }

    /// Reset every local branch except the checked-out one to its upstream
    /// counterpart, creating branches that only exist upstream. The checked-out
    /// branch is left to the fast-forward path.
    async fn mirror_branches(&self, path: &Path) -> Result<()> {
        let current = self.git.current_branch(path).await?;

        for branch in self.git.remote_branches(path, &self.upstream_remote).await? {
            if current.as_deref() == Some(branch.as_str()) {
                continue;
            }
            let upstream_ref = format!("refs/remotes/{}/{}", self.upstream_remote, branch);
            debug!("Mirroring branch {} from {}", branch, upstream_ref);
            self.git.set_branch(path, &branch, &upstream_ref).await?;
        }

        Ok(())
    }

    /// Classify the fetched mirror and fast-forward it when that is safe
    async fn fast_forward(&self, path: PathBuf) -> Result<MirrorOutcome> {
        let branch = match self.git.current_branch(&path).await? {
            Some(branch) => branch,
            None => {
                return Ok(MirrorOutcome::Diverged {
                    path,
                    reason: "HEAD is detached".to_string(),
                })
            }
        };

        let upstream_ref = format!("refs/remotes/{}/{}", self.upstream_remote, branch);
        if !self.git.ref_exists(&path, &upstream_ref).await? {
            return Ok(MirrorOutcome::Diverged {
                path,
                reason: format!("branch {} no longer exists on {}", branch, self.upstream_remote),
            });
        }

        let divergence = self.git.divergence(&path, &upstream_ref).await?;
        if divergence.behind == 0 {
            return Ok(MirrorOutcome::AlreadyUpToDate { path });
        }

        if self.git.has_local_modifications(&path).await? {
            return Ok(MirrorOutcome::Diverged {
                path,
                reason: "working tree has uncommitted changes".to_string(),
            });
        }

        if divergence.ahead > 0 {
            return Ok(MirrorOutcome::Diverged {
                path,
                reason: format!(
                    "{} local commit(s) not present upstream",
                    divergence.ahead
                ),
            });
        }

        self.git.fast_forward(&path, &upstream_ref).await?;
        Ok(MirrorOutcome::Updated {
            path,
            commits: divergence.behind,
        })
    }
}
