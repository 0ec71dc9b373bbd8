//! Sync Engine - runs a whole mirror pass
//!
//! Phase one brings every local mirror up to date with its upstream. Phase two
//! walks the successfully mirrored repositories and, for each platform in the
//! fixed order GitHub, GitLab, Bitbucket, Azure DevOps, ensures the platform
//! repository exists and force-pushes the mirror to it.
//!
//! Failures are recorded per repository and the run continues, unless
//! `fail_fast` is set, in which case the first error aborts the run.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::config::{Config, RuntimePaths};
use crate::error::{MirrorError, Result};
use crate::git::GitClient;
use crate::mirror::{MirrorManager, MirrorOutcome};
use crate::platform::{adapters_from_config, ensure_remote_repository, Platform, PlatformAdapter};
use crate::remote::{PushOutcome, RemoteSync};

/// What happened to one repository on one platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSync {
    pub platform: Platform,
    /// Platform repository was created during this run
    pub created: bool,
    pub push: PushOutcome,
}

/// Per-repository record of a run
#[derive(Debug, Clone, Default)]
pub struct RepositoryReport {
    pub name: String,
    pub mirror: Option<MirrorOutcome>,
    pub platforms: Vec<PlatformSync>,
    pub errors: Vec<String>,
}

impl RepositoryReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn failed(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Results from a complete mirror run
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub cloned: usize,
    pub updated: usize,
    pub diverged: usize,
    pub repositories_created: usize,
    pub pushes: usize,
    pub pushes_up_to_date: usize,
    pub failed_repositories: usize,
    pub duration: Duration,
    pub reports: Vec<RepositoryReport>,
}

impl SyncSummary {
    fn compile(reports: Vec<RepositoryReport>, duration: Duration) -> Self {
        let mut summary = Self {
            total_repositories: reports.len(),
            cloned: 0,
            updated: 0,
            diverged: 0,
            repositories_created: 0,
            pushes: 0,
            pushes_up_to_date: 0,
            failed_repositories: 0,
            duration,
            reports: Vec::new(),
        };

        for report in &reports {
            match &report.mirror {
                Some(MirrorOutcome::Cloned { .. }) => summary.cloned += 1,
                Some(MirrorOutcome::Updated { .. }) => summary.updated += 1,
                Some(MirrorOutcome::Diverged { .. }) => summary.diverged += 1,
                Some(MirrorOutcome::AlreadyUpToDate { .. }) | None => {}
            }
            for sync in &report.platforms {
                if sync.created {
                    summary.repositories_created += 1;
                }
                match sync.push {
                    PushOutcome::Pushed { .. } => summary.pushes += 1,
                    PushOutcome::AlreadyUpToDate => summary.pushes_up_to_date += 1,
                }
            }
            if report.failed() {
                summary.failed_repositories += 1;
            }
        }

        summary.reports = reports;
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed_repositories > 0
    }
}

/// Sequences mirroring and platform pushes for a repository list
pub struct SyncEngine {
    mirrors: MirrorManager,
    remotes: RemoteSync,
    adapters: Vec<Box<dyn PlatformAdapter>>,
    fail_fast: bool,
}

impl SyncEngine {
    pub fn new(
        mirrors: MirrorManager,
        remotes: RemoteSync,
        adapters: Vec<Box<dyn PlatformAdapter>>,
        fail_fast: bool,
    ) -> Self {
        Self {
            mirrors,
            remotes,
            adapters,
            fail_fast,
        }
    }

    /// Build an engine with the four real platform adapters
    pub fn from_config(config: &Config, paths: &RuntimePaths) -> Result<Self> {
        config.validate()?;

        let git = GitClient::new();
        Ok(Self::new(
            MirrorManager::new(
                &paths.base_path,
                &config.settings.upstream_remote,
                git.clone(),
            ),
            RemoteSync::new(&paths.base_path, git),
            adapters_from_config(config)?,
            config.settings.fail_fast,
        ))
    }

    /// Mirror every repository, then push each mirror to every platform
    pub async fn run(&self, repos: &BTreeMap<String, String>) -> Result<SyncSummary> {
        let start_time = Instant::now();
        info!("Starting mirror run for {} repositories", repos.len());

        let mut reports: Vec<RepositoryReport> = Vec::with_capacity(repos.len());

        for (name, url) in repos {
            info!("Attempting to clone repository: {}", name);
            let mut report = RepositoryReport::new(name);
            match self.mirrors.sync_mirror(name, url).await {
                Ok(outcome) => report.mirror = Some(outcome),
                Err(e) => self.record(&mut report, "mirror", e)?,
            }
            reports.push(report);
        }

        for report in reports.iter_mut().filter(|r| r.mirror.is_some()) {
            for adapter in &self.adapters {
                let platform = adapter.platform();
                match self.sync_platform(adapter.as_ref(), &report.name).await {
                    Ok(sync) => report.platforms.push(sync),
                    Err(e) => self.record(report, &platform.to_string(), e)?,
                }
            }
        }

        let summary = SyncSummary::compile(reports, start_time.elapsed());

        info!(
            "Mirror run completed in {:.2}s: {} cloned, {} updated, {} diverged, {} created, {} pushed, {} failed",
            summary.duration.as_secs_f64(),
            summary.cloned,
            summary.updated,
            summary.diverged,
            summary.repositories_created,
            summary.pushes,
            summary.failed_repositories
        );

        Ok(summary)
    }

    /// Ensure the platform repository exists and push the mirror to it
    async fn sync_platform(&self, adapter: &dyn PlatformAdapter, name: &str) -> Result<PlatformSync> {
        let platform = adapter.platform();
        info!("Attempting to create {} in {}", name, platform);

        let ensured = ensure_remote_repository(adapter, name).await?;
        let target = adapter.push_target(&ensured.repository)?;

        let push = self
            .remotes
            .push_to_platform(name, platform.id(), &target.url, target.credentials.as_ref())
            .await?;

        Ok(PlatformSync {
            platform,
            created: !ensured.existed,
            push,
        })
    }

    /// Record a failure, or propagate it when running fail-fast
    fn record(&self, report: &mut RepositoryReport, stage: &str, err: MirrorError) -> Result<()> {
        if self.fail_fast {
            return Err(err);
        }
        error!("{} failed during {}: {}", report.name, stage, err);
        report.errors.push(format!("{}: {}", stage, err));
        Ok(())
    }
}
