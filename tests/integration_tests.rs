//! Integration tests for repomirror against real git repositories
mod common;

use assert_matches::assert_matches;
use async_trait::async_trait;
use std::collections::BTreeMap;

use common::{commit_file, git, head, valid_config, TestEnvironment};
use repomirror::platform::{PushTarget, RemoteRepository};
use repomirror::{
    GitClient, MirrorError, MirrorManager, MirrorOutcome, Platform, PlatformAdapter, PushOutcome,
    RemoteSync, Result, SyncEngine,
};

fn manager(env: &TestEnvironment) -> MirrorManager {
    MirrorManager::new(&env.base_path, "upstream", GitClient::new())
}

#[tokio::test]
async fn test_mirror_clone_then_already_up_to_date() {
    let env = TestEnvironment::new();
    let mirrors = manager(&env);

    let first = mirrors.sync_mirror("app.git", &env.upstream_url()).await.unwrap();
    assert_matches!(first, MirrorOutcome::Cloned { ref path } if *path == env.mirror_path("app.git"));
    assert_eq!(head(&env.mirror_path("app.git")), head(&env.upstream));

    let remote = GitClient::new()
        .remote_url(&env.mirror_path("app.git"), "upstream")
        .await
        .unwrap();
    assert_eq!(remote.as_deref(), Some(env.upstream_url().as_str()));

    let second = mirrors.sync_mirror("app.git", &env.upstream_url()).await.unwrap();
    assert_matches!(second, MirrorOutcome::AlreadyUpToDate { .. });
}

#[tokio::test]
async fn test_mirror_fast_forwards_upstream_commits() {
    let env = TestEnvironment::new();
    let mirrors = manager(&env);
    mirrors.sync_mirror("app.git", &env.upstream_url()).await.unwrap();

    commit_file(&env.upstream, "src.txt", "one\n", "Add source");
    commit_file(&env.upstream, "src.txt", "two\n", "Update source");

    let outcome = mirrors.sync_mirror("app.git", &env.upstream_url()).await.unwrap();
    assert_matches!(outcome, MirrorOutcome::Updated { commits: 2, .. });
    assert_eq!(head(&env.mirror_path("app.git")), head(&env.upstream));
}

#[tokio::test]
async fn test_mirror_with_local_changes_is_diverged() {
    let env = TestEnvironment::new();
    let mirrors = manager(&env);
    mirrors.sync_mirror("app.git", &env.upstream_url()).await.unwrap();

    let mirror = env.mirror_path("app.git");
    let before = head(&mirror);
    std::fs::write(mirror.join("README.md"), "edited locally\n").unwrap();
    commit_file(&env.upstream, "src.txt", "one\n", "Add source");

    let outcome = mirrors.sync_mirror("app.git", &env.upstream_url()).await.unwrap();
    assert_matches!(outcome, MirrorOutcome::Diverged { ref reason, .. } if reason.contains("uncommitted"));
    assert_eq!(head(&mirror), before);
}

#[tokio::test]
async fn test_mirror_with_local_commits_is_diverged() {
    let env = TestEnvironment::new();
    let mirrors = manager(&env);
    mirrors.sync_mirror("app.git", &env.upstream_url()).await.unwrap();

    let mirror = env.mirror_path("app.git");
    commit_file(&mirror, "local.txt", "mine\n", "Local work");
    commit_file(&env.upstream, "src.txt", "theirs\n", "Upstream work");

    let outcome = mirrors.sync_mirror("app.git", &env.upstream_url()).await.unwrap();
    assert_matches!(outcome, MirrorOutcome::Diverged { ref reason, .. } if reason.contains("1 local commit"));
}

#[tokio::test]
async fn test_mirror_clone_failure_is_remote_protocol_error() {
    let env = TestEnvironment::new();
    let missing = env.temp_dir.path().join("nowhere").display().to_string();

    let err = manager(&env).sync_mirror("nowhere", &missing).await.unwrap_err();
    assert_matches!(err, MirrorError::RemoteProtocol { .. });
}

#[tokio::test]
async fn test_push_twice_is_up_to_date_the_second_time() {
    let env = TestEnvironment::new();
    manager(&env).sync_mirror("app.git", &env.upstream_url()).await.unwrap();
    git(&env.upstream, &["tag", "v1.0"]);
    manager(&env).sync_mirror("app.git", &env.upstream_url()).await.unwrap();

    let target = env.bare_remote("github-app.git");
    let remotes = RemoteSync::new(&env.base_path, GitClient::new());

    let first = remotes
        .push_to_platform("app.git", "github", &target, None)
        .await
        .unwrap();
    assert_matches!(first, PushOutcome::Pushed { refs } if refs >= 2);

    let target_path = std::path::Path::new(&target);
    assert_eq!(git(target_path, &["rev-parse", "refs/heads/main"]), head(&env.upstream));
    assert_eq!(git(target_path, &["tag", "--list"]), "v1.0");

    let second = remotes
        .push_to_platform("app.git", "github", &target, None)
        .await
        .unwrap();
    assert_eq!(second, PushOutcome::AlreadyUpToDate);
}

#[tokio::test]
async fn test_every_upstream_branch_reaches_the_platform() {
    let env = TestEnvironment::new();
    git(&env.upstream, &["checkout", "-q", "-b", "develop"]);
    commit_file(&env.upstream, "dev.txt", "wip\n", "Develop work");
    let develop = head(&env.upstream);
    git(&env.upstream, &["checkout", "-q", "main"]);

    let mirrors = manager(&env);
    mirrors.sync_mirror("app.git", &env.upstream_url()).await.unwrap();

    // a branch appearing upstream after the first clone
    git(&env.upstream, &["checkout", "-q", "-b", "release"]);
    commit_file(&env.upstream, "release.txt", "1.0\n", "Release notes");
    let release = head(&env.upstream);
    git(&env.upstream, &["checkout", "-q", "main"]);

    let outcome = mirrors.sync_mirror("app.git", &env.upstream_url()).await.unwrap();
    assert_matches!(outcome, MirrorOutcome::AlreadyUpToDate { .. });
    assert_eq!(git(&env.mirror_path("app.git"), &["symbolic-ref", "--short", "HEAD"]), "main");

    let target = env.bare_remote("branches.git");
    let remotes = RemoteSync::new(&env.base_path, GitClient::new());
    remotes
        .push_to_platform("app.git", "github", &target, None)
        .await
        .unwrap();

    let target_path = std::path::Path::new(&target);
    assert_eq!(git(target_path, &["rev-parse", "refs/heads/main"]), head(&env.upstream));
    assert_eq!(git(target_path, &["rev-parse", "refs/heads/develop"]), develop);
    assert_eq!(git(target_path, &["rev-parse", "refs/heads/release"]), release);
}

#[tokio::test]
async fn test_push_overwrites_diverged_platform_history() {
    let env = TestEnvironment::new();
    manager(&env).sync_mirror("app.git", &env.upstream_url()).await.unwrap();

    let target = env.bare_remote("gitlab-app.git");
    let remotes = RemoteSync::new(&env.base_path, GitClient::new());
    remotes
        .push_to_platform("app.git", "gitlab", &target, None)
        .await
        .unwrap();

    // Rewrite the mirror so the platform copy is no longer an ancestor
    let mirror = env.mirror_path("app.git");
    git(&mirror, &["commit", "--amend", "-m", "Rewritten"]);

    let outcome = remotes
        .push_to_platform("app.git", "gitlab", &target, None)
        .await
        .unwrap();
    assert_eq!(outcome, PushOutcome::Pushed { refs: 1 });
    assert_eq!(
        git(std::path::Path::new(&target), &["rev-parse", "refs/heads/main"]),
        head(&mirror)
    );
}

#[tokio::test]
async fn test_remote_readd_replaces_url() {
    let env = TestEnvironment::new();
    manager(&env).sync_mirror("app.git", &env.upstream_url()).await.unwrap();

    let old_target = env.bare_remote("old.git");
    let new_target = env.bare_remote("new.git");
    let remotes = RemoteSync::new(&env.base_path, GitClient::new());

    remotes
        .push_to_platform("app.git", "bitbucket", &old_target, None)
        .await
        .unwrap();
    remotes
        .push_to_platform("app.git", "bitbucket", &new_target, None)
        .await
        .unwrap();

    let client = GitClient::new();
    let mirror = env.mirror_path("app.git");
    let names = client.remotes(&mirror).await.unwrap();
    assert_eq!(names.iter().filter(|n| *n == "bitbucket").count(), 1);
    assert_eq!(
        client.remote_url(&mirror, "bitbucket").await.unwrap(),
        Some(new_target.clone())
    );
    assert_eq!(
        git(std::path::Path::new(&new_target), &["rev-parse", "refs/heads/main"]),
        head(&env.upstream)
    );
}

/// Platform stand-in backed by a local bare repository
struct LocalPlatform {
    platform: Platform,
    bare_url: String,
    exists: std::sync::Mutex<bool>,
}

impl LocalPlatform {
    fn new(platform: Platform, bare_url: String, exists: bool) -> Self {
        Self {
            platform,
            bare_url,
            exists: std::sync::Mutex::new(exists),
        }
    }

    fn repository(&self, name: &str) -> RemoteRepository {
        RemoteRepository {
            name: name.to_string(),
            clone_url: self.bare_url.clone(),
            web_url: format!("https://{}.example/{}", self.platform.id(), name),
        }
    }
}

#[async_trait]
impl PlatformAdapter for LocalPlatform {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn find_repository(&self, name: &str) -> Result<Option<RemoteRepository>> {
        let exists = *self.exists.lock().unwrap();
        Ok(exists.then(|| self.repository(name)))
    }

    async fn create_repository(&self, name: &str) -> Result<RemoteRepository> {
        *self.exists.lock().unwrap() = true;
        Ok(self.repository(name))
    }

    fn push_target(&self, repository: &RemoteRepository) -> Result<PushTarget> {
        Ok(PushTarget {
            url: repository.clone_url.clone(),
            credentials: None,
        })
    }
}

#[tokio::test]
async fn test_end_to_end_mirror_of_app_git() {
    let env = TestEnvironment::new();
    let targets: Vec<(Platform, String)> = Platform::ALL
        .iter()
        .map(|p| (*p, env.bare_remote(&format!("{}/app.git", p.id()))))
        .collect();

    let build_engine = || {
        let adapters: Vec<Box<dyn PlatformAdapter>> = targets
            .iter()
            .map(|(platform, url)| {
                // GitHub and Azure already host the repository
                let exists = matches!(platform, Platform::GitHub | Platform::Azure);
                Box::new(LocalPlatform::new(*platform, url.clone(), exists)) as Box<dyn PlatformAdapter>
            })
            .collect();
        let git = GitClient::new();
        SyncEngine::new(
            MirrorManager::new(&env.base_path, "upstream", git.clone()),
            RemoteSync::new(&env.base_path, git),
            adapters,
            false,
        )
    };

    let mut repos = BTreeMap::new();
    repos.insert("app.git".to_string(), env.upstream_url());

    let summary = build_engine().run(&repos).await.unwrap();
    assert!(!summary.has_failures(), "{:?}", summary.reports);
    assert_eq!(summary.cloned, 1);
    assert_eq!(summary.repositories_created, 2);
    assert_eq!(summary.pushes, 4);

    let mirror = env.mirror_path("app.git");
    let mut remotes = GitClient::new().remotes(&mirror).await.unwrap();
    remotes.sort();
    assert_eq!(remotes, vec!["azure", "bitbucket", "github", "gitlab", "upstream"]);

    let report = &summary.reports[0];
    let order: Vec<Platform> = report.platforms.iter().map(|s| s.platform).collect();
    assert_eq!(order, Platform::ALL.to_vec());

    for (_, url) in &targets {
        assert_eq!(
            git(std::path::Path::new(url), &["rev-parse", "refs/heads/main"]),
            head(&env.upstream)
        );
    }

    // a second run with no upstream change has nothing to do
    let summary = build_engine().run(&repos).await.unwrap();
    assert_matches!(summary.reports[0].mirror, Some(MirrorOutcome::AlreadyUpToDate { .. }));
    assert_eq!(summary.pushes, 0);
    assert_eq!(summary.pushes_up_to_date, 4);
}

#[tokio::test]
async fn test_from_config_rejects_incomplete_credentials() {
    let env = TestEnvironment::new();
    let mut config = valid_config();
    config.az_key = "short".to_string();

    let err = SyncEngine::from_config(&config, &env.paths()).err().unwrap();
    assert_matches!(err, MirrorError::Validation { ref field, .. } if field == "azKey");
}
