//! Common test utilities and helpers for repomirror tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use repomirror::config::{RuntimePaths, CONFIG_FILE_NAME};
use repomirror::Config;

/// Scratch area holding an upstream repository, a mirror base path and bare remotes
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub upstream: PathBuf,
    pub base_path: PathBuf,
}

impl TestEnvironment {
    /// Fresh environment whose upstream has a single commit on `main`
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let upstream = temp_dir.path().join("upstream").join("app.git");
        let base_path = temp_dir.path().join("repos");
        std::fs::create_dir_all(&upstream).expect("Failed to create upstream dir");

        git(&upstream, &["init", "-b", "main"]);
        commit_file(&upstream, "README.md", "# app\n", "Initial commit");

        Self {
            temp_dir,
            upstream,
            base_path,
        }
    }

    /// Upstream location usable as a clone URL
    pub fn upstream_url(&self) -> String {
        self.upstream.display().to_string()
    }

    /// Create an empty bare repository standing in for a platform remote
    pub fn bare_remote(&self, name: &str) -> String {
        let path = self.temp_dir.path().join("remotes").join(name);
        std::fs::create_dir_all(&path).expect("Failed to create bare remote dir");
        git(&path, &["init", "--bare", "-b", "main"]);
        path.display().to_string()
    }

    pub fn mirror_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    pub fn paths(&self) -> RuntimePaths {
        RuntimePaths {
            base_path: self.base_path.clone(),
            config_file: self.base_path.join(CONFIG_FILE_NAME),
        }
    }
}

/// Run git in `dir` with a fixed identity, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("Failed to run git");

    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Write `file` and commit it
pub fn commit_file(repo: &Path, file: &str, content: &str, message: &str) {
    std::fs::write(repo.join(file), content).expect("Failed to write file");
    git(repo, &["add", file]);
    git(repo, &["commit", "-m", message]);
}

pub fn head(repo: &Path) -> String {
    git(repo, &["rev-parse", "HEAD"])
}

/// Configuration that passes validation
pub fn valid_config() -> Config {
    Config {
        gh_user: "octo".to_string(),
        gh_key: "g".repeat(40),
        gl_user: "tanuki".to_string(),
        gl_key: "l".repeat(20),
        bb_user: "bucket".to_string(),
        bb_key: "b".repeat(20),
        az_org: "contoso".to_string(),
        az_key: "a".repeat(52),
        ..Default::default()
    }
}
