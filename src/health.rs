//! Preflight checks run by `repomirror doctor`

use std::path::Path;
use std::process::Command;

use crate::config::{Config, RuntimePaths};

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Git installation status
    pub git: CheckResult,
    /// Base directory status
    pub base_dir: CheckResult,
    /// Configuration store status
    pub config: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: None,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
        }
    }
}

impl HealthCheck {
    pub fn run(paths: &RuntimePaths) -> Self {
        Self {
            git: Self::check_git(),
            base_dir: Self::check_base_dir(&paths.base_path),
            config: Self::check_config(&paths.config_file),
        }
    }

    pub fn all_passed(&self) -> bool {
        self.git.passed && self.base_dir.passed && self.config.passed
    }

    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 3] {
        [
            ("Git", &self.git),
            ("Base directory", &self.base_dir),
            ("Configuration", &self.config),
        ]
    }

    fn check_git() -> CheckResult {
        match Command::new("git").arg("--version").output() {
            Ok(output) if output.status.success() => {
                CheckResult::ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            Ok(output) => CheckResult::error_with_details(
                "git is installed but not working",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ),
            Err(e) => CheckResult::error_with_details("git is not installed", e.to_string()),
        }
    }

    fn check_base_dir(base: &Path) -> CheckResult {
        if !base.exists() {
            return match std::fs::create_dir_all(base) {
                Ok(()) => CheckResult::ok(format!("Created {}", base.display())),
                Err(e) => CheckResult::error_with_details(
                    format!("Cannot create {}", base.display()),
                    e.to_string(),
                ),
            };
        }

        if !base.is_dir() {
            return CheckResult::error(format!("{} is not a directory", base.display()));
        }

        let probe = base.join(".repomirror-write-test");
        match std::fs::write(&probe, b"") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                CheckResult::ok(format!("{} is writable", base.display()))
            }
            Err(e) => CheckResult::error_with_details(
                format!("{} is not writable", base.display()),
                e.to_string(),
            ),
        }
    }

    fn check_config(path: &Path) -> CheckResult {
        if !path.exists() {
            return CheckResult::error_with_details(
                format!("No configuration at {}", path.display()),
                "Run: repomirror init",
            );
        }

        match Config::load(path).and_then(|config| config.validate()) {
            Ok(()) => CheckResult::ok(format!("{} is complete", path.display())),
            Err(e) => CheckResult::error_with_details(
                format!("{} is incomplete", path.display()),
                e.to_string(),
            ),
        }
    }
}
