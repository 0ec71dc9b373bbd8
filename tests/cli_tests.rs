//! Command line tests for the repomirror binary
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::{Command, Output};

fn repomirror(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_repomirror"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run repomirror")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_help_lists_subcommands() {
    let output = repomirror(&["--help"]);
    assert!(output.status.success());

    let text = stdout(&output);
    for command in ["sync", "list", "init", "doctor"] {
        assert!(predicate::str::contains(command).eval(&text), "missing {}", command);
    }
}

#[test]
fn test_init_writes_private_template() {
    let temp = assert_fs::TempDir::new().unwrap();
    let base = temp.child("repos");
    let base_arg = base.path().display().to_string();

    let output = repomirror(&["--base-dir", &base_arg, "init"]);
    assert!(output.status.success());

    let config = base.child(".config.yaml");
    config.assert(predicate::path::exists());
    config.assert(predicate::str::contains("ghUser"));
    config.assert(predicate::str::contains("azProject: Mirrors"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(config.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_list_prints_derived_names() {
    let temp = assert_fs::TempDir::new().unwrap();
    let list = temp.child("repolist.txt");
    list.write_str("# mirrors\nhttps://github.com/snyk/goof.git\n\nhttps://gitlab.com/group/lib/\n")
        .unwrap();
    let list_arg = list.path().display().to_string();

    let output = repomirror(&["list", "--list", &list_arg]);
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(predicate::str::contains("2 repositories").eval(&text));
    assert!(predicate::str::is_match(r"goof\.git\s+https://github\.com/snyk/goof\.git")
        .unwrap()
        .eval(&text));
    assert!(predicate::str::contains("lib").eval(&text));
}

#[test]
fn test_sync_with_template_config_fails() {
    let temp = assert_fs::TempDir::new().unwrap();
    let list = temp.child("repolist.txt");
    list.write_str("https://github.com/snyk/goof.git\n").unwrap();
    let base_arg = temp.child("repos").path().display().to_string();
    let list_arg = list.path().display().to_string();

    let output = repomirror(&["--base-dir", &base_arg, "sync", "--list", &list_arg]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(predicate::str::contains("incomplete").eval(&stderr));
    temp.child("repos/.config.yaml").assert(predicate::path::exists());
}

#[test]
fn test_doctor_reports_missing_config() {
    let temp = assert_fs::TempDir::new().unwrap();
    let base_arg = temp.child("repos").path().display().to_string();

    let output = repomirror(&["--base-dir", &base_arg, "doctor"]);
    assert!(!output.status.success());
    assert!(predicate::str::contains("repomirror init").eval(&stdout(&output)));
}
