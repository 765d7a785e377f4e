//! Integration tests for the umake binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn umake() -> Command {
    let mut cmd = Command::new(cargo_bin("umake"));
    cmd.env("NO_COLOR", "1");
    cmd
}

#[cfg(unix)]
fn fake_apt_get(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("apt-get");
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// As root the helper runs only /usr/bin/apt-get and refuses `--apt-get`.
#[cfg(unix)]
fn assert_replacement_refused(assert: assert_cmd::assert::Assert) {
    assert
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Refusing to run"));
}

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    umake()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("package requirements"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("privileged-helper").not());
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    umake()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn cli_requires_a_subcommand() -> Result<(), Box<dyn std::error::Error>> {
    umake().assert().failure();
    Ok(())
}

#[test]
fn install_requires_packages() -> Result<(), Box<dyn std::error::Error>> {
    umake()
        .arg("install")
        .assert()
        .failure()
        .stderr(predicate::str::contains("SPECIFIER"));
    Ok(())
}

#[test]
fn check_requires_packages() -> Result<(), Box<dyn std::error::Error>> {
    umake().args(["check", "--json"]).assert().failure();
    Ok(())
}

#[test]
fn invalid_config_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let config = temp.path().join("umake.yml");
    fs::write(&config, "requirements:\n  reload_retry:\n    max_attempts: 0\n")?;

    umake()
        .arg("--config")
        .arg(&config)
        .args(["check", "make"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid configuration"));
    Ok(())
}

#[test]
fn missing_config_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;

    umake()
        .arg("--config")
        .arg(temp.path().join("absent.yml"))
        .args(["install", "make"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration not found"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn helper_speaks_protocol_on_stdout() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let apt_get = fake_apt_get(
        temp.path(),
        r#"
case "$*" in
  *--print-uris*)
    echo "'http://archive/x.deb' x.deb 1000 SHA256:0"
    ;;
  *)
    echo "Reading package lists..."
    echo "dlstatus:1:100:Retrieving file 1 of 1"
    echo "pmstatus:x:100:Installed x"
    ;;
esac
"#,
    );

    let assert = umake()
        .arg("privileged-helper")
        .arg("--apt-get")
        .arg(&apt_get)
        .args(["commit", "--install", "x"])
        .assert();
    if umake::shell::is_elevated() {
        assert_replacement_refused(assert);
        return Ok(());
    }
    assert
        .success()
        .stdout(predicate::str::contains("fetch 1000 1 1000 1"))
        .stdout(predicate::str::contains("apply 100"))
        .stdout(predicate::str::ends_with("done\n"))
        .stderr(predicate::str::contains("Reading package lists..."));
    Ok(())
}

#[cfg(unix)]
#[test]
fn helper_reports_apt_failure() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let apt_get = fake_apt_get(
        temp.path(),
        r#"
case "$*" in
  *--print-uris*) ;;
  *)
    echo "E: Unable to locate package nope" >&2
    exit 100
    ;;
esac
"#,
    );

    let assert = umake()
        .arg("privileged-helper")
        .arg("--apt-get")
        .arg(&apt_get)
        .args(["commit", "--install", "nope"])
        .assert();
    if umake::shell::is_elevated() {
        assert_replacement_refused(assert);
        return Ok(());
    }
    assert
        .code(1)
        .stdout(predicate::str::starts_with("error "))
        .stdout(predicate::str::contains("Unable to locate package nope"));
    Ok(())
}
