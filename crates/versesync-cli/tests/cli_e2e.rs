#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn versesync(data: &TempDir) -> Command {
    let mut cmd = Command::new(cargo_bin("versesync"));
    cmd.env("VERSESYNC_DATA", data.path().as_os_str())
        .env_remove("VERSESYNC_LOG");
    cmd
}

#[test]
fn adapters_lists_both_backends() {
    let data = TempDir::new().unwrap();
    versesync(&data)
        .arg("adapters")
        .assert()
        .success()
        .stdout(predicate::str::contains("local-folder"))
        .stdout(predicate::str::contains("google-drive"));
}

#[test]
fn local_folder_workflow() {
    let data = TempDir::new().unwrap();
    let shared = TempDir::new().unwrap();
    let folder = shared.path().join("bible");

    // 1. Connect, creating the folder
    versesync(&data)
        .args(["connect", "local-folder", "--dir"])
        .arg(&folder)
        .assert()
        .success()
        .stdout(predicate::str::contains("Connected to Local folder"));
    assert!(data.path().join("session.json").exists());

    // 2. Status remembers the selection in a new process
    versesync(&data)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Local folder (local-folder)"))
        .stdout(predicate::str::contains("State:        connected"));

    // 3. First sync creates the remote file
    versesync(&data)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced with Local folder"));
    assert!(folder.join("bible-sync-data.json").exists());

    // 4. Restore needs confirmation
    versesync(&data)
        .arg("restore")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
    versesync(&data)
        .args(["restore", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored from Local folder"));

    // 5. Forgetting the grant leaves nothing to resume
    versesync(&data)
        .args(["disconnect", "--forget"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Disconnected from Local folder"));
    versesync(&data)
        .arg("sync")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Not connected"));
}

#[test]
fn sync_without_backend_fails() {
    let data = TempDir::new().unwrap();
    versesync(&data)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn unknown_backend_is_rejected() {
    let data = TempDir::new().unwrap();
    versesync(&data)
        .args(["use", "dropbox"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown sync backend: dropbox"));
}

#[test]
fn connect_without_folder_is_cancelled() {
    let data = TempDir::new().unwrap();
    versesync(&data)
        .args(["connect", "local-folder"])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("cancelled"));
}

#[test]
fn status_as_json() {
    let data = TempDir::new().unwrap();
    let output = versesync(&data)
        .args(["status", "--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["status"]["state"], "unauthenticated");
    assert!(value["status"]["adapter"].is_null());
    assert_eq!(value["status"]["local"]["highlights"], 0);
}

#[test]
fn config_shows_resolved_values() {
    let data = TempDir::new().unwrap();
    versesync(&data)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[drive]"))
        .stdout(predicate::str::contains("timeout_secs = 30"));
}
