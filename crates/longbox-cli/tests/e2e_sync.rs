//! E2E tests for `lbx sync` and `lbx verify`.
//!
//! Each test runs the binary as a subprocess in an isolated temp directory.
//! Sync runs that reach the network talk to a canned HTTP feed on localhost.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the lbx binary, rooted in `dir`.
fn lbx_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("lbx"));
    cmd.current_dir(dir);
    // Keep the user's own config and key out of the run.
    cmd.env("XDG_CONFIG_HOME", dir.join(".config"));
    cmd.env("HOME", dir);
    cmd.env_remove("COMICVINE_API_KEY");
    cmd.env("LONGBOX_LOG", "error");
    cmd
}

fn seed_snapshot(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).expect("seed snapshot");
}

/// Serve `body` for every request; returns the endpoint base URL.
fn serve_feed(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut line = String::new();
            while reader.read_line(&mut line).is_ok_and(|n| n > 0) {
                if line == "\r\n" {
                    break;
                }
                line.clear();
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    format!("http://{addr}/api")
}

fn write_config(dir: &Path, endpoint: &str) {
    fs::write(
        dir.join("longbox.toml"),
        format!("[remote]\nendpoint = \"{endpoint}\"\napi_key = \"test-key\"\n\n[sync]\nretry_delay_ms = 0\n"),
    )
    .expect("write config");
}

const WEEKLY_FEED: &str = r#"{"status_code":1,"error":"OK","number_of_total_results":2,"results":[{"id":1,"issue_number":"1","volume":{"id":100}},{"id":3,"issue_number":"3","volume":{"id":100}}]}"#;

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

#[test]
fn verify_reports_counts_as_json() {
    let dir = TempDir::new().expect("tempdir");
    seed_snapshot(
        dir.path(),
        "2017-09-17_latest.mcl",
        "Missing;2017-09-17\n100;1,3;1,3\n77901;500;1.&@15\n",
    );

    let output = lbx_cmd(dir.path())
        .args(["verify", "2017-09-17_latest.mcl", "--json"])
        .output()
        .expect("verify should not crash");
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["issues"], 3);
    assert_eq!(json["volumes"], 2);
    assert_eq!(json["canonical"], true);
    assert_eq!(json["synced_through"], "2017-09-17");
}

#[test]
fn verify_human_output() {
    let dir = TempDir::new().expect("tempdir");
    seed_snapshot(dir.path(), "a.mcl", "Missing;2017-09-17\n100;1;1\n100;1;1\n");

    lbx_cmd(dir.path())
        .args(["verify", "a.mcl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("duplicates:"))
        .stdout(predicate::str::contains("canonical:").and(predicate::str::contains("no")));
}

#[test]
fn verify_missing_file_fails_with_code() {
    let dir = TempDir::new().expect("tempdir");
    lbx_cmd(dir.path())
        .args(["verify", "nope.mcl"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn verify_malformed_file_fails_as_json() {
    let dir = TempDir::new().expect("tempdir");
    seed_snapshot(dir.path(), "bad.mcl", "Missing;2017-09-17\n100;1,2;1\n");

    let output = lbx_cmd(dir.path())
        .args(["--json", "verify", "bad.mcl"])
        .output()
        .expect("verify should not crash");
    assert_eq!(output.status.code(), Some(1));

    let json: Value = serde_json::from_slice(&output.stderr).expect("error JSON");
    assert_eq!(json["error"]["error_code"], "E2001");
    assert!(
        json["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("line 2"))
    );
}

// ---------------------------------------------------------------------------
// sync: failures before any network access
// ---------------------------------------------------------------------------

#[test]
fn sync_rejects_reversed_dates() {
    let dir = TempDir::new().expect("tempdir");
    lbx_cmd(dir.path())
        .args(["sync", "2017-09-17", "2017-09-11", "--api-key", "k"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1004"));
}

#[test]
fn sync_missing_input_fails() {
    let dir = TempDir::new().expect("tempdir");
    lbx_cmd(dir.path())
        .args(["sync", "2017-09-11", "2017-09-17", "--api-key", "k"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"))
        .stderr(predicate::str::contains("2017-09-11_latest.mcl"));
}

#[test]
fn sync_malformed_input_writes_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let input = "Missing;2017-09-11\n100;1,2,3;1,2\n";
    seed_snapshot(dir.path(), "2017-09-11_latest.mcl", input);

    lbx_cmd(dir.path())
        .args(["sync", "2017-09-11", "2017-09-17", "--api-key", "k"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2001"));

    assert_eq!(
        fs::read_to_string(dir.path().join("2017-09-11_latest.mcl")).expect("input kept"),
        input
    );
    assert!(!dir.path().join("2017-09-17_latest.mcl").exists());
    assert!(!dir.path().join("2017-09-17_deleted.txt").exists());
    assert!(!dir.path().join("2017-09-11_missing.mcl").exists());
}

#[test]
fn sync_without_api_key_fails() {
    let dir = TempDir::new().expect("tempdir");
    seed_snapshot(dir.path(), "2017-09-11_latest.mcl", "Missing;2017-09-11\n100;1;1\n");

    lbx_cmd(dir.path())
        .args(["sync", "2017-09-11", "2017-09-17"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1003"));
    assert!(dir.path().join("2017-09-11_latest.mcl").exists());
}

#[test]
fn sync_with_broken_config_fails() {
    let dir = TempDir::new().expect("tempdir");
    seed_snapshot(dir.path(), "2017-09-11_latest.mcl", "Missing;2017-09-11\n100;1;1\n");
    fs::write(dir.path().join("longbox.toml"), "[sync\npage_size = 1\n").expect("config");

    lbx_cmd(dir.path())
        .args(["sync", "2017-09-11", "2017-09-17", "--api-key", "k"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1002"));
}

// ---------------------------------------------------------------------------
// sync: against a local feed
// ---------------------------------------------------------------------------

#[test]
fn weekly_sync_writes_outputs_and_retires_input() {
    let dir = TempDir::new().expect("tempdir");
    seed_snapshot(dir.path(), "2017-09-11_latest.mcl", "Missing;2017-09-11\n100;1,2;1,2\n");
    write_config(dir.path(), &serve_feed(WEEKLY_FEED));

    let output = lbx_cmd(dir.path())
        .args(["sync", "2017-09-11", "2017-09-17", "--json"])
        .output()
        .expect("sync should not crash");
    assert!(
        output.status.success(),
        "sync failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: Value = serde_json::from_slice(&output.stdout).expect("summary JSON");
    assert_eq!(json["added"], 1);
    assert_eq!(json["unchanged"], 1);
    assert_eq!(json["not_reconfirmed"], 1);
    assert_eq!(json["api_requests"], 1);

    assert_eq!(
        fs::read_to_string(dir.path().join("2017-09-17_latest.mcl")).expect("snapshot"),
        "Missing;2017-09-17\n100;1,2,3;1,2,3\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("2017-09-17_deleted.txt")).expect("deletions"),
        "2\n"
    );
    assert!(!dir.path().join("2017-09-11_latest.mcl").exists());
    assert!(dir.path().join("2017-09-11_missing.mcl").exists());
}

#[test]
fn pruned_sync_drops_unconfirmed_issue() {
    let dir = TempDir::new().expect("tempdir");
    seed_snapshot(dir.path(), "2017-09-11_latest.mcl", "Missing;2017-09-11\n100;1,2;1,2\n");
    write_config(dir.path(), &serve_feed(WEEKLY_FEED));

    lbx_cmd(dir.path())
        .args(["sync", "2017-09-11", "2017-09-17", "--prune"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lbx sync 2017-09-11 2017-09-17"));

    assert_eq!(
        fs::read_to_string(dir.path().join("2017-09-17_latest.mcl")).expect("snapshot"),
        "Missing;2017-09-17\n100;1,3;1,3\n"
    );
}

#[test]
fn invalid_api_key_stops_before_writing() {
    let dir = TempDir::new().expect("tempdir");
    let input = "Missing;2017-09-11\n100;1;1\n";
    seed_snapshot(dir.path(), "2017-09-11_latest.mcl", input);
    write_config(
        dir.path(),
        &serve_feed(r#"{"status_code":100,"error":"Invalid API Key","results":[]}"#),
    );

    let output = lbx_cmd(dir.path())
        .args(["sync", "2017-09-11", "2017-09-17", "--page-size", "2", "--json"])
        .output()
        .expect("sync should not crash");
    assert_eq!(output.status.code(), Some(1));

    let json: Value = serde_json::from_slice(&output.stderr).expect("error JSON");
    assert_eq!(json["error"]["error_code"], "E3002");
    assert!(
        json["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("Invalid API Key"))
    );

    // The window can be re-run as is once the key is fixed.
    assert_eq!(
        fs::read_to_string(dir.path().join("2017-09-11_latest.mcl")).expect("input kept"),
        input
    );
    assert!(!dir.path().join("2017-09-17_latest.mcl").exists());
    assert!(!dir.path().join("2017-09-17_deleted.txt").exists());
    assert!(!dir.path().join("2017-09-11_missing.mcl").exists());
}
