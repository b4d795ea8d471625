use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

fn tabseal(session: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tabseal").expect("binary should be built");
    cmd.arg("--session-dir").arg(session).env_remove("RUST_LOG");
    cmd
}

fn seal(session: &Path, json: &str) -> String {
    let output = tabseal(session).args(["seal", json]).assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("envelope should be UTF-8").trim().to_owned()
}

#[test]
fn seal_then_open_roundtrip() {
    let dir = tempdir().unwrap();
    let envelope = seal(dir.path(), r#"{"a":1,"b":"x"}"#);

    tabseal(dir.path())
        .args(["open", &envelope, "--compact"])
        .assert()
        .success()
        .stdout(predicate::str::diff("{\"a\":1,\"b\":\"x\"}\n"));
}

#[test]
fn seal_reads_stdin() {
    let dir = tempdir().unwrap();
    let output = tabseal(dir.path())
        .arg("seal")
        .write_stdin("[1, 2, 3]")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let envelope = String::from_utf8(output).unwrap().trim().to_owned();

    tabseal(dir.path())
        .args(["open", &envelope, "--compact"])
        .assert()
        .success()
        .stdout("[1,2,3]\n");
}

#[test]
fn tampered_envelope_fails_with_single_line_error() {
    let dir = tempdir().unwrap();
    let envelope = seal(dir.path(), r#""secret""#);
    let tampered: String = envelope
        .chars()
        .enumerate()
        .map(|(i, c)| if i == 20 { if c == 'A' { 'B' } else { 'A' } } else { c })
        .collect();

    tabseal(dir.path())
        .args(["open", &tampered])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("decryption failed"))
        .stderr(predicate::str::starts_with("tabseal: "));
}

#[test]
fn ended_session_cannot_open_old_envelopes() {
    let dir = tempdir().unwrap();
    let envelope = seal(dir.path(), "42");

    tabseal(dir.path()).arg("end").assert().success().stdout("session ended\n");

    tabseal(dir.path())
        .args(["open", &envelope])
        .assert()
        .failure()
        .stderr(predicate::str::contains("decryption failed"));
}

#[test]
fn status_reports_slots() {
    let dir = tempdir().unwrap();

    tabseal(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("seed: absent"));

    seal(dir.path(), "null");

    tabseal(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("seed: present").and(predicate::str::contains("salt: present")));
}

#[test]
fn weak_iterations_from_environment_are_rejected() {
    let dir = tempdir().unwrap();

    tabseal(dir.path())
        .env("TABSEAL__VAULT__ITERATIONS", "1000")
        .args(["seal", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("iterations must be at least 100000"));
}

#[test]
fn config_file_sets_slots() {
    let dir = tempdir().unwrap();
    let session = dir.path().join("session");
    let config = dir.path().join("tabseal.toml");
    std::fs::write(&config, "[vault]\nseed_slot = \"custom.sid\"\nsalt_slot = \"custom.salt\"\n")
        .unwrap();

    tabseal(&session).arg("--config").arg(&config).args(["seal", "true"]).assert().success();

    assert!(session.join("custom.sid").exists());
    assert!(session.join("custom.salt").exists());
}

#[test]
fn log_dir_from_environment_writes_log_file() {
    let dir = tempdir().unwrap();
    let logs = dir.path().join("logs");

    tabseal(&dir.path().join("session"))
        .env("TABSEAL__LOG_DIR", &logs)
        .args(["-vvv", "seal", "{}"])
        .assert()
        .success();

    let written = std::fs::read_dir(&logs)
        .expect("log directory should be created")
        .flatten()
        .any(|entry| entry.path().extension().is_some_and(|ext| ext == "log"));
    assert!(written, "expected a rolling log file in {}", logs.display());
}

#[test]
fn invalid_json_input_fails() {
    let dir = tempdir().unwrap();

    tabseal(dir.path())
        .args(["seal", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input is not valid JSON"));
}
