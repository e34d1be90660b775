//! End-to-end tests of the `postfix-forward` binary against a SQLite backend.

use assert_cmd::cargo::CommandCargoExt;
use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn write_config(dir: &Path, postconf: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    let content = format!(
        "[database]\nbackend = \"sqlite\"\n\n[postfix]\nconf_dir = '{}'\npostconf = \"{}\"\n\n[sqlite]\npath = '{}'\n",
        dir.join("vhost").display(),
        postconf,
        dir.join("forwards.db").display()
    );
    fs::write(&path, content).unwrap();
    path
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::cargo_bin("postfix-forward")
        .unwrap()
        .arg("--config")
        .arg(config)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_setup_add_list_remove() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");

    let output = run(
        &config,
        &["--password", "adminpw", "setup", "--viewer-password", "vp", "--editor-password", "ep"],
    );
    assert!(output.status.success(), "setup failed: {:?}", output);
    assert!(dir.path().join("vhost").join("aliases.cf").exists());
    assert!(dir.path().join("vhost").join("edit_credentials.cf").exists());

    let output = run(&config, &["add", "a@example.com", "b@example.org"]);
    assert!(output.status.success(), "add failed: {:?}", output);
    let output = run(&config, &["add", "a@example.com", "c@example.org"]);
    assert!(output.status.success(), "re-add failed: {:?}", output);

    let output = run(&config, &["list"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "a@example.com -> c@example.org\n");

    let output = run(&config, &["list", "--json"]);
    let forwards: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        forwards,
        serde_json::json!([{"source": "a@example.com", "destination": "c@example.org"}])
    );

    let output = run(&config, &["remove", "a@example.com"]);
    assert!(output.status.success());
    let output = run(&config, &["list"]);
    assert_eq!(stdout(&output), "");
}

#[test]
fn test_lookup_config_uses_viewer_credentials() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");
    let vhost = dir.path().join("vhost");
    fs::create_dir_all(&vhost).unwrap();
    fs::write(vhost.join("aliases.cf"), "user = lookup\npassword = vp\ndbname = mail\n").unwrap();

    let output = run(
        &config,
        &[
            "lookup-config",
            "--table",
            "forwards",
            "--result-column",
            "destination",
            "--match-column",
            "source",
        ],
    );
    assert!(output.status.success(), "lookup-config failed: {:?}", output);
    assert_eq!(
        stdout(&output),
        "hosts = 127.0.0.1\nuser = lookup\npassword = vp\ndbname = mail\nquery = SELECT destination FROM forwards WHERE source='%s'\n"
    );
}

#[test]
fn test_postconf_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "false");
    let output = run(&config, &["postconf", "virtual_alias_maps", "mysql:/etc/postfix/vhost/aliases.cf"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Command error"));
}

#[test]
fn test_unknown_backend_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");
    let output = run(&config, &["--backend", "oracle", "--password", "pw", "list"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown backend: oracle"));
}

#[test]
fn test_missing_password_without_terminal_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");
    let output = run(&config, &["list"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Prompt error"));
}

#[test]
fn test_password_read_from_piped_stdin() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "true");
    let output = assert_cmd::Command::cargo_bin("postfix-forward")
        .unwrap()
        .arg("--config")
        .arg(&config)
        .args([
            "lookup-config",
            "--table",
            "forwards",
            "--result-column",
            "destination",
            "--match-column",
            "source",
        ])
        .write_stdin("piped-pw\n")
        .output()
        .unwrap();
    assert!(output.status.success(), "lookup-config failed: {:?}", output);
    assert!(stdout(&output).contains("\npassword = piped-pw\n"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Enter mysql password for postfix:"));
}
