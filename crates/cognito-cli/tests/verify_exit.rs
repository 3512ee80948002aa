use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn config_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("auth.toml"), "client_id = \"abc\"\n").unwrap();
    fs::write(dir.path().join("keys.json"), "{}").unwrap();
    dir
}

fn cognito(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cognito"))
        .arg("--json")
        .arg("--config-dir")
        .arg(dir)
        .args(args)
        .env_remove("COGNITO_CLIENT_ID")
        .env_remove("COGNITO_COOKIE")
        .output()
        .unwrap()
}

#[test]
fn rejected_token_exits_with_failure() {
    let dir = config_dir();
    let out = cognito(dir.path(), &["verify", "--kind", "id", "--token", "not-a-token"]);

    assert_eq!(out.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["valid"], false);
    assert!(report["reason"].as_str().is_some_and(|r| !r.is_empty()));
}

#[test]
fn other_commands_exit_cleanly() {
    let dir = config_dir();
    let out = cognito(dir.path(), &["resolve", "--cookie", "theme=dark"]);

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "null");
}
