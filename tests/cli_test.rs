use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ACCOUNT: &str = "0x00000000000000000000000000000000000000a1";

/// Command with config isolated under a fresh home directory
fn dao_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("charity-dao-cli").unwrap();
    cmd.env("HOME", home.path());
    cmd.env("USERPROFILE", home.path());
    cmd.env_remove("XDG_CONFIG_HOME");
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_runs() {
    let home = TempDir::new().unwrap();
    dao_cmd(&home).arg("--version").assert().success();
}

#[test]
fn test_cli_shows_help() {
    let home = TempDir::new().unwrap();
    dao_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Charity DAO"))
        .stdout(predicate::str::contains("vote"))
        .stdout(predicate::str::contains("donate"));
}

#[test]
fn test_config_show_defaults() {
    let home = TempDir::new().unwrap();
    dao_cmd(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration"))
        .stdout(predicate::str::contains("http://localhost:8080/serveEvents"))
        .stdout(predicate::str::contains("Not set"));
}

#[test]
fn test_config_set_account_persists() {
    let home = TempDir::new().unwrap();
    dao_cmd(&home)
        .args(["config", "set-account", "0x00000000000000000000000000000000000000A1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(ACCOUNT));

    dao_cmd(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(ACCOUNT));
}

#[test]
fn test_config_set_account_invalid() {
    let home = TempDir::new().unwrap();
    dao_cmd(&home)
        .args(["config", "set-account", "not-an-address"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid address"));
}

#[test]
fn test_config_set_rpc_rejects_non_http() {
    let home = TempDir::new().unwrap();
    dao_cmd(&home)
        .args(["config", "set-rpc", "ftp://example.org"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("http://"));
}

#[test]
fn test_vote_zero_amount_rejected_before_network() {
    let home = TempDir::new().unwrap();
    dao_cmd(&home)
        .args(["vote", "1", "--amount", "0", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 1"));
}

#[test]
fn test_vote_requires_side() {
    let home = TempDir::new().unwrap();
    dao_cmd(&home).args(["vote", "1", "--amount", "2"]).assert().failure();
}

#[test]
fn test_status_without_account() {
    let home = TempDir::new().unwrap();
    dao_cmd(&home)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No account configured"));
}

#[test]
fn test_execute_without_contracts() {
    let home = TempDir::new().unwrap();
    dao_cmd(&home)
        .args(["config", "set-account", ACCOUNT])
        .assert()
        .success();

    dao_cmd(&home)
        .args(["execute", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Contract addresses not configured"));
}

#[test]
fn test_approve_rejects_unknown_target() {
    let home = TempDir::new().unwrap();
    dao_cmd(&home).args(["approve", "everything"]).assert().failure();
}
