//! CLI integration tests.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

const PROGRAM: &str = "H1byJyMjQ3gUrtrrav5FV7yV3Jo6pT8YePtNkdGgoa1P";
const SOL_MINT: &str = "EtX1Uagb44Yp5p4hsqjwAwF3mKaQTMizCyvC1CsyHAQN";
const SOL_PRICE: &str = "J83w4HKfqxwcq3BEMMkPFSppX3gqekLyLJBexebFVkix";

fn liquidator() -> Command {
    cargo_bin_cmd!("perp-liquidator")
}

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

fn valid_config() -> String {
    format!(
        r#"
[network]
rpc_url = "https://api.devnet.solana.com"
program_id = "{PROGRAM}"

[oracle.price_accounts]
"{SOL_MINT}" = "{SOL_PRICE}"
"#
    )
}

#[test]
fn help_lists_commands() {
    liquidator()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn version() {
    liquidator()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("perp-liquidator"));
}

#[test]
fn check_config_accepts_valid_file() {
    let file = config_file(&valid_config());

    liquidator()
        .env_remove("LIQUIDATOR_KEYPAIR_PATH")
        .args(["check", "config", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file is valid"))
        .stdout(predicate::str::contains("wss://api.devnet.solana.com"));
}

#[test]
fn check_config_json_output() {
    let file = config_file(&valid_config());

    liquidator()
        .env_remove("LIQUIDATOR_KEYPAIR_PATH")
        .args(["--json", "check", "config", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""type":"success""#));
}

#[test]
fn check_config_rejects_bad_program_id() {
    let file = config_file(&valid_config().replace(PROGRAM, "not-a-pubkey"));

    liquidator()
        .args(["check", "config", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("program_id"));
}

#[test]
fn run_fails_fast_on_missing_config() {
    liquidator()
        .args(["run", "--config", "/nonexistent/perp-liquidator.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}
