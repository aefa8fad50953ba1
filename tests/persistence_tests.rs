#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::{NamedTempFile, tempdir};

mod common;

#[test]
fn test_state_survives_restart() {
    let db = tempdir().unwrap();

    let first = NamedTempFile::new().unwrap();
    common::write_script(
        first.path(),
        &[
            ["buy", "u1", "", "10000", ""],
            ["prepare", "u1", "Coffee Shop", "2000", "o1"],
            ["confirm", "", "", "", "o1"],
        ],
    )
    .unwrap();

    let mut cmd = Command::new(cargo_bin!("walletpay"));
    cmd.arg(first.path()).arg("--db-path").arg(db.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("u1,8000,0,8000"));

    // A second run against the same database picks up where the first left
    // off; the audit replays the combined ledger.
    let second = NamedTempFile::new().unwrap();
    common::write_script(second.path(), &[["buy", "u1", "", "1000", ""]]).unwrap();

    let mut cmd = Command::new(cargo_bin!("walletpay"));
    cmd.arg(second.path())
        .arg("--db-path")
        .arg(db.path())
        .arg("--audit")
        .arg("--ledger");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("u1,9000,0,9000"))
        .stdout(predicate::str::is_match(r"(?s)BUY,10000.*FREEZE,2000.*SETTLE,2000.*BUY,1000").unwrap());
}
