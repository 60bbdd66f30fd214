use std::{fs, io::Write, time::Duration};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn smtcheck() -> Command {
    Command::cargo_bin("smtcheck").expect("binary is built")
}

fn script(source: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".smt2")
        .tempfile()
        .expect("temporary file");
    file.write_all(source.as_bytes()).expect("writable file");
    file
}

#[test]
fn satisfiable_file_prints_sat() {
    let file = script("(declare-const x Int) (assert (> x 0)) (check-sat)");

    smtcheck()
        .arg(file.path())
        .assert()
        .success()
        .stdout("sat\n");
}

#[test]
fn unsatisfiable_file_prints_unsat() {
    let file = script("(declare-const x Int) (assert (> x 0)) (assert (< x 0)) (check-sat)");

    smtcheck()
        .arg(file.path())
        .assert()
        .success()
        .stdout("unsat\n");
}

#[test]
fn undecided_file_prints_unknown_and_succeeds() {
    let file = script("(declare-const x Int) (assert (> (* x x) 2)) (check-sat)");

    smtcheck()
        .arg(file.path())
        .assert()
        .success()
        .stdout("unknown\n");
}

#[test]
fn missing_argument_fails_without_verdict() {
    smtcheck()
        .assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("Error: missing argument"));
}

#[test]
fn missing_file_fails_without_verdict() {
    let dir = tempfile::tempdir().expect("temporary directory");
    let path = dir.path().join("absent.smt2");

    smtcheck()
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn directory_is_not_a_readable_file() {
    let dir = tempfile::tempdir().expect("temporary directory");

    smtcheck()
        .arg(dir.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn invalid_syntax_fails_with_parse_error() {
    let file = script("(assert (> x 0)");

    smtcheck()
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(
            predicate::str::contains("Error: failed to parse")
                .and(predicate::str::contains("caused by: syntax error")),
        );
}

#[test]
fn undeclared_symbols_are_parse_errors() {
    let file = script("(assert (> x 0))");

    smtcheck()
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("caused by: unknown symbol 'x'"));
}

#[test]
fn unknown_sorts_are_parse_errors() {
    let file = script("(declare-const x Innt) (assert (> x 0))");

    smtcheck()
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("caused by: unknown symbol 'Innt'"));
}

#[test]
fn deeply_nested_input_is_a_parse_error() {
    let depth = 20_000;
    let file = script(&format!(
        "(declare-const p Bool) (assert {}p{})",
        "(not ".repeat(depth),
        ")".repeat(depth)
    ));

    smtcheck()
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(
            predicate::str::contains("Error: failed to parse")
                .and(predicate::str::contains("nested deeper than 2000 levels")),
        );
}

#[test]
fn nesting_below_the_limit_is_checked() {
    let depth = 1_500;
    let file = script(&format!(
        "(declare-const p Bool) (assert {}p{})",
        "(not ".repeat(depth),
        ")".repeat(depth)
    ));

    smtcheck()
        .arg(file.path())
        .assert()
        .success()
        .stdout("sat\n");
}

#[test]
fn shared_let_chains_are_checked_within_the_timeout() {
    let depth = 24;
    let mut body = format!("(> a{depth} 0)");
    for i in (1..=depth).rev() {
        body = format!("(let ((a{i} (+ a{j} a{j}))) {body})", j = i - 1);
    }
    let file = script(&format!(
        "(declare-const x Int) (assert (let ((a0 (+ x 1))) {body})) (check-sat)"
    ));

    smtcheck()
        .args(["--timeout", "1"])
        .arg(file.path())
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stdout("sat\n");
}

#[test]
fn expired_timeout_gives_unknown() {
    let file = script("(declare-const p Bool) (declare-const q Bool) (assert (or p q))");

    smtcheck()
        .args(["--timeout", "0"])
        .arg(file.path())
        .assert()
        .success()
        .stdout("unknown\n");
}

#[test]
fn malformed_timeout_is_a_usage_error() {
    let file = script("(assert true)");

    smtcheck()
        .args(["--timeout", "soon"])
        .arg(file.path())
        .assert()
        .code(2)
        .stdout("");
}

#[test]
fn file_flag_is_not_accepted() {
    let file = script("(assert true)");

    smtcheck()
        .arg("-f")
        .arg(file.path())
        .assert()
        .code(2);
}

#[test]
fn logs_go_to_stderr_as_comments() {
    let file = script("(assert true)");

    let output = smtcheck()
        .env("RUST_LOG", "info")
        .arg(file.path())
        .output()
        .expect("process runs");

    assert_eq!("sat\n", String::from_utf8_lossy(&output.stdout));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.lines().all(|line| line.starts_with("; [")));
    assert!(stderr.contains("; [INFO] checking 1 assertions"));
}

#[test]
fn instance_files_are_checked_in_place() {
    let instance = concat!(env!("CARGO_MANIFEST_DIR"), "/instances/smt2/lia_branch_unsat.smt2");
    assert!(fs::metadata(instance).is_ok());

    smtcheck().arg(instance).assert().success().stdout("unsat\n");
}
