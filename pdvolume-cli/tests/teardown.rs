use predicates::prelude::*;

mod common;

#[test]
fn test_teardown_removes_stale_dir() {
    let mut ctx = common::pdvolume();
    let dir = ctx.volume_dir("pod-1", "data");
    std::fs::create_dir_all(&dir).unwrap();

    ctx.cmd
        .args(["teardown", "--volume", "data", "--pod", "pod-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pdvolume.io~aws-pd/data"));

    assert!(!dir.exists());
}

#[test]
fn test_teardown_missing_dir_succeeds() {
    let mut ctx = common::pdvolume();

    ctx.cmd
        .args(["teardown", "--volume", "data", "--pod", "pod-1"])
        .assert()
        .success();

    // Repeating it is still fine.
    ctx.new_cmd()
        .args(["teardown", "--volume", "data", "--pod", "pod-1"])
        .assert()
        .success();
}

#[test]
fn test_teardown_explicit_dir_json() {
    let mut ctx = common::pdvolume();
    let dir = ctx.path().join("custom");
    std::fs::create_dir_all(&dir).unwrap();

    ctx.cmd
        .args(["--json", "teardown", "--volume", "data", "--pod", "pod-1", "--dir"])
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""podUid":"pod-1""#))
        .stdout(predicate::str::contains(r#""volume":"data""#))
        .stdout(predicate::str::contains("pdName").not());

    assert!(!dir.exists());
}

#[test]
fn test_teardown_non_empty_dir_fails() {
    let mut ctx = common::pdvolume();
    let dir = ctx.volume_dir("pod-1", "data");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("leftover"), b"x").unwrap();

    ctx.cmd
        .args(["teardown", "--volume", "data", "--pod", "pod-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to tear down volume 'data'"));

    assert!(dir.exists());
}

#[test]
fn test_teardown_requires_volume_and_pod() {
    let mut ctx = common::pdvolume();

    ctx.cmd.args(["teardown", "--pod", "pod-1"]).assert().failure();
}
