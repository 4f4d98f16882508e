use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const TASKS: &str = "- name: Add user\n  user:\n    name: johnd\n    group: admin\n";

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn fqcn(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("fqcn");
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn convert_file_rewrites_and_backs_up() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.yml", TASKS);

    fqcn(&dir)
        .args(["convert", "main.yml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 change(s)"));

    let converted = fs::read_to_string(dir.path().join("main.yml")).unwrap();
    assert!(converted.contains("ansible.builtin.user:"));
    assert!(converted.contains("    group: admin"));
    assert_eq!(fs::read_to_string(dir.path().join("main.yml.fqcn.bak")).unwrap(), TASKS);
}

#[test]
fn dry_run_diff_leaves_file_alone() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.yml", TASKS);

    fqcn(&dir)
        .args(["convert", "main.yml", "--dry-run", "--diff"])
        .assert()
        .success()
        .stdout(predicate::str::contains("+  ansible.builtin.user:").and(predicate::str::contains("-  user:")));

    assert_eq!(fs::read_to_string(dir.path().join("main.yml")).unwrap(), TASKS);
    assert!(!dir.path().join("main.yml.fqcn.bak").exists());
}

#[test]
fn inline_map_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.yml", TASKS);

    fqcn(&dir)
        .args(["convert", "main.yml", "--no-backup", "--map", "user=ns.col.user"])
        .assert()
        .success();

    assert!(fs::read_to_string(dir.path().join("main.yml")).unwrap().contains("ns.col.user:"));
    assert!(!dir.path().join("main.yml.fqcn.bak").exists());
}

#[test]
fn validate_reports_short_names() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.yml", TASKS);

    fqcn(&dir)
        .args(["validate", "main.yml"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("INVALID").and(predicate::str::contains("ansible.builtin.user")));
}

#[test]
fn validate_json_output() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.yml", "- ansible.builtin.ping:\n");

    let output = fqcn(&dir)
        .args(["validate", "main.yml", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value[0]["kind"], "validation");
    assert_eq!(value[0]["valid"], true);
    assert_eq!(value[0]["score"], 1.0);
}

#[test]
fn batch_isolates_failures_when_tolerant() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "one/roles/a/tasks/main.yml", TASKS);
    write(dir.path(), "two/roles/a/tasks/main.yml", "- user: [unclosed\n");
    write(dir.path(), "three/site.yml", "- hosts: all\n  tasks:\n    - copy: {src: a, dest: b}\n");

    fqcn(&dir)
        .args(["batch", ".", "--continue-on-error", "-j", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("failed:        1").and(predicate::str::contains("changes:       2")));

    assert!(fs::read_to_string(dir.path().join("three/site.yml"))
        .unwrap()
        .contains("ansible.builtin.copy:"));
}

#[test]
fn batch_fails_without_tolerance() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "two/roles/a/tasks/main.yml", "- user: [unclosed\n");

    fqcn(&dir).args(["batch", ".", "--dry-run"]).assert().code(1);
}

#[test]
fn config_file_is_read() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.yml", TASKS);
    write(dir.path(), ".fqcn.yml", "mappings:\n  user: acme.people.user\nbackup: false\n");

    fqcn(&dir).args(["convert", "main.yml"]).assert().success();

    assert!(fs::read_to_string(dir.path().join("main.yml")).unwrap().contains("acme.people.user:"));
    assert!(!dir.path().join("main.yml.fqcn.bak").exists());
}

#[test]
fn fatal_configuration_exits_2() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.yml", TASKS);

    fqcn(&dir)
        .args(["convert", "main.yml", "--map", "nonsense"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid --map value"));

    fqcn(&dir)
        .args(["validate", "main.yml", "--config", "missing.yml"])
        .assert()
        .code(2);

    fqcn(&dir).args(["convert", "nowhere.yml"]).assert().code(2);
}
