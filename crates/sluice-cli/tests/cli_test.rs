use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use rstest::rstest;

const PROJECT: &str = r#"
log:
  level: warn
pipelines:
  - name: hello
    inlets:
      - plugin: static
        name: seed
        records: [{a: 1}, {a: 2}]
    flows:
      - plugin: filter
        when: { field: a, op: gt, value: 1 }
    outlets:
      - plugin: stdout
  - name: ticks
    inlets:
      - plugin: counter
        interval: 1s
        limit: 1
    outlets:
      - plugin: log
"#;

fn project(yaml: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sluice.yaml"), yaml).unwrap();
    dir
}

#[test]
fn test_validate() {
    let dir = project(PROJECT);

    cargo_bin_cmd!("sluice")
        .args(["--config", dir.path().to_str().unwrap(), "validate"])
        .assert()
        .success();
}

#[test]
fn test_validate_rejects_unknown_plugin() {
    let dir = project(
        "pipelines:\n  - name: bad\n    inlets: [{plugin: static}]\n    outlets: [{plugin: kafka}]\n",
    );

    cargo_bin_cmd!("sluice")
        .args(["--config", dir.path().to_str().unwrap(), "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown outlet plugin 'kafka'"));
}

#[test]
fn test_missing_config() {
    let dir = tempfile::tempdir().unwrap();

    cargo_bin_cmd!("sluice")
        .args(["--config", dir.path().to_str().unwrap(), "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_plugins_lists_builtins() {
    cargo_bin_cmd!("sluice")
        .arg("plugins")
        .assert()
        .success()
        .stdout(predicate::str::contains("  static"))
        .stdout(predicate::str::contains("  merge"))
        .stdout(predicate::str::contains("  stdout"));
}

#[rstest]
#[case::text("text")]
#[case::json("json")]
fn test_run_single_pipeline(#[case] log_format: &str) {
    let dir = project(PROJECT);

    cargo_bin_cmd!("sluice")
        .args([
            "--config",
            dir.path().to_str().unwrap(),
            "--log-format",
            log_format,
            "run",
            "--pipeline",
            "hello",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("a=2 _in=\"seed\""))
        .stdout(predicate::str::contains("a=1").not());
}

#[test]
fn test_run_all_pipelines() {
    let dir = project(PROJECT);

    cargo_bin_cmd!("sluice")
        .args(["--config", dir.path().to_str().unwrap(), "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a=2"));
}

#[test]
fn test_run_unknown_pipeline() {
    let dir = project(PROJECT);

    cargo_bin_cmd!("sluice")
        .args(["--config", dir.path().to_str().unwrap(), "run", "-p", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No pipeline named 'nope'"));
}
