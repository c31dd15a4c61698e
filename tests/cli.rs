use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("yt-optimize").expect("binary built");
    cmd.arg("--store")
        .arg(dir.path().join("prefs.db"))
        .arg("--config")
        .arg(dir.path().join("config.yaml"))
        .env_remove("YT_OPTIMIZE_LOG");
    cmd
}

#[test]
fn prints_version() {
    Command::cargo_bin("yt-optimize")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    Command::cargo_bin("yt-optimize")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--set KEY=VALUE").and(predicate::str::contains("--version")));
}

#[test]
fn show_lists_defaults() {
    let dir = tempdir().unwrap();
    cli(&dir)
        .arg("--show")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("yt-default-quality=hd1080")
                .and(predicate::str::contains("yt-default-speed=2"))
                .and(predicate::str::contains("yt_home_columns=5"))
                .and(predicate::str::contains("yt-hotkey-key-webfullscreen=w"))
                .and(predicate::str::contains("# quality policy: none")),
        );
}

#[test]
fn show_reports_resolved_quality_policy() {
    let dir = tempdir().unwrap();
    cli(&dir)
        .args(["--set", "yt-fullscreen-max-quality=true", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# quality policy: screen-fit-on-fullscreen"));
}

#[test]
fn set_persists_across_runs() {
    let dir = tempdir().unwrap();
    cli(&dir)
        .args(["--set", "yt-default-quality=hd720", "--set", "yt_home_columns=12"])
        .assert()
        .success();
    cli(&dir)
        .arg("--show")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("yt-default-quality=hd720")
                .and(predicate::str::contains("yt_home_columns=8")),
        );
}

#[test]
fn reset_restores_default() {
    let dir = tempdir().unwrap();
    cli(&dir)
        .args(["--set", "yt-filter-progress-threshold=40"])
        .assert()
        .success();
    cli(&dir)
        .args(["--reset", "yt-filter-progress-threshold", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("yt-filter-progress-threshold=90"));
}

#[test]
fn rejects_unknown_key_and_bad_value() {
    let dir = tempdir().unwrap();
    cli(&dir)
        .args(["--set", "yt-made-up=1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown preference key"));
    cli(&dir)
        .args(["--set", "yt-default-quality=ultra"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a known quality level"));
    cli(&dir)
        .args(["--set", "missing-equals"])
        .assert()
        .failure();
}

#[test]
fn config_file_changes_defaults() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.yaml"),
        "layout:\n  default_columns: 6\nfilter:\n  default_progress_threshold: 75\n",
    )
    .unwrap();
    cli(&dir)
        .arg("--show")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("yt_home_columns=6")
                .and(predicate::str::contains("yt-filter-progress-threshold=75")),
        );
}
