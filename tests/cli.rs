use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn write_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("gdp.json");
    fs::write(
        &path,
        r#"{
            "2000": {"DEU": 3, "FRA": 2, "ITA": 1},
            "2001": {"DEU": 4, "FRA": 5},
            "2002": {"DEU": 6, "FRA": 5, "ITA": 2}
        }"#,
    )
    .unwrap();
    path
}

#[test]
fn cli_shows_help() {
    let mut cmd = Command::cargo_bin("timeviz").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("timeviz"))
        .stdout(predicate::str::contains("simulate"));
}

#[test]
fn normalize_prints_the_canonical_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let mut cmd = Command::cargo_bin("timeviz").unwrap();
    cmd.args(["normalize", "--input"]).arg(&input);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"steps\""))
        .stdout(predicate::str::contains("\"DEU\""));
}

#[test]
fn normalize_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let out = dir.path().join("out.csv");
    let mut cmd = Command::cargo_bin("timeviz").unwrap();
    cmd.args(["normalize", "--input"])
        .arg(&input)
        .arg("--out")
        .arg(&out);
    cmd.assert().success();
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("step,entity,value,secondary,size"));
    // ITA is absent in 2001: 8 rows plus the header
    assert_eq!(text.lines().count(), 9);
}

#[test]
fn render_writes_an_svg() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let out = dir.path().join("race.svg");
    let mut cmd = Command::cargo_bin("timeviz").unwrap();
    cmd.args(["render", "--kind", "ranked-bars", "--metric", "gdp", "--key", "2001"])
        .arg("--input")
        .arg(&input)
        .arg("--out")
        .arg(&out);
    cmd.assert().success();
    let svg = fs::read_to_string(&out).unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.contains("2001"));
}

#[test]
fn frames_writes_one_file_per_step() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let out_dir = dir.path().join("frames");
    let mut cmd = Command::cargo_bin("timeviz").unwrap();
    cmd.args(["frames", "--kind", "category-bars", "--inbetween", "1"])
        .arg("--input")
        .arg(&input)
        .arg("--out-dir")
        .arg(&out_dir);
    cmd.assert().success();
    assert!(out_dir.join("step_0000.svg").exists());
    // step 0 has nothing to transition from
    assert!(!out_dir.join("step_0000_01.svg").exists());
    assert!(out_dir.join("step_0001_01.svg").exists());
    assert!(out_dir.join("step_0002.svg").exists());
}

#[test]
fn stats_reports_missing_steps() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path());
    let mut cmd = Command::cargo_bin("timeviz").unwrap();
    cmd.arg("stats").arg("--input").arg(&input);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ITA  count=2 missing=1"))
        .stdout(predicate::str::contains("median=5"));
}

#[test]
fn simulate_wraps_from_the_last_step() {
    let mut cmd = Command::cargo_bin("timeviz").unwrap();
    cmd.args(["simulate", "--steps", "5", "--start", "4", "--interval-ms", "100"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("0\t0\tplaying"))
        .stdout(predicate::str::contains("400\t4\tplaying"))
        .stdout(predicate::str::contains("500\t4\tstopped"));
}

#[test]
fn bad_payload_fails_with_a_shape_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.json");
    fs::write(&input, "true").unwrap();
    let mut cmd = Command::cargo_bin("timeviz").unwrap();
    cmd.arg("normalize").arg("--input").arg(&input);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("shape mismatch"));
}
