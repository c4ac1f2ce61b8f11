//! Command line end-to-end tests

mod common;

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use common::*;
use hik_drill::Config;
use predicates::prelude::*;
use tempfile::tempdir;

fn hik_drill() -> Command {
    Command::new(env!("CARGO_BIN_EXE_hik-drill"))
}

#[test]
fn test_init_config_creates_missing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("new.toml");

    hik_drill()
        .arg("--config")
        .arg(&path)
        .arg("init-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    assert!(path.exists());
    assert!(Config::load_from(&path).is_ok());
}

#[test]
fn test_init_config_force_replaces_broken_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[general\nlog_level = ").unwrap();

    hik_drill()
        .arg("--config")
        .arg(&path)
        .arg("init-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    hik_drill()
        .arg("--config")
        .arg(&path)
        .args(["init-config", "--force"])
        .assert()
        .success();

    assert!(Config::load_from(&path).is_ok());
}

#[test]
fn test_info_json_is_clean_stdout() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("empty.toml");
    fs::write(&config, "").unwrap();
    let image = dir.path().join("dvr.dd");
    let pages = vec![
        vec![Slot::allocated(1, 1_648_609_200, 1_648_612_800, 0); 3],
        vec![Slot::allocated(2, 1_648_609_200, 1_648_612_800, 0)],
    ];
    fs::write(&image, build_image(4, &pages)).unwrap();

    let output = hik_drill()
        .arg("--config")
        .arg(&config)
        .arg("info")
        .arg(&image)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let layout: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(layout["hikbtree"]["copy"], "primary");
    assert_eq!(layout["pages"].as_array().map(Vec::len), Some(2));
    assert_eq!(layout["master"]["total_data_blocks"], 4);
}
