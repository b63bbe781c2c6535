use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn inkpage_cmd() -> Command {
    Command::cargo_bin("inkpage").expect("binary exists")
}

fn write_config(temp: &TempDir) -> std::path::PathBuf {
    let path = temp.path().join("config.toml");
    let ink_dir = temp.path().join("ink");
    std::fs::write(
        &path,
        format!(
            "[session]\nstorage = \"custom\"\ncustom_directory = \"{}\"\nautosave_interval_ms = 0\n",
            ink_dir.display()
        ),
    )
    .unwrap();
    path
}

fn write_events(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("lecture-notes.json");
    let mut events = Vec::new();
    events.push(serde_json::json!({
        "pointer_id": 1, "action": "down", "x": 100.0, "y": 100.0,
        "pressure": 0.5, "touch_major": 4.0, "tool": "stylus", "time_ms": 1000
    }));
    for step in 1..=5 {
        events.push(serde_json::json!({
            "pointer_id": 1, "action": "move", "x": 100.0 + 20.0 * step as f64, "y": 110.0,
            "pressure": 0.6, "touch_major": 4.0, "tool": "stylus", "time_ms": 1000 + 8 * step
        }));
    }
    events.push(serde_json::json!({
        "pointer_id": 1, "action": "up", "x": 200.0, "y": 110.0,
        "pressure": 0.0, "touch_major": 4.0, "tool": "stylus", "time_ms": 1048
    }));
    let batches = serde_json::json!([{ "events": events }]);
    std::fs::write(&path, serde_json::to_vec(&batches).unwrap()).unwrap();
    path
}

#[test]
fn inkpage_help_prints_usage() {
    inkpage_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Stylus palm rejection and ink annotation engine",
        ));
}

#[test]
fn long_version_names_the_build() {
    inkpage_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stdout(predicate::str::contains("debug build").or(predicate::str::contains("release build")));
}

#[test]
fn no_subcommand_shows_help() {
    inkpage_cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("replay"));
}

#[test]
fn init_config_writes_example_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.toml");
    inkpage_cmd()
        .arg("--init-config")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote default configuration"));
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[classifier]"));
}

#[test]
fn replay_inspect_and_clear_round_trip() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);
    let events = write_events(temp.path());

    inkpage_cmd()
        .arg("--config")
        .arg(&config)
        .arg("replay")
        .arg(&events)
        .assert()
        .success()
        .stdout(predicate::str::contains("Strokes committed: 1"))
        .stdout(predicate::str::contains("Saved annotations to"));

    inkpage_cmd()
        .args(["--config"])
        .arg(&config)
        .args(["inspect", "--document", "lecture-notes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Strokes: 1"))
        .stdout(predicate::str::contains("page 0: 1 strokes"));

    // A second replay appends to the stored annotations.
    inkpage_cmd()
        .arg("--config")
        .arg(&config)
        .arg("replay")
        .arg(&events)
        .assert()
        .success()
        .stdout(predicate::str::contains("Document strokes:  2"));

    inkpage_cmd()
        .arg("--config")
        .arg(&config)
        .args(["clear", "--document", "lecture-notes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared annotations"));

    inkpage_cmd()
        .arg("--config")
        .arg(&config)
        .args(["inspect", "--document", "lecture-notes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no annotations stored"));
}

#[test]
fn replay_without_save_leaves_disk_untouched() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);
    let events = write_events(temp.path());

    inkpage_cmd()
        .arg("--config")
        .arg(&config)
        .args(["replay", "--no-save"])
        .arg(&events)
        .assert()
        .success()
        .stdout(predicate::str::contains("Strokes committed: 1"));
    assert!(!temp.path().join("ink").exists());
}

#[test]
fn replay_rejects_malformed_events_file() {
    let temp = TempDir::new().unwrap();
    let config = write_config(&temp);
    let events = temp.path().join("broken.json");
    std::fs::write(&events, "{ not json").unwrap();

    inkpage_cmd()
        .arg("--config")
        .arg(&config)
        .arg("replay")
        .arg(&events)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse events file"));
}
