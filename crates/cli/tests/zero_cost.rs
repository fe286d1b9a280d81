use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const SEPARATOR: &str =
    "================================================================================";

fn section(path: &str, body: &str) -> String {
    format!("{SEPARATOR}\nFILE: ./{path}\n{SEPARATOR}\n{body}\n\n")
}

fn setup_snapshot() -> (TempDir, PathBuf) {
    let temp = tempdir().unwrap();
    let mut text = String::from("Codebase snapshot\n");
    text.push_str(&section(
        "src/a.ts",
        "import { b } from './b';\nexport function a() {\n  return b();\n}",
    ));
    text.push_str(&section(
        "src/b.ts",
        "import { a } from './a';\nexport function b() {\n  return 1;\n}",
    ));
    text.push_str(&section("src/c.ts", "import { b } from './b';\nexport class C {}"));
    let path = temp.path().join("snapshot.txt");
    fs::write(&path, text).unwrap();
    (temp, path)
}

#[allow(deprecated)]
fn nucleus(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("nucleus").expect("binary");
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("NUCLEUS_MAX_GREP_MATCHES")
        .env_remove("NUCLEUS_CACHE_CAPACITY");
    cmd
}

fn run_json(config_home: &Path, args: &[&str]) -> Value {
    let output = nucleus(config_home).args(args).output().expect("command run");
    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert!(output.status.success(), "stdout: {body}");
    body
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn stats_lists_file_ranges() {
    let (temp, snapshot) = setup_snapshot();
    let body = run_json(temp.path(), &["stats", arg(&snapshot)]);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data"]["files"], 3);
    assert_eq!(body["data"]["file_ranges"][0]["path"], "src/a.ts");
    assert_eq!(body["data"]["file_ranges"][0]["start"], 5);
}

#[test]
fn search_pages_through_matches() {
    let (temp, snapshot) = setup_snapshot();
    let body = run_json(
        temp.path(),
        &["search", arg(&snapshot), "export", "--max-results", "2"],
    );
    assert_eq!(body["data"]["count"], 3);
    assert_eq!(body["data"]["matches"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["data"]["hasMore"], true);
    assert_eq!(body["truncation"][0], "max_matches");
}

#[test]
fn context_marks_the_target_line() {
    let (temp, snapshot) = setup_snapshot();
    let body = run_json(
        temp.path(),
        &["context", arg(&snapshot), "src/a.ts", "3", "--before", "1", "--after", "1"],
    );
    let text = body["data"]["text"].as_str().unwrap();
    assert!(text.contains(">"));
    assert!(text.lines().nth(1).unwrap().starts_with("> 3 |"));
}

#[test]
fn context_for_unknown_file_is_not_found() {
    let (temp, snapshot) = setup_snapshot();
    nucleus(temp.path())
        .args(["context", arg(&snapshot), "src/zzz.ts", "1"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"not_found\""));
}

#[test]
fn graph_commands() {
    let (temp, snapshot) = setup_snapshot();
    let imports = run_json(temp.path(), &["imports", arg(&snapshot), "src/a.ts"]);
    assert_eq!(imports["data"]["files"], serde_json::json!(["src/b.ts"]));

    let importers = run_json(temp.path(), &["importers", arg(&snapshot), "src/b.ts"]);
    assert_eq!(importers["data"]["files"], serde_json::json!(["src/a.ts", "src/c.ts"]));

    let exporters = run_json(temp.path(), &["exporters", arg(&snapshot), "C"]);
    assert_eq!(exporters["data"]["files"], serde_json::json!(["src/c.ts"]));

    let cycles = run_json(temp.path(), &["cycles", arg(&snapshot)]);
    assert_eq!(cycles["data"]["cycles"], serde_json::json!([["src/a.ts", "src/b.ts"]]));

    let impact = run_json(temp.path(), &["impact", arg(&snapshot), "src/b.ts"]);
    let impacted: Vec<&str> = impact["data"]["impacted"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["file"].as_str())
        .collect();
    assert!(impacted.contains(&"src/a.ts"));
    assert!(impacted.contains(&"src/c.ts"));
}

#[test]
fn eval_binds_results_between_commands() {
    let (temp, snapshot) = setup_snapshot();
    let body = run_json(
        temp.path(),
        &[
            "eval",
            arg(&snapshot),
            "(grep \"export (function|class) (\\\\w+)\")",
            "(map _1 (lambda (m) (match m \"(function|class) (\\\\w+)\" 2)))",
            "(count RESULTS)",
            "(nonsense 1)",
        ],
    );
    let steps = body["data"].as_array().unwrap();
    assert_eq!(steps[1]["result"], serde_json::json!(["a", "b", "C"]));
    assert_eq!(steps[2]["result"], 3);
    assert_eq!(steps[3]["error"], "Unknown operator: nonsense");
}

#[test]
fn config_file_and_env_are_layered() {
    let (temp, snapshot) = setup_snapshot();
    let config = temp.path().join("nucleus.toml");
    fs::write(&config, "[engine]\nmax_grep_matches = 1\n").unwrap();

    let from_file = run_json(
        temp.path(),
        &["--config", arg(&config), "eval", arg(&snapshot), "(count (grep \"import\"))"],
    );
    assert_eq!(from_file["data"][0]["result"], 1);

    let output = nucleus(temp.path())
        .env("NUCLEUS_MAX_GREP_MATCHES", "2")
        .args(["--config", arg(&config), "eval", arg(&snapshot), "(count (grep \"import\"))"])
        .output()
        .unwrap();
    let from_env: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(from_env["data"][0]["result"], 2);

    let from_flag = run_json(
        temp.path(),
        &[
            "--config",
            arg(&config),
            "eval",
            arg(&snapshot),
            "--max-grep-matches",
            "10",
            "(count (grep \"import\"))",
        ],
    );
    assert_eq!(from_flag["data"][0]["result"], 3);
}

#[test]
fn analyze_fails_fast_on_missing_snapshot() {
    let temp = tempdir().unwrap();
    let missing = temp.path().join("absent.txt");
    nucleus(temp.path())
        .env("NUCLEUS_BASE_URL", "http://127.0.0.1:9")
        .args(["analyze", arg(&missing), "how many functions", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"io\""));
}
