//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary home
//! directory so sessions, config and the persisted run don't leak between
//! tests.

use std::path::Path;
use std::process::Command;

use chrono::{Duration, Utc};
use ticks_core::storage::Database;
use ticks_core::{NullSink, TimerEngine};

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_ticks"))
        .args(args)
        .env("HOME", home)
        .env_remove("TICKS_ENV")
        .env_remove("TICKS_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "command {args:?} failed: {stderr}");
    stdout
}

fn run_json(home: &Path, args: &[&str]) -> serde_json::Value {
    serde_json::from_str(&run_ok(home, args)).expect("Failed to parse JSON output")
}

#[test]
fn test_session_create_and_list() {
    let home = tempfile::tempdir().unwrap();
    let out = run_ok(
        home.path(),
        &["session", "create", "Workout", "-i", "Warm Up:5m", "-i", "Sprint:30s:manual"],
    );
    assert!(out.contains("Session created: Workout"));

    let sessions = run_json(home.path(), &["session", "list", "--json"]);
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["intervals"].as_array().unwrap().len(), 2);
    assert_eq!(sessions[0]["intervals"][1]["confirmation"], "manual");
}

#[test]
fn test_interval_editing() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["session", "create", "Edit", "-i", "A:10s"]);
    run_ok(home.path(), &["interval", "add", "edit", "B", "20s", "--confirmation", "manual"]);
    run_ok(home.path(), &["interval", "move", "edit", "2", "1"]);

    let session = run_json(home.path(), &["session", "show", "edit", "--json"]);
    assert_eq!(session["intervals"][0]["label"], "B");
    assert_eq!(session["intervals"][1]["label"], "A");

    run_ok(home.path(), &["interval", "remove", "edit", "1"]);
    let session = run_json(home.path(), &["session", "show", "edit", "--json"]);
    assert_eq!(session["intervals"].as_array().unwrap().len(), 1);

    let (_, _, code) = run_cli(home.path(), &["interval", "remove", "edit", "0"]);
    assert_ne!(code, 0);
}

#[test]
fn test_timer_lifecycle() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["session", "create", "Long", "-i", "Focus:1h", "-i", "Break:10m:manual"]);

    let out = run_json(home.path(), &["timer", "start", "long"]);
    assert_eq!(out["snapshot"]["phase"], "running");
    assert_eq!(out["effects"][0]["type"], "interval_started");

    let out = run_json(home.path(), &["timer", "pause"]);
    assert_eq!(out["snapshot"]["phase"], "paused");

    // Confirm is only valid at a manual gate.
    let (_, stderr, code) = run_cli(home.path(), &["timer", "confirm"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Cannot confirm while paused"));

    let out = run_json(home.path(), &["timer", "next"]);
    assert_eq!(out["snapshot"]["phase"], "waiting_confirmation");
    assert_eq!(out["snapshot"]["current_index"], 1);

    let out = run_json(home.path(), &["timer", "confirm"]);
    assert_eq!(out["snapshot"]["phase"], "running");

    let plan = run_json(home.path(), &["timer", "notifications"]);
    assert_eq!(plan[0]["id"], "interval-1");

    let out = run_json(home.path(), &["timer", "stop"]);
    assert_eq!(out["snapshot"]["phase"], "idle");
    let effects = out["effects"].as_array().unwrap();
    assert!(effects.iter().any(|e| e["type"] == "run_stopped"));

    let out = run_json(home.path(), &["timer", "status"]);
    assert_eq!(out["snapshot"]["phase"], "idle");
}

fn open_db(home: &Path) -> Database {
    Database::open_at(home.join(".config").join("ticks").join("ticks.db")).unwrap()
}

fn effect_types(out: &serde_json::Value) -> Vec<String> {
    out["effects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect()
}

/// Store a run of `session` that started `ago` before now.
fn save_run_started(home: &Path, session: &str, ago: Duration) {
    let db = open_db(home);
    let session = db.resolve_session(session).unwrap();
    let mut engine = TimerEngine::new(NullSink);
    engine.start(session).unwrap();
    let saved = serde_json::json!({
        "run": engine.run_state(),
        "saved_at": Utc::now() - ago,
    });
    db.kv_set("timer_run", &saved.to_string()).unwrap();
}

#[test]
fn test_timer_catches_up_between_invocations() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["session", "create", "Gate", "-i", "A:2s", "-i", "B:10s:manual", "-i", "C:5s"]);
    save_run_started(home.path(), "gate", Duration::seconds(30));

    let out = run_json(home.path(), &["timer", "status"]);
    assert_eq!(out["snapshot"]["phase"], "waiting_confirmation");
    assert_eq!(out["snapshot"]["current_index"], 1);
    assert_eq!(out["snapshot"]["time_remaining_ms"], 10_000);
    let types = effect_types(&out);
    assert!(types.contains(&"interval_completed".to_string()));
    assert!(types.contains(&"confirmation_needed".to_string()));

    // The gate absorbed the surplus; a later call has nothing to replay.
    let out = run_json(home.path(), &["timer", "status"]);
    assert_eq!(out["snapshot"]["current_index"], 1);
    assert!(effect_types(&out).is_empty());
}

#[test]
fn test_timer_background_and_foreground() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["session", "create", "Bg", "-i", "A:2s", "-i", "B:10s:manual"]);
    run_ok(home.path(), &["timer", "start", "bg"]);

    let out = run_json(home.path(), &["timer", "background"]);
    assert!(effect_types(&out).contains(&"entered_background".to_string()));

    // Pretend the app was suspended for a minute.
    let db = open_db(home.path());
    let mut saved: serde_json::Value =
        serde_json::from_str(&db.kv_get("timer_run").unwrap().unwrap()).unwrap();
    assert!(!saved["suspended_at"].is_null());
    saved["suspended_at"] = serde_json::json!(Utc::now() - Duration::seconds(60));
    saved["saved_at"] = serde_json::json!(Utc::now() - Duration::seconds(60));
    db.kv_set("timer_run", &saved.to_string()).unwrap();
    drop(db);

    // No ticking while suspended.
    let out = run_json(home.path(), &["timer", "status"]);
    assert_eq!(out["snapshot"]["current_index"], 0);
    assert!(effect_types(&out).is_empty());

    let out = run_json(home.path(), &["timer", "foreground"]);
    assert_eq!(out["snapshot"]["phase"], "waiting_confirmation");
    assert_eq!(out["snapshot"]["current_index"], 1);
    assert_eq!(effect_types(&out).last().map(String::as_str), Some("exited_background"));

    let (_, stderr, code) = run_cli(home.path(), &["timer", "foreground"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Cannot exit background"));
}

#[test]
fn test_timer_live_status() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["session", "create", "Live", "-i", "Focus:25m", "-i", "Rest:5m"]);
    run_ok(home.path(), &["timer", "start", "live"]);

    let live = run_json(home.path(), &["timer", "live"]);
    assert_eq!(live["state"], "running");
    assert_eq!(live["current_interval_label"], "Focus");
    assert_eq!(live["next_interval_label"], "Rest");
    assert!(!live["interval_ends_at"].is_null());

    run_ok(home.path(), &["config", "set", "live_status.enabled", "false"]);
    let (_, stderr, code) = run_cli(home.path(), &["timer", "live"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("live status is disabled"));
}

#[test]
fn test_interval_add_rejects_overlong_duration() {
    let home = tempfile::tempdir().unwrap();
    run_ok(home.path(), &["session", "create", "Long", "-i", "A:1m"]);
    let (_, _, code) = run_cli(home.path(), &["interval", "add", "long", "X", "18446744073709551615"]);
    assert_eq!(code, 1);
    let session = run_json(home.path(), &["session", "show", "long", "--json"]);
    assert_eq!(session["intervals"].as_array().unwrap().len(), 1);
}

#[test]
fn test_start_unknown_session_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["timer", "start", "nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();
    assert_eq!(run_ok(home.path(), &["config", "get", "runner.tick_interval_ms"]).trim(), "100");
    run_ok(home.path(), &["config", "set", "runner.tick_interval_ms", "250"]);
    assert_eq!(run_ok(home.path(), &["config", "get", "runner.tick_interval_ms"]).trim(), "250");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "defaults.confirmation", "maybe"]);
    assert_ne!(code, 0);

    run_ok(home.path(), &["config", "reset"]);
    assert_eq!(run_ok(home.path(), &["config", "get", "runner.tick_interval_ms"]).trim(), "100");
}

#[test]
fn test_completions() {
    let home = tempfile::tempdir().unwrap();
    let out = run_ok(home.path(), &["completions", "bash"]);
    assert!(out.contains("ticks"));
}
