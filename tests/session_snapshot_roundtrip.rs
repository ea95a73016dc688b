use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_snapshot(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "{}-{}.json",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ))
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_marklistd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn marklistd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn save_reset_load_preserves_derived_output() {
    let snapshot = temp_snapshot("marklistd-session");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let config_id = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "configs.create",
        json!({ "classId": "class-1", "subject": "Mathematics", "title": "Term 1" }),
    )["configId"]
        .as_str()
        .expect("configId")
        .to_string();
    let col = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "columns.create",
        json!({ "configId": config_id, "title": "Quiz", "maxMarks": 20 }),
    )["columnId"]
        .as_str()
        .expect("columnId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "entries.updateMark",
        json!({ "configId": config_id, "studentId": "stu-1", "columnId": col, "score": 18 }),
    );
    let before = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "entries.get",
        json!({ "configId": config_id, "studentId": "stu-1" }),
    );

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "session.save",
        json!({ "path": snapshot.to_string_lossy() }),
    );
    assert_eq!(saved.get("configCount").and_then(|v| v.as_i64()), Some(1));

    let _ = request_ok(&mut stdin, &mut reader, "6", "session.reset", json!({}));
    let gone = request(
        &mut stdin,
        &mut reader,
        "7",
        "entries.get",
        json!({ "configId": config_id, "studentId": "stu-1" }),
    );
    assert_eq!(
        gone.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_found")
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "session.load",
        json!({ "path": snapshot.to_string_lossy() }),
    );
    let after = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "entries.get",
        json!({ "configId": config_id, "studentId": "stu-1" }),
    );
    // Derived fields are recomputed from the reloaded raw marks; everything
    // except the updated-at stamp must match.
    assert_eq!(before.pointer("/entry/total"), after.pointer("/entry/total"));
    assert_eq!(
        before.pointer("/entry/percentage"),
        after.pointer("/entry/percentage")
    );
    assert_eq!(before.pointer("/entry/grade"), after.pointer("/entry/grade"));
    assert_eq!(before.pointer("/entry/marks"), after.pointer("/entry/marks"));

    std::fs::remove_file(&snapshot).ok();
}

#[test]
fn load_from_missing_file_fails_cleanly() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "session.load",
        json!({ "path": "/nonexistent/marklistd-snapshot.json" }),
    );
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("snapshot_load_failed")
    );

    // The session is untouched after a failed load.
    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert_eq!(health.get("configCount").and_then(|v| v.as_i64()), Some(0));
}
