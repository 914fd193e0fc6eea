use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_pioneersd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn pioneersd");
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

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("pioneers-router-smoke");
    let template_out = workspace.join("towns-template.csv");
    let csv_out = workspace.join("smoke-export.csv");
    let bundle_out = workspace.join("smoke-export.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    let error = request_err(&mut stdin, &mut reader, "2", "towns.list", json!({}));
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("no_workspace"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "4", "setup.get", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "import", "patch": { "requireRegionCode": false } }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "import.template",
        json!({ "kind": "towns", "outPath": template_out.to_string_lossy() }),
    );
    let template = std::fs::read_to_string(&template_out).expect("read template");
    assert!(template.starts_with("\"Name\",\"Place Code\""));

    // A header-only upload has nothing to import.
    let error = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "import.preview",
        json!({ "inPath": template_out.to_string_lossy() }),
    );
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("empty_table"));

    let _ = request_ok(&mut stdin, &mut reader, "8", "towns.list", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "9", "characters.list", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "search.suggest",
        json!({ "term": "abc" }),
    );
    let error = request_err(
        &mut stdin,
        &mut reader,
        "11",
        "towns.get",
        json!({ "townId": "missing" }),
    );
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("not_found"));
    let error = request_err(
        &mut stdin,
        &mut reader,
        "12",
        "characters.delete",
        json!({ "characterId": "missing" }),
    );
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("not_found"));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "export.csv",
        json!({ "kind": "characters", "outPath": csv_out.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "export.bundle",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "export.verifyBundle",
        json!({ "inPath": bundle_out.to_string_lossy() }),
    );

    let error = request_err(&mut stdin, &mut reader, "16", "towns.merge", json!({}));
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("not_implemented"));

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush garbage");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json reply");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse reply");
    assert_eq!(value.pointer("/error/code").and_then(|v| v.as_str()), Some("bad_json"));

    // The loop keeps serving after a malformed line.
    let _ = request_ok(&mut stdin, &mut reader, "17", "health", json!({}));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
