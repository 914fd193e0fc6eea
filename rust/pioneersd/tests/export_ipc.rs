use serde_json::json;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
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

const TOWN_HEADER: &str = "Name,Place Code,Postal Code,Region Code,Description,Latitude,Longitude";
const CHARACTER_HEADER: &str =
    "Principal Subject,Last Name,First Name,Place Code,Birthplace,Deathplace,Biography";

fn seed(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, workspace: &std::path::Path) {
    let towns = workspace.join("towns.csv");
    std::fs::write(
        &towns,
        format!(
            "{}\nBrouage,17200,17320,17,\"Port \"\"royal\"\"\",45.86,-1.07\nDieppe,76217,76200,76,,49.92,1.08\n",
            TOWN_HEADER
        ),
    )
    .expect("write towns");
    let characters = workspace.join("characters.csv");
    std::fs::write(
        &characters,
        format!(
            "{}\nyes,Champlain,Samuel,17200,,Québec,\nno,Hébert,Louis,76217,,,\n",
            CHARACTER_HEADER
        ),
    )
    .expect("write characters");

    let _ = request_ok(
        stdin,
        reader,
        "seed-1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-2",
        "import.apply",
        json!({ "inPath": towns.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-3",
        "import.apply",
        json!({ "inPath": characters.to_string_lossy() }),
    );
}

#[test]
fn csv_export_quotes_every_field_and_honours_filters() {
    let workspace = temp_dir("pioneers-export-csv");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    seed(&mut stdin, &mut reader, &workspace);

    let towns_out = workspace.join("out").join("towns-export.csv");
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "export.csv",
        json!({ "kind": "towns", "outPath": towns_out.to_string_lossy() }),
    );
    assert_eq!(result.get("rowsExported").and_then(|v| v.as_u64()), Some(2));
    let text = std::fs::read_to_string(&towns_out).expect("read towns export");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "\"Name\",\"Place Code\",\"Postal Code\",\"Region Code\",\"Latitude\",\"Longitude\",\"Description\""
    );
    assert_eq!(
        lines[1],
        "\"Brouage\",\"17200\",\"17320\",\"17\",\"45.86\",\"-1.07\",\"Port \"\"royal\"\"\""
    );

    let characters_out = workspace.join("out").join("characters-export.csv");
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "export.csv",
        json!({
            "kind": "characters",
            "outPath": characters_out.to_string_lossy(),
            "filters": { "regionFilter": "17" }
        }),
    );
    assert_eq!(result.get("rowsExported").and_then(|v| v.as_u64()), Some(1));
    let text = std::fs::read_to_string(&characters_out).expect("read characters export");
    assert_eq!(
        text.lines().nth(1),
        Some("\"Samuel\",\"Champlain\",\"\",\"Québec\",\"Brouage\",\"17\",\"Yes\",\"\"")
    );

    let error = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "export.csv",
        json!({ "kind": "places", "outPath": towns_out.to_string_lossy() }),
    );
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("bad_params"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn export_bundle_carries_checksummed_entries() {
    let workspace = temp_dir("pioneers-export-bundle");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    seed(&mut stdin, &mut reader, &workspace);

    let bundle_out = workspace.join("pioneers-export.zip");
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "export.bundle",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    assert_eq!(
        result.get("bundleFormat").and_then(|v| v.as_str()),
        Some("pioneers-export-v1")
    );
    assert_eq!(result.get("entryCount").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(result.get("townRows").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(result.get("characterRows").and_then(|v| v.as_u64()), Some(2));

    let file = File::open(&bundle_out).expect("open bundle");
    let mut archive = zip::ZipArchive::new(file).expect("open zip archive");
    let mut towns = String::new();
    archive
        .by_name("towns.csv")
        .expect("towns entry")
        .read_to_string(&mut towns)
        .expect("read towns entry");
    assert!(towns.contains("\"Dieppe\""));
    archive.by_name("manifest.json").expect("manifest entry");

    let verified = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "export.verifyBundle",
        json!({ "inPath": bundle_out.to_string_lossy() }),
    );
    assert_eq!(verified.get("intact").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(verified.get("entriesChecked").and_then(|v| v.as_u64()), Some(2));

    let not_a_bundle = workspace.join("towns.csv");
    let error = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "export.verifyBundle",
        json!({ "inPath": not_a_bundle.to_string_lossy() }),
    );
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("parse_failed"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
