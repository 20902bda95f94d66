use serde_json::json;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    target: String,
    authorization: Option<String>,
    body: String,
}

type Log = Arc<Mutex<Vec<Seen>>>;

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

/// Canned replies. Teacher 99's listing sits behind a failing upstream.
fn route(method: &str, target: &str) -> (u16, String) {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path == "/get-materials" && query.contains("teacher_id=99") {
        return (502, "<html>Bad Gateway</html>".to_string());
    }
    match (method, path) {
        ("GET", "/get-materials") => (
            200,
            json!({ "materials": [
                { "id": 1, "file_name": "algebra.pdf", "category": "Math", "program_name": "STEM", "subject_name": "Algebra" },
                { "id": 2, "file_name": "geometry.pdf", "category": "Math" },
                { "id": 3, "file_name": "color.pdf", "category": "Art" }
            ] })
            .to_string(),
        ),
        ("POST", "/delete-material") => (200, json!({ "message": "Deleted" }).to_string()),
        ("POST", "/upload-material") => (
            200,
            json!({ "success": true, "message": "Material uploaded" }).to_string(),
        ),
        ("GET", "/api/teacher/get-subjects") => (
            200,
            json!({ "subjects": [{ "id": 7, "subject": "Physics", "grade_level": "11", "semester": "1" }] })
                .to_string(),
        ),
        ("POST", "/api/teacher/delete-subject") => (
            500,
            json!({ "message": "Database error" }).to_string(),
        ),
        _ => (404, "Not Found".to_string()),
    }
}

/// Minimal HTTP/1.1 server: one request per connection, canned replies.
fn start_stub_server() -> (String, Log) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
    let origin = format!("http://{}", listener.local_addr().expect("addr"));
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let seen = log.clone();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            let mut parts = request_line.split_whitespace();
            let method = parts.next().unwrap_or("").to_string();
            let target = parts.next().unwrap_or("").to_string();

            let mut content_length = 0usize;
            let mut authorization = None;
            loop {
                let mut header = String::new();
                if reader.read_line(&mut header).unwrap_or(0) == 0 {
                    break;
                }
                let header = header.trim_end();
                if header.is_empty() {
                    break;
                }
                if let Some((name, value)) = header.split_once(':') {
                    let name = name.trim().to_ascii_lowercase();
                    if name == "content-length" {
                        content_length = value.trim().parse().unwrap_or(0);
                    } else if name == "authorization" {
                        authorization = Some(value.trim().to_string());
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            let _ = reader.read_exact(&mut body);

            let (status, reply) = route(&method, &target);
            seen.lock().expect("log").push(Seen {
                method,
                target,
                authorization,
                body: String::from_utf8_lossy(&body).to_string(),
            });
            let _ = write!(
                stream,
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                reply.len()
            );
            let _ = stream.flush();
        }
    });
    (origin, log)
}

fn spawn_sidecar(origin: &str) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_eknowsd");
    let mut child = Command::new(exe)
        .env("EKNOWS_ORIGIN", origin)
        .env("EKNOWS_TOKEN", "teacher-token")
        .env_remove("EKNOWS_WORKSPACE")
        .env_remove("HTTP_PROXY")
        .env_remove("http_proxy")
        .env_remove("ALL_PROXY")
        .env_remove("all_proxy")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn eknowsd");
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
    assert_eq!(value["ok"], true, "{method} failed: {value}");
    value
}

fn calls(log: &Log) -> Vec<Seen> {
    log.lock().expect("log").clone()
}

#[test]
fn categories_are_deduplicated_and_lists_replace() {
    let (origin, log) = start_stub_server();
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&origin);

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "ui.register",
        json!({ "components": ["materialsList", "categorySelect"] }),
    );

    let cats = request(&mut stdin, &mut reader, "2", "materials.categories", json!({}));
    assert_eq!(cats["result"]["count"], 2);
    let options = cats["result"]["views"]["categorySelect"]["options"]
        .as_array()
        .expect("options");
    let labels: Vec<&str> = options.iter().filter_map(|o| o["label"].as_str()).collect();
    assert_eq!(labels, vec!["Math", "Art"]);

    let filters = json!({ "filters": { "teacher_id": "4", "category": "Lab Notes", "program": "" } });
    let _ = request(&mut stdin, &mut reader, "3", "materials.load", filters.clone());
    let loaded = request(&mut stdin, &mut reader, "4", "materials.load", filters);
    let items = loaded["result"]["views"]["materials"]["items"]
        .as_array()
        .expect("items");
    assert_eq!(items.len(), 3);
    assert_eq!(loaded["result"]["views"]["materials"]["renders"], 2);

    let seen = calls(&log);
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].target, "/get-materials");
    assert_eq!(
        seen[1].target,
        "/get-materials?teacher_id=4&category=Lab+Notes"
    );
    assert_eq!(
        seen[1].authorization.as_deref(),
        Some("Bearer teacher-token")
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn delete_is_gated_by_confirmation_and_refetches() {
    let (origin, log) = start_stub_server();
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&origin);

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "ui.register",
        json!({ "components": ["materialsList"] }),
    );

    let declined = request(
        &mut stdin,
        &mut reader,
        "2",
        "materials.delete",
        json!({ "id": 1, "teacherId": "4", "confirmed": false }),
    );
    assert_eq!(declined["result"]["outcome"], "cancelled");
    assert_eq!(declined["result"]["views"]["materials"]["renders"], 0);
    assert!(calls(&log).is_empty());

    let applied = request(
        &mut stdin,
        &mut reader,
        "3",
        "materials.delete",
        json!({ "id": "1", "teacherId": "4", "confirmed": true }),
    );
    assert_eq!(applied["result"]["outcome"], "applied");
    assert_eq!(applied["result"]["refreshed"], 3);
    assert_eq!(applied["result"]["alerts"][0]["message"], "Deleted");

    let seen = calls(&log);
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].method, "POST");
    assert_eq!(seen[0].target, "/delete-material");
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).expect("body");
    assert_eq!(body, json!({ "id": 1 }));
    assert_eq!(seen[1].target, "/get-materials?teacher_id=4");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn upload_sends_base64_and_reports_form_reset() {
    let (origin, log) = start_stub_server();
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&origin);
    let dir = temp_dir("eknows-upload");
    let file = dir.join("worksheet.txt");
    std::fs::write(&file, b"hello").expect("write file");

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "ui.register",
        json!({ "components": ["materialsList"], "controls": { "uploadSubmit": "Upload" } }),
    );
    let uploaded = request(
        &mut stdin,
        &mut reader,
        "2",
        "materials.upload",
        json!({
            "fields": { "subject_id": 2, "category": "Math" },
            "filePath": file.to_string_lossy(),
            "teacherId": "4",
            "control": "uploadSubmit"
        }),
    );
    assert_eq!(uploaded["result"]["outcome"], "applied");
    assert_eq!(uploaded["result"]["formReset"], true);
    assert_eq!(uploaded["result"]["controls"]["uploadSubmit"]["busy"], false);

    let seen = calls(&log);
    assert_eq!(seen[0].target, "/upload-material");
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).expect("body");
    assert_eq!(body["file_name"], "worksheet.txt");
    assert_eq!(body["file_base64"], "aGVsbG8=");
    assert_eq!(body["subject_id"], 2);
    assert_eq!(seen[1].target, "/get-materials?teacher_id=4");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn failed_subject_delete_keeps_table_and_shows_server_message() {
    let (origin, log) = start_stub_server();
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&origin);

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "ui.register",
        json!({ "components": ["subjectsTable"] }),
    );
    let loaded = request(
        &mut stdin,
        &mut reader,
        "2",
        "subjects.load",
        json!({ "teacherId": "4" }),
    );
    assert_eq!(loaded["result"]["count"], 1);

    let failed = request(
        &mut stdin,
        &mut reader,
        "3",
        "subjects.delete",
        json!({ "id": 7, "teacherId": "4", "confirmed": true }),
    );
    assert_eq!(failed["result"]["outcome"], "failed");
    assert_eq!(failed["result"]["message"], "Database error");
    assert_eq!(failed["result"]["views"]["subjects"]["renders"], 1);
    assert_eq!(calls(&log).len(), 2);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn applied_delete_is_reported_even_when_relist_fails() {
    let (origin, log) = start_stub_server();
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&origin);

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "ui.register",
        json!({ "components": ["materialsList"] }),
    );
    let deleted = request(
        &mut stdin,
        &mut reader,
        "2",
        "materials.delete",
        json!({ "id": 1, "teacherId": "99", "confirmed": true }),
    );
    assert_eq!(deleted["result"]["outcome"], "applied");
    assert!(deleted["result"]["refreshed"].is_null());
    assert_eq!(
        deleted["result"]["alerts"][0]["message"],
        "Error loading materials"
    );
    assert_eq!(deleted["result"]["alerts"][1]["message"], "Deleted");
    assert_eq!(calls(&log).len(), 2);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn delete_without_teacher_does_not_list_everyone() {
    let (origin, log) = start_stub_server();
    let (mut child, mut stdin, mut reader) = spawn_sidecar(&origin);

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "ui.register",
        json!({ "components": ["materialsList"] }),
    );
    let deleted = request(
        &mut stdin,
        &mut reader,
        "2",
        "materials.delete",
        json!({ "id": 1, "confirmed": true }),
    );
    assert_eq!(deleted["result"]["outcome"], "applied");
    assert_eq!(deleted["result"]["views"]["materials"]["renders"], 0);

    let seen = calls(&log);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].target, "/delete-material");

    drop(stdin);
    let _ = child.wait();
}
