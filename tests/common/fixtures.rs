//! Task manager fixtures served through wiremock

use serde_json::json;
use std::io::{Cursor, Write};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TIMESTAMP: &str = "2022-04-27T10:10Z";
pub const TASK_ID: &str = "1fdda469-53e9-4d63-a533-b935cffdd2f6";

/// Task JSON as the task manager serialises it
pub fn task_json(status: &str, outputs: &[(&str, &str)]) -> serde_json::Value {
    json!({
        "id": TASK_ID,
        "timestamp": TIMESTAMP,
        "status": status,
        "inputs": [],
        "outputs": outputs
            .iter()
            .map(|(file_type, validation)| json!({
                "fileType": file_type,
                "processFileStatus": validation,
                "filename": format!("{}.zip", file_type.to_lowercase()),
            }))
            .collect::<Vec<_>>(),
        "processEvents": []
    })
}

/// Zip archive holding `entries` in order
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Binary response carrying a `Content-Disposition` file name
pub fn attachment(file_name: &str, bytes: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", file_name).as_str(),
        )
        .set_body_bytes(bytes.to_vec())
}

/// Serve `task` on `GET /tasks/{timestamp}`, expecting exactly `calls` requests
pub async fn mount_task(server: &MockServer, task: serde_json::Value, calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/tasks/{}", TIMESTAMP)))
        .respond_with(ResponseTemplate::new(200).set_body_json(task))
        .expect(calls)
        .mount(server)
        .await;
}

/// Serve the combined bundle, expecting exactly `calls` requests
pub async fn mount_bundle(server: &MockServer, file_name: &str, bytes: &[u8], calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/tasks/{}/outputs", TIMESTAMP)))
        .respond_with(attachment(file_name, bytes))
        .expect(calls)
        .mount(server)
        .await;
}

/// Serve one file type, expecting exactly `calls` requests
pub async fn mount_file(
    server: &MockServer,
    file_type: &str,
    file_name: &str,
    bytes: &[u8],
    calls: u64,
) {
    Mock::given(method("GET"))
        .and(path(format!("/tasks/{}/file/{}", TIMESTAMP, file_type)))
        .respond_with(attachment(file_name, bytes))
        .expect(calls)
        .mount(server)
        .await;
}
