use std::io::Write;
use std::net::TcpListener;
use std::time::Duration;

use reqwest::Client;
use tempfile::NamedTempFile;
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config with in-process backends
fn minimal_config(port: u16) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[orchestrator]
poll_interval_ms = 50
max_workers = 2

[device]
username = "netops"
password = "hunter2"

[vlans]
"DATA" = 8
"Printers" = 12

[records]
backend = "memory"

[notifier]
backend = "log"
operators = ["netops@example.org"]
"#,
        port
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &std::path::Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_steward"))
        .env("STEWARD_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn get_json(port: u16, path: &str) -> serde_json::Value {
    let response = Client::new()
        .get(format!("http://127.0.0.1:{}{}", port, path))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success(), "{} failed", path);
    response.json().await.expect("Failed to parse JSON")
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let config = write_config(&minimal_config(port));
    let mut server = spawn_server(config.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let json = get_json(port, "/api/v1/health").await;
    assert_eq!(json["status"], "ok");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let port = get_available_port();
    let config = write_config(&minimal_config(port));
    let mut server = spawn_server(config.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let json = get_json(port, "/api/v1/config").await;
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["device"]["username"], "netops");
    assert_eq!(json["device"]["password_configured"], true);
    assert_eq!(json["records"]["backend"], "memory");
    assert_eq!(json["records"]["timezone"], "UTC");
    assert!(!json.to_string().contains("hunter2"));

    server.kill().await.ok();
}

#[tokio::test]
async fn test_vlans_and_orchestrator_status() {
    let port = get_available_port();
    let config = write_config(&minimal_config(port));
    let mut server = spawn_server(config.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let vlans = get_json(port, "/api/v1/vlans").await;
    assert_eq!(vlans[0]["name"], "DATA");
    assert_eq!(vlans[0]["id"], 8);
    assert_eq!(vlans[1]["name"], "Printers");

    let status = get_json(port, "/api/v1/orchestrator/status").await;
    assert_eq!(status["running"], true);
    assert_eq!(status["pool"]["workers"], 2);
    assert_eq!(status["pool"]["accepting"], true);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let port = get_available_port();
    let config = write_config(&minimal_config(port));
    let mut server = spawn_server(config.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let body = Client::new()
        .get(format!("http://127.0.0.1:{}/metrics", port))
        .send()
        .await
        .expect("Failed to send request")
        .text()
        .await
        .expect("Failed to read body");

    assert!(body.contains("steward_orchestrator_running 1"));
    assert!(body.contains("steward_pool_workers 2"));

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_steward"))
            .env("STEWARD_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_device_section_exits_with_error() {
    let config = write_config(
        r#"
[vlans]
"DATA" = 8

[records]
backend = "memory"
"#,
    );

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_steward"))
            .env("STEWARD_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_invalid_vlan_id_exits_with_error() {
    let port = get_available_port();
    let config = write_config(&minimal_config(port).replace("\"Printers\" = 12", "\"Printers\" = 5000"));

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_steward"))
            .env("STEWARD_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}
