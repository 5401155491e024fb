//! Integration tests for the `npmget` binary.
//!
//! These tests use a mock npm registry to avoid network calls.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::net::TcpListener;
use std::process::{Command, Output};
use std::thread;
use std::time::Duration;
use tar::Builder;
use tempfile::tempdir;

fn npmget() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_npmget"));
    // Keep the developer's .npmrc and log settings out of the picture.
    cmd.env_remove("NPMGET_NPM_REGISTRY").env_remove("RUST_LOG");
    cmd
}

fn append_file(builder: &mut Builder<&mut Vec<u8>>, path: &str, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_path(path).unwrap();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append(&header, data).unwrap();
}

/// Create a test tarball. `with_bare_file` adds a `README.md` outside the
/// `package/` wrapper.
fn create_test_tarball(name: &str, version: &str, with_bare_file: bool) -> Vec<u8> {
    let pkg_json = format!(r#"{{"name":"{name}","version":"{version}","main":"index.js"}}"#);

    let mut tar_bytes = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_bytes);
        append_file(&mut builder, "package/package.json", pkg_json.as_bytes());
        append_file(&mut builder, "package/lib/index.js", b"module.exports = 42;");
        if with_bare_file {
            append_file(&mut builder, "README.md", b"outside the wrapper");
        }
        builder.finish().unwrap();
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes).unwrap();
    encoder.finish().unwrap()
}

/// Create a packument JSON for a package.
fn create_packument(name: &str, version: &str, tarball_url: &str) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "description": format!("{name} test package"),
        "dist-tags": {
            "latest": version
        },
        "versions": {
            version: {
                "name": name,
                "version": version,
                "dist": {
                    "tarball": tarball_url,
                    "shasum": "abc123"
                }
            }
        }
    })
}

async fn handle_packument(Path(name): Path<String>, State(base_url): State<String>) -> Response {
    let version = match name.as_str() {
        "a" => "1.0.0",
        "loose" => "2.0.0",
        "slow" => "3.0.0",
        _ => return (StatusCode::NOT_FOUND, r#"{"error":"Not found"}"#).into_response(),
    };
    let tarball_url = format!("{base_url}/{name}/-/{name}-{version}.tgz");
    let packument = create_packument(&name, version, &tarball_url);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::to_string(&packument).unwrap(),
    )
        .into_response()
}

async fn handle_tarball(Path((name, tarball)): Path<(String, String)>) -> Response {
    let body = match (name.as_str(), tarball.as_str()) {
        ("a", "a-1.0.0.tgz") => create_test_tarball("a", "1.0.0", false),
        ("loose", "loose-2.0.0.tgz") => create_test_tarball("loose", "2.0.0", true),
        ("slow", "slow-3.0.0.tgz") => {
            tokio::time::sleep(Duration::from_secs(10)).await;
            create_test_tarball("slow", "3.0.0", false)
        }
        _ => return (StatusCode::NOT_FOUND, "Not found").into_response(),
    };
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/gzip")],
        Body::from(body),
    )
        .into_response()
}

/// Start the mock registry server in a background thread.
/// Returns the base URL.
fn start_mock_registry() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let state = base_url.clone();

    thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let app = Router::new()
                .route("/:name", get(handle_packument))
                .route("/:name/-/:tarball", get(handle_tarball))
                .with_state(state);
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    base_url
}

fn unused_registry() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_fetch_extracts_into_output_dir() {
    let registry = start_mock_registry();
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    let output = npmget()
        .args(["--registry", &registry, "a"])
        .arg(&out)
        .output()
        .expect("Failed to run npmget");

    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout = stdout(&output);
    assert_eq!(
        stdout.lines().next(),
        Some(format!("{registry}/a/-/a-1.0.0.tgz").as_str())
    );

    assert_eq!(
        fs::read_to_string(out.join("lib").join("index.js")).unwrap(),
        "module.exports = 42;"
    );
    assert!(out.join("package.json").exists());
    assert!(!out.join("package").exists());
}

#[test]
fn test_default_output_dir_under_cwd() {
    let registry = start_mock_registry();
    let dir = tempdir().unwrap();

    let output = npmget()
        .args(["--registry", &registry, "--cwd"])
        .arg(dir.path())
        .arg("a")
        .output()
        .expect("Failed to run npmget");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("testing").join("package.json").exists());
}

#[test]
fn test_registry_from_env() {
    let registry = start_mock_registry();
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    let output = npmget()
        .env("NPMGET_NPM_REGISTRY", &registry)
        .arg("a")
        .arg(&out)
        .output()
        .expect("Failed to run npmget");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(out.join("lib").join("index.js").exists());
}

#[test]
fn test_registry_from_npmrc() {
    let registry = start_mock_registry();
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(".npmrc"), format!("registry={registry}\n")).unwrap();

    let output = npmget()
        .arg("--cwd")
        .arg(dir.path())
        .args(["a", "vendor"])
        .output()
        .expect("Failed to run npmget");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("vendor").join("package.json").exists());
}

#[test]
fn test_json_output_on_success() {
    let registry = start_mock_registry();
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    let output = npmget()
        .args(["--json", "--registry", &registry, "a"])
        .arg(&out)
        .output()
        .expect("Failed to run npmget");

    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout = stdout(&output);
    let json: serde_json::Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|_| panic!("stdout should be valid JSON: {stdout}"));

    assert_eq!(json["ok"], true);
    assert_eq!(json["package"]["name"], "a");
    assert_eq!(json["package"]["version"], "1.0.0");
    assert_eq!(json["package"]["shasum"], "abc123");
    assert_eq!(json["extract"]["files"], 2);
    assert_eq!(json["extract"]["skipped"], 0);
    assert!(json.get("error").is_none());
}

#[test]
fn test_unknown_package_fails() {
    let registry = start_mock_registry();
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    let output = npmget()
        .args(["--registry", &registry, "does-not-exist"])
        .arg(&out)
        .output()
        .expect("Failed to run npmget");

    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("PKG_NOT_FOUND"),
        "stderr: {}",
        stderr(&output)
    );
    assert!(!out.exists());
}

#[test]
fn test_json_output_on_error() {
    let registry = start_mock_registry();
    let dir = tempdir().unwrap();

    let output = npmget()
        .args(["--json", "--registry", &registry, "does-not-exist"])
        .arg(dir.path().join("out"))
        .output()
        .expect("Failed to run npmget");

    assert!(!output.status.success());

    let stdout = stdout(&output);
    let json: serde_json::Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|_| panic!("stdout should be valid JSON: {stdout}"));

    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "PKG_NOT_FOUND");
    assert!(json.get("package").is_none());
}

#[test]
fn test_registry_unreachable_writes_nothing() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    let output = npmget()
        .args(["--registry", &unused_registry(), "a"])
        .arg(&out)
        .output()
        .expect("Failed to run npmget");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("PKG_REGISTRY_ERROR"));
    assert!(!out.exists());
}

#[test]
fn test_invalid_package_name() {
    let dir = tempdir().unwrap();

    let output = npmget()
        .args(["--registry", &unused_registry(), "../etc"])
        .arg(dir.path().join("out"))
        .output()
        .expect("Failed to run npmget");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("PKG_SPEC_INVALID"));
}

#[test]
fn test_bare_file_skipped_by_default() {
    let registry = start_mock_registry();
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    let output = npmget()
        .args(["--json", "--registry", &registry, "loose"])
        .arg(&out)
        .output()
        .expect("Failed to run npmget");

    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["extract"]["skipped"], 1);
    assert!(!out.join("README.md").exists());
    assert!(out.join("package.json").exists());
}

#[test]
fn test_bare_file_rejected_with_strict() {
    let registry = start_mock_registry();
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    let output = npmget()
        .args(["--strict", "--registry", &registry, "loose"])
        .arg(&out)
        .output()
        .expect("Failed to run npmget");

    assert!(!output.status.success());
    assert!(stderr(&output).contains("PKG_EXTRACT_FAILED"));
    assert!(!out.join("README.md").exists());
}

#[test]
fn test_download_timeout_flag_applies_to_tarball() {
    let registry = start_mock_registry();
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    let output = npmget()
        .args(["--registry", &registry, "--download-timeout", "1", "slow"])
        .arg(&out)
        .output()
        .expect("Failed to run npmget");

    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("PKG_DOWNLOAD_FAILED"),
        "stderr: {}",
        stderr(&output)
    );
    assert!(!out.exists());
}

#[test]
fn test_help_shows_options() {
    let output = npmget()
        .arg("--help")
        .output()
        .expect("Failed to run npmget --help");

    let stdout = stdout(&output);
    for flag in [
        "--registry",
        "--strict",
        "--json",
        "--cwd",
        "--timeout",
        "--download-timeout",
        "--max-size",
    ] {
        assert!(stdout.contains(flag), "Help should show {flag}");
    }
    assert!(stdout.contains("NPMGET_NPM_REGISTRY"));
}

#[test]
fn test_missing_package_argument_is_usage_error() {
    let output = npmget().output().expect("Failed to run npmget");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("<PACKAGE>"));
}
