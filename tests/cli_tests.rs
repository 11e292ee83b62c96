//! Command-line interface integration tests, run against the built binary.

mod common;

use std::process::Command;

use common::{minimal_spec, write_spec};
use tempfile::TempDir;

#[test]
fn test_cli_versions_lists_union() {
    let tmp = TempDir::new().unwrap();
    write_spec(
        tmp.path(),
        "hello-world",
        "2021-06-01",
        &minimal_spec("Hello World", "/examples/hello-world", "helloWorldList", None),
    );
    write_spec(
        tmp.path(),
        "projects",
        "2021-06-04",
        &minimal_spec("Projects", "/orgs/{org_id}/projects", "listProjects", Some("experimental")),
    );

    let exe = env!("CARGO_BIN_EXE_vervet");
    let output = Command::new(exe)
        .arg("versions")
        .arg(tmp.path())
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        ["2021-06-01", "2021-06-04~experimental"]
    );
}

#[test]
fn test_cli_resolve_renders_yaml() {
    let tmp = TempDir::new().unwrap();
    write_spec(
        tmp.path(),
        "hello-world",
        "2021-06-01",
        &minimal_spec("Hello World", "/examples/hello-world", "helloWorldList", None),
    );

    let exe = env!("CARGO_BIN_EXE_vervet");
    let output = Command::new(exe)
        .arg("resolve")
        .arg(tmp.path())
        .arg("--at")
        .arg("2021-07-01")
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("# OpenAPI spec generated by vervet, DO NOT EDIT"));
    assert!(stdout.contains("/examples/hello-world"));
}

#[test]
fn test_cli_resolve_unknown_version_fails() {
    let tmp = TempDir::new().unwrap();
    write_spec(
        tmp.path(),
        "hello-world",
        "2021-06-01",
        &minimal_spec("Hello World", "/examples/hello-world", "helloWorldList", None),
    );

    let exe = env!("CARGO_BIN_EXE_vervet");
    let output = Command::new(exe)
        .arg("resolve")
        .arg(tmp.path())
        .arg("--at")
        .arg("2020-01-01")
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no matching version"), "{stderr}");
}
