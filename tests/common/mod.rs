#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Writes `<root>/<resource>/<date>/spec.yaml` and returns its path.
pub fn write_spec(root: &Path, resource: &str, date: &str, contents: &str) -> PathBuf {
    let dir = root.join(resource).join(date);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("spec.yaml");
    std::fs::write(&path, contents).unwrap();
    path
}

/// Writes an arbitrary file relative to `root`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

/// A minimal valid resource snapshot serving one GET path.
pub fn minimal_spec(title: &str, path: &str, operation_id: &str, stability: Option<&str>) -> String {
    let stability_line = match stability {
        Some(s) => format!("x-snyk-api-stability: {s}\n"),
        None => String::new(),
    };
    format!(
        r#"openapi: 3.0.3
{stability_line}info:
  title: {title}
  version: 1.0.0
paths:
  {path}:
    get:
      operationId: {operation_id}
      responses:
        '200':
          description: OK
"#
    )
}
